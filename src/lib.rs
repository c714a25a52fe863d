pub mod api;
pub mod client;
pub mod config;
pub mod db;
pub mod middleware;
pub mod recommend;
pub mod server;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Database error: {0}")]
    Database(#[from] db::DbError),
    #[error("Server error: {0}")]
    Server(String),
}

/// Open the configured store: SQLite when a database path is configured,
/// process memory otherwise.
pub async fn open_repository(config: &config::Config) -> Result<Arc<dyn db::Repository>, ServerError> {
    match config.get_database_path() {
        Some(db_path) => {
            info!("Opening database at {}", db_path);
            Ok(Arc::new(db::SqliteRepository::new(&db_path).await?))
        }
        None => {
            info!("No database configured, using in-memory store");
            Ok(Arc::new(db::MemoryRepository::new()))
        }
    }
}

/// Seed the configured store and return without serving.
pub async fn init_db(config_path: &str) -> Result<usize, ServerError> {
    let config = config::Config::load(config_path)?;
    let db = open_repository(&config).await?;
    let inserted = db::seed_if_empty(db.as_ref()).await?;
    db.close();
    Ok(inserted)
}

pub async fn run(config_path: &str, debug_logs: bool) -> Result<(), ServerError> {
    let config = config::Config::load(config_path)?;

    info!("Using config file: {}", config_path);
    if debug_logs {
        info!("Debug logging enabled");
    }

    let db = open_repository(&config).await?;

    if config.seed {
        db::seed_if_empty(db.as_ref()).await?;
    }

    let address = config.listen.address.as_deref().unwrap_or("[::]");
    let port = &config.listen.port;
    let addr: SocketAddr = format!("{}:{}", address, port)
        .parse()
        .map_err(|e| ServerError::Server(format!("Invalid address: {}", e)))?;

    let tls = match (&config.listen.tlscert, &config.listen.tlskey) {
        (Some(cert), Some(key)) => Some((cert.clone(), key.clone())),
        _ => None,
    };

    let state = server::AppState::new(config, db.clone());
    let app = server::build_router(state);

    if let Some((cert_path, key_path)) = tls {
        info!("Loading TLS certificate from {}", cert_path);
        info!("Loading TLS key from {}", key_path);

        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(&cert_path, &key_path)
            .await
            .map_err(|e| ServerError::Server(format!("Failed to load TLS config: {}", e)))?;

        info!("Serving HTTPS on {}", addr);

        axum_server::bind_rustls(addr, tls_config)
            .serve(app.into_make_service())
            .await
            .map_err(|e| ServerError::Server(format!("Server error: {}", e)))?;
    } else {
        info!("Serving HTTP on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Server(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Server(format!("Server error: {}", e)))?;
    }

    db.close();
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down");
    }
}
