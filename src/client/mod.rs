//! Client side of the HTTP API.
//!
//! `ApiClient` has two implementations: `HttpClient` talks to a running
//! server, `FixtureClient` runs the same operations in process over a seeded
//! in-memory store. `from_config` picks one from `ClientConfig`.

pub mod fixture;
pub mod http;
pub mod session;

use async_trait::async_trait;
use tracing::error;

use crate::config::{ClientConfig, ClientMode};
use crate::db::{
    DbError, LogFilter, MenuItem, MenuItemPatch, NewMenuItem, NewRecommendationLog, Page,
    RecommendationLog,
};
use crate::recommend::{RecommendRequest, RecommendResponse, Stats};

pub use fixture::FixtureClient;
pub use http::HttpClient;
pub use session::CartSession;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("Store error: {0}")]
    Store(DbError),
}

impl From<DbError> for ClientError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(what) => ClientError::NotFound(what),
            other => ClientError::Store(other),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[async_trait]
pub trait ApiClient: Send + Sync {
    async fn list_menu_items(&self, page: Page) -> ClientResult<Vec<MenuItem>>;
    async fn get_menu_item(&self, id: &str) -> ClientResult<MenuItem>;
    async fn create_menu_item(&self, item: &NewMenuItem) -> ClientResult<MenuItem>;
    async fn update_menu_item(&self, id: &str, patch: &MenuItemPatch) -> ClientResult<MenuItem>;
    async fn delete_menu_item(&self, id: &str) -> ClientResult<()>;
    async fn recommend(&self, request: &RecommendRequest) -> ClientResult<RecommendResponse>;
    async fn list_logs(&self, filter: &LogFilter, page: Page) -> ClientResult<Vec<RecommendationLog>>;
    async fn create_log(&self, log: &NewRecommendationLog) -> ClientResult<RecommendationLog>;
    async fn stats(&self, filter: &LogFilter) -> ClientResult<Stats>;
}

pub async fn from_config(config: &ClientConfig) -> ClientResult<Box<dyn ApiClient>> {
    match config.mode {
        ClientMode::Http => Ok(Box::new(HttpClient::new(&config.base_url, config.timeout_secs)?)),
        ClientMode::Fixture => Ok(Box::new(FixtureClient::seeded().await?)),
    }
}

/// Menu listing for display code: failures are logged and read as empty.
pub async fn menu_items_or_empty(client: &dyn ApiClient) -> Vec<MenuItem> {
    match client.list_menu_items(Page::all()).await {
        Ok(items) => items,
        Err(e) => {
            error!("Error fetching menu items: {}", e);
            Vec::new()
        }
    }
}

/// Log listing for display code: failures are logged and read as empty.
pub async fn logs_or_empty(client: &dyn ApiClient) -> Vec<RecommendationLog> {
    match client.list_logs(&LogFilter::all(), Page::all()).await {
        Ok(logs) => logs,
        Err(e) => {
            error!("Error fetching logs: {}", e);
            Vec::new()
        }
    }
}
