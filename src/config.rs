use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,
    /// Directory holding the built dashboard, served for non-API paths.
    #[serde(default)]
    pub appdir: Option<String>,
    #[serde(default)]
    pub dbdir: Option<String>,
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Insert the sample catalog on startup when it is empty.
    #[serde(default = "default_seed")]
    pub seed: bool,
    #[serde(default)]
    pub client: ClientConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: ListenConfig::default(),
            appdir: None,
            dbdir: None,
            database: DatabaseConfig::default(),
            seed: default_seed(),
            client: ClientConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenConfig {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default)]
    pub tlscert: Option<String>,
    #[serde(default)]
    pub tlskey: Option<String>,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            address: None,
            port: default_port(),
            tlscert: None,
            tlskey: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub sqlite: Option<SqliteConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SqliteConfig {
    pub filename: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClientMode {
    #[default]
    Http,
    Fixture,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub mode: ClientMode,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            mode: ClientMode::default(),
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_port() -> String {
    "8000".to_string()
}

fn default_seed() -> bool {
    true
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_string(), e))?;

        Self::from_yaml(path, &content)
    }

    /// Like `from_file`, but a missing file yields the defaults.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        if !Path::new(path).exists() {
            return Ok(Config::default());
        }
        Self::from_file(path)
    }

    fn from_yaml(path: &str, content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(path.to_string(), e))
    }

    /// `None` means the in-memory store.
    pub fn get_database_path(&self) -> Option<String> {
        if let Some(ref sqlite) = self.database.sqlite {
            return Some(sqlite.filename.clone());
        }

        if let Some(ref dbdir) = self.dbdir {
            let path = PathBuf::from(dbdir).join("csao.db");
            return Some(path.to_string_lossy().to_string());
        }

        None
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(String, std::io::Error),
    #[error("Failed to parse config file {0}: {1}")]
    ParseError(String, serde_yaml::Error),
}
