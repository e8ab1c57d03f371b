//! Configuration loading and management.
//!
//! The server takes a root directory on the command line; `config.toml`
//! inside it is optional and every field has a default, so a bare directory
//! is a valid deployment.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server information.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Server listen and logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the gateway binds to.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            log_format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database file name, resolved relative to the server root.
    #[serde(default = "default_db_file")]
    pub file: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            file: default_db_file(),
        }
    }
}

fn default_listen() -> SocketAddr {
    "0.0.0.0:8989".parse().expect("static listen address")
}

fn default_db_file() -> String {
    "confabulator.db".to_string()
}

impl Config {
    /// Load configuration from `<root>/config.toml`, falling back to the
    /// defaults when the file does not exist.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join("config.toml");
        if path.is_file() {
            Ok(toml::from_str(&std::fs::read_to_string(path)?)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Absolute path of the database file under the server root.
    pub fn database_path(&self, root: &Path) -> PathBuf {
        root.join(&self.database.file)
    }
}
