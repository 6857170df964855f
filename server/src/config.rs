//! Configuration management for the server.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Node id of the served store
    pub node_id: String,
    /// Store directory; the store lives in memory when unset
    pub data_dir: Option<PathBuf>,
    /// `fsync` every journal write
    pub sync_writes: bool,
    /// Upper bound for the `limit` of a changes request
    pub changes_max_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5984,
            node_id: "server".to_string(),
            data_dir: None,
            sync_writes: false,
            changes_max_limit: 1000,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let host = env::var("HOST").unwrap_or(defaults.host);
        let port = parse_var("PORT", defaults.port, ConfigError::InvalidPort)?;
        let node_id = env::var("NODE_ID").unwrap_or(defaults.node_id);
        if node_id.trim().is_empty() {
            return Err(ConfigError::EmptyNodeId);
        }
        let data_dir = env::var("DATA_DIR")
            .ok()
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from);
        let sync_writes = parse_var("SYNC_WRITES", defaults.sync_writes, ConfigError::InvalidSyncWrites)?;
        let changes_max_limit = parse_var(
            "CHANGES_MAX_LIMIT",
            defaults.changes_max_limit,
            ConfigError::InvalidChangesLimit,
        )?;
        if changes_max_limit == 0 {
            return Err(ConfigError::InvalidChangesLimit);
        }

        Ok(Self {
            host,
            port,
            node_id,
            data_dir,
            sync_writes,
            changes_max_limit,
        })
    }

    /// Store configuration for the served store.
    pub fn store_config(&self) -> burrow_engine::StoreConfig {
        let config = match &self.data_dir {
            Some(dir) => burrow_engine::StoreConfig::persistent(self.node_id.clone(), dir.clone()),
            None => burrow_engine::StoreConfig::in_memory(self.node_id.clone()),
        };
        config.with_sync_writes(self.sync_writes)
    }
}

fn parse_var<T: FromStr>(name: &str, default: T, error: ConfigError) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value.parse().map_err(|_| error),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("NODE_ID must not be empty")]
    EmptyNodeId,

    #[error("Invalid SYNC_WRITES value (expected true or false)")]
    InvalidSyncWrites,

    #[error("Invalid CHANGES_MAX_LIMIT value (expected a positive integer)")]
    InvalidChangesLimit,
}
