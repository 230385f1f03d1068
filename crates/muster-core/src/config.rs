//! MusterBot bootstrap configuration.
//!
//! Only what the process needs before the database is open lives here: the
//! bot's own account, the muster group, the database path, and how to reach
//! the signal-cli daemon. Schedule times and the time zone live in the
//! database `config` table so admins can change them at runtime.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MusterConfig {
    /// The bot's own Signal account number. Never reminded, never counted.
    #[serde(default)]
    pub account: String,
    /// Internal id of the group being mustered.
    #[serde(default)]
    pub group_id: String,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default)]
    pub signal: SignalConfig,
}

fn default_database_path() -> String {
    "~/.musterbot/muster.db".into()
}

impl Default for MusterConfig {
    fn default() -> Self {
        Self {
            account: String::new(),
            group_id: String::new(),
            database_path: default_database_path(),
            signal: SignalConfig::default(),
        }
    }
}

impl MusterConfig {
    /// Load config from the default path (~/.musterbot/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::MusterError::Config(format!("Failed to read config: {e}"))
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            crate::error::MusterError::Config(format!("Failed to parse config: {e}"))
        })?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| {
            crate::error::MusterError::Config(format!("Failed to serialize config: {e}"))
        })?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the MusterBot home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".musterbot")
    }
}

/// signal-cli JSON-RPC daemon connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    /// Seconds between receive polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

fn default_rpc_url() -> String {
    "http://127.0.0.1:8080/api/v1/rpc".into()
}
fn default_poll_interval() -> u64 {
    2
}
fn default_request_timeout() -> u64 {
    30
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            poll_interval: default_poll_interval(),
            request_timeout: default_request_timeout(),
        }
    }
}
