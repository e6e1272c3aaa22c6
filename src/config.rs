use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::common::Identity;
use crate::error::ChatError;
use crate::storage::ensure_parent_dir;

pub const DEFAULT_CONFIG_PATH: &str = "config/client.json";
const DEFAULT_DATABASE_PATH: &str = "data/chat.db";
const DEFAULT_CHANNEL_CAPACITY: usize = 100;
const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Size of the UI <-> client channels
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// How often to look for writes from other processes; 0 disables
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub identity: Option<Identity>,
    /// Profiles registered in the directory at startup
    #[serde(default)]
    pub seed_users: Vec<SeedUser>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedUser {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

fn default_database_path() -> String {
    DEFAULT_DATABASE_PATH.to_string()
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            channel_capacity: default_channel_capacity(),
            poll_interval_ms: default_poll_interval_ms(),
            identity: None,
            seed_users: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ChatError> {
        if self.database_path.trim().is_empty() {
            return Err(ChatError::Config("database_path is empty".to_string()));
        }
        if self.channel_capacity == 0 {
            return Err(ChatError::Config(
                "channel_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

pub fn load_config(path: &str) -> AppConfig {
    let path = Path::new(path);
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Failed to parse config file {}: {err}", path.display());
                AppConfig::default()
            }
        },
        Err(err) => {
            log::info!(
                "Config file {} not found ({err}); using defaults",
                path.display()
            );
            AppConfig::default()
        }
    }
}

pub fn save_config(path: &str, config: &AppConfig) -> std::io::Result<()> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> String {
        std::env::temp_dir()
            .join(format!("dm_live_chat_{}_{name}", std::process::id()))
            .join("client.json")
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_config(&temp_path("missing"));
        assert_eq!(config, AppConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{ "identity": { "id": "alice", "email": "alice@example.com", "verified": true } }"#,
        )
        .unwrap();
        assert_eq!(config.database_path, DEFAULT_DATABASE_PATH);
        assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert!(config.identity.unwrap().verified);
    }

    #[test]
    fn saved_config_loads_back() {
        let path = temp_path("saved");
        let mut config = AppConfig::default();
        config.seed_users.push(SeedUser {
            id: "bob".to_string(),
            email: "bob@example.com".to_string(),
            display_name: None,
        });
        save_config(&path, &config).unwrap();
        assert_eq!(load_config(&path), config);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let config = AppConfig {
            channel_capacity: 0,
            ..AppConfig::default()
        };
        assert!(matches!(config.validate(), Err(ChatError::Config(_))));
    }
}
