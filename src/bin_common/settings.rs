//! Application settings
//!
//! Loaded from YAML; the bot token comes from `DISCORD_TOKEN` (optionally
//! via `.env`) and is never read from the file.
//!
//! ```yaml
//! log_level: info
//! gateway:
//!   intents: [GUILDS, GUILD_MESSAGES]
//!   reconnect: true
//! presence:
//!   status: online
//! ```

use gatewire::{GatewayConfig, Intents};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable holding the bot token
pub const TOKEN_ENV_VAR: &str = "DISCORD_TOKEN";

const PRESENCE_STATUSES: [&str; 5] = ["online", "dnd", "idle", "invisible", "offline"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarMissing(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Top-level settings file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub gateway: GatewaySettings,
    #[serde(default)]
    pub presence: Option<PresenceSettings>,

    /// Bot token from the environment (not in YAML)
    #[serde(skip)]
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    #[serde(default = "default_gateway_url")]
    pub url: String,
    #[serde(default = "default_api_version")]
    pub api_version: u8,
    /// Intent names, e.g. `GUILD_MESSAGES`
    pub intents: Vec<String>,
    #[serde(default = "default_true")]
    pub reconnect: bool,
    /// `[shard_id, shard_count]`
    #[serde(default)]
    pub shard: Option<[u32; 2]>,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_reidentify_delay_ms")]
    pub reidentify_delay_ms: u64,
}

/// Presence announced with Identify
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceSettings {
    pub status: String,
    #[serde(default)]
    pub afk: bool,
    /// Shown as "Playing <activity>"
    #[serde(default)]
    pub activity: Option<String>,
}

impl PresenceSettings {
    /// Gateway presence object
    pub fn to_value(&self) -> Value {
        let activities: Vec<Value> = self
            .activity
            .iter()
            .map(|name| json!({"name": name, "type": 0}))
            .collect();

        json!({
            "since": null,
            "activities": activities,
            "status": self.status,
            "afk": self.afk,
        })
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_gateway_url() -> String {
    gatewire::config::DEFAULT_GATEWAY_URL.to_string()
}

fn default_api_version() -> u8 {
    gatewire::config::DEFAULT_API_VERSION
}

fn default_true() -> bool {
    true
}

fn default_reconnect_delay_ms() -> u64 {
    gatewire::config::DEFAULT_RECONNECT_DELAY.as_millis() as u64
}

fn default_reidentify_delay_ms() -> u64 {
    gatewire::config::DEFAULT_REIDENTIFY_DELAY.as_millis() as u64
}

impl BotSettings {
    /// Load settings from YAML file and the token from the environment
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        let mut settings = Self::from_yaml(&yaml_content)?;

        // Don't fail if .env doesn't exist
        dotenv::dotenv().ok();

        settings.token = std::env::var(TOKEN_ENV_VAR)
            .map_err(|_| ConfigError::EnvVarMissing(TOKEN_ENV_VAR.to_string()))?;

        Ok(settings)
    }

    /// Parse and validate settings without touching the environment
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let settings: BotSettings = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn intents(&self) -> Result<Intents> {
        Intents::from_names(self.gateway.intents.as_slice())
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Library configuration for these settings
    pub fn to_gateway_config(&self) -> Result<GatewayConfig> {
        let gateway = &self.gateway;

        let mut config = GatewayConfig::new(self.token.clone(), self.intents()?)
            .with_gateway_url(gateway.url.clone())
            .with_api_version(gateway.api_version)
            .with_reconnect(gateway.reconnect)
            .with_reconnect_delay(Duration::from_millis(gateway.reconnect_delay_ms))
            .with_reidentify_delay(Duration::from_millis(gateway.reidentify_delay_ms));

        if let Some([id, count]) = gateway.shard {
            config = config.with_shard(id, count);
        }
        if let Some(presence) = &self.presence {
            config = config.with_presence(presence.to_value());
        }

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.intents()?;

        if let Some([id, count]) = self.gateway.shard {
            if count == 0 || id >= count {
                return Err(ConfigError::ValidationError(format!(
                    "shard must be [id, count] with id < count, got [{}, {}]",
                    id, count
                )));
            }
        }

        if let Some(presence) = &self.presence {
            if !PRESENCE_STATUSES.contains(&presence.status.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "presence status must be one of {:?}, got {:?}",
                    PRESENCE_STATUSES, presence.status
                )));
            }
        }

        if !self.gateway.url.starts_with("ws://") && !self.gateway.url.starts_with("wss://") {
            return Err(ConfigError::ValidationError(
                "gateway url must use ws:// or wss://".to_string(),
            ));
        }

        Ok(())
    }
}
