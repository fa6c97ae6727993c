//! # Configuration Management Module
//!
//! Settings for the bot, the Meshtastic link, the Mastodon adapter and logging, loaded
//! from a single TOML file.
//!
//! ## Configuration Structure
//!
//! - [`BotConfig`] - bot identity, command prefix and connection greeting
//! - [`MeshtasticConfig`] - serial device, default channel and frame sizing
//! - [`MastodonConfig`] - credential storage, notification relay and timeouts
//! - [`LoggingConfig`] - log level and log file destinations
//!
//! ## Usage
//!
//! ```rust,no_run
//! use meshbot::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("Bot: {}", config.bot.name);
//!     println!("Serial Port: {}", config.meshtastic.port);
//!
//!     Config::create_default("config.toml").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [bot]
//! name = "meshbot"
//! command_prefix = "!"
//! greeting = "Connected to Mesh!"
//!
//! [meshtastic]
//! port = "/dev/ttyUSB0"
//! baud_rate = 115200
//! channel = 0
//! max_text_bytes = 220
//!
//! [mastodon]
//! enabled = true
//! credentials_dir = "./credentials"
//! notify_channel = 2
//! ```
//!
//! Every section except `[meshtastic]` may be omitted; missing fields take the
//! defaults shown by `meshbot init`.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::meshtastic::{DEFAULT_TEXT_BYTES, MAX_TEXT_PAYLOAD};

/// Smallest frame size accepted; keeps every 4-byte UTF-8 character sendable in one frame.
pub const MIN_TEXT_BYTES: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,
    pub meshtastic: MeshtasticConfig,
    #[serde(default)]
    pub mastodon: MastodonConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub name: String,
    /// Single character that marks a message as a command.
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    /// Broadcast on the default channel every time the radio (re)connects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub greeting: Option<String>,
}

fn default_command_prefix() -> String {
    "!".to_string()
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "meshbot".to_string(),
            command_prefix: default_command_prefix(),
            greeting: Some("Connected to Mesh!".to_string()),
        }
    }
}

impl BotConfig {
    /// The configured prefix as a char. Falls back to `!` when the value is invalid.
    pub fn prefix_char(&self) -> char {
        match crate::validation::validate_command_prefix(&self.command_prefix) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("{}; using '!'", e);
                '!'
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshtasticConfig {
    pub port: String,
    pub baud_rate: u32,
    /// Default channel for replies without an origin, greetings and notifications.
    pub channel: u32,
    /// Largest text payload per frame; clamped to 4..=233 at use.
    #[serde(default = "default_max_text_bytes")]
    pub max_text_bytes: usize,
    /// Exit with an error when the device cannot be opened. When false (default) the
    /// bot starts with a transport that drops every send.
    #[serde(default)]
    pub require_device_at_startup: bool,
    /// Seconds between serial API heartbeats (0 disables them).
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    /// Minimum gap between consecutive text frames (ms).
    #[serde(default = "default_min_send_gap_ms")]
    pub min_send_gap_ms: u64,
}

fn default_max_text_bytes() -> usize {
    DEFAULT_TEXT_BYTES
}

fn default_heartbeat_interval_secs() -> u64 {
    300
}

fn default_min_send_gap_ms() -> u64 {
    2000
}

impl Default for MeshtasticConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115200,
            channel: 0,
            max_text_bytes: default_max_text_bytes(),
            require_device_at_startup: false,
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            min_send_gap_ms: default_min_send_gap_ms(),
        }
    }
}

impl MeshtasticConfig {
    pub fn effective_max_text_bytes(&self) -> usize {
        self.max_text_bytes.clamp(MIN_TEXT_BYTES, MAX_TEXT_PAYLOAD)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MastodonConfig {
    pub enabled: bool,
    /// Client name shown on the instance's authorized apps page.
    pub app_name: String,
    /// Directory holding `clientcred.json` and `usercred.json`.
    pub credentials_dir: String,
    /// Channel notifications are relayed to; defaults to `meshtastic.channel`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_channel: Option<u32>,
    /// Post plain (non-command) radio text to Mastodon.
    #[serde(default)]
    pub relay_unhandled: bool,
    /// HTTP request timeout in seconds.
    pub timeout_seconds: u64,
    /// Relay streaming notifications to the mesh.
    #[serde(default = "default_stream_notifications")]
    pub stream_notifications: bool,
}

fn default_stream_notifications() -> bool {
    true
}

impl Default for MastodonConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            app_name: "meshbot".to_string(),
            credentials_dir: "./credentials".to_string(),
            notify_channel: Some(2),
            relay_unhandled: false,
            timeout_seconds: 10,
            stream_notifications: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    /// Login and credential events are mirrored here.
    #[serde(default)]
    pub security_file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some("meshbot.log".to_string()),
            security_file: Some("meshbot-security.log".to_string()),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Reject values that would leave the bot unusable.
    pub fn validate(&self) -> Result<()> {
        crate::validation::validate_command_prefix(&self.bot.command_prefix)
            .map_err(|e| anyhow!("Invalid [bot] section: {}", e))?;
        if self.meshtastic.port.trim().is_empty() {
            return Err(anyhow!("Invalid [meshtastic] section: port is empty"));
        }
        if self.meshtastic.baud_rate == 0 {
            return Err(anyhow!("Invalid [meshtastic] section: baud_rate is 0"));
        }
        if self.mastodon.enabled && self.mastodon.credentials_dir.trim().is_empty() {
            return Err(anyhow!(
                "Invalid [mastodon] section: credentials_dir is empty"
            ));
        }
        Ok(())
    }

    /// Channel used for relayed notifications.
    pub fn notify_channel(&self) -> u32 {
        self.mastodon
            .notify_channel
            .unwrap_or(self.meshtastic.channel)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bot: BotConfig::default(),
            meshtastic: MeshtasticConfig::default(),
            mastodon: MastodonConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.bot.command_prefix, "!");
        assert_eq!(parsed.bot.greeting.as_deref(), Some("Connected to Mesh!"));
        assert_eq!(parsed.meshtastic.max_text_bytes, 220);
        assert_eq!(parsed.mastodon.notify_channel, Some(2));
    }

    #[test]
    fn test_minimal_config_fills_defaults() {
        let text = r#"
            [meshtastic]
            port = "/dev/ttyACM0"
            baud_rate = 115200
            channel = 1
        "#;
        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(config.bot.name, "meshbot");
        assert_eq!(config.meshtastic.heartbeat_interval_secs, 300);
        assert_eq!(config.meshtastic.min_send_gap_ms, 2000);
        assert!(!config.meshtastic.require_device_at_startup);
        assert_eq!(config.logging.level, "info");
        config.validate().unwrap();
    }

    #[test]
    fn test_max_text_bytes_is_clamped() {
        let mut m = MeshtasticConfig::default();
        m.max_text_bytes = 1000;
        assert_eq!(m.effective_max_text_bytes(), MAX_TEXT_PAYLOAD);
        m.max_text_bytes = 0;
        assert_eq!(m.effective_max_text_bytes(), MIN_TEXT_BYTES);
        m.max_text_bytes = 100;
        assert_eq!(m.effective_max_text_bytes(), 100);
    }

    #[test]
    fn test_notify_channel_falls_back_to_bot_channel() {
        let mut config = Config::default();
        config.mastodon.notify_channel = None;
        config.meshtastic.channel = 3;
        assert_eq!(config.notify_channel(), 3);
        config.mastodon.notify_channel = Some(5);
        assert_eq!(config.notify_channel(), 5);
    }

    #[test]
    fn test_validate_rejects_bad_prefix() {
        let mut config = Config::default();
        config.bot.command_prefix = "!!".to_string();
        assert!(config.validate().is_err());
        assert_eq!(config.bot.prefix_char(), '!');
    }

    #[tokio::test]
    async fn test_create_default_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let path = path.to_str().unwrap();
        Config::create_default(path).await.unwrap();
        let loaded = Config::load(path).await.unwrap();
        assert_eq!(loaded.meshtastic.port, "/dev/ttyUSB0");
        assert!(loaded.mastodon.enabled);
    }
}
