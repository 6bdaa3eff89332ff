//! Configuration management for sigrelay
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all application settings. It uses the `figment`
//! crate to layer defaults, a `sigrelay.toml` file, environment variables and
//! command-line arguments.

use crate::cli::Cli;
use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The file read when `--config` is not given. A missing file is not an error.
pub const DEFAULT_CONFIG_FILE: &str = "sigrelay.toml";

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Configuration for the HTTP listener.
    pub server: ServerConfig,
    /// Configuration for the Telegram transport.
    pub telegram: TelegramConfig,
    /// Configuration for subscriber persistence.
    pub subscribers: SubscribersConfig,
    /// Configuration for alert fan-out.
    pub relay: RelayConfig,
    /// Configuration for the Prometheus endpoint.
    pub metrics: MetricsConfig,
}

/// Configuration for the HTTP listener.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Configuration for the Telegram transport.
#[derive(Deserialize, Serialize, Clone, PartialEq)]
pub struct TelegramConfig {
    /// The bot token issued by @BotFather.
    pub bot_token: String,
    /// Base URL of the Bot API.
    pub api_url: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

/// Configuration for subscriber persistence.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SubscribersConfig {
    /// Path of the JSON file holding the subscriber list.
    pub path: PathBuf,
}

/// Configuration for alert fan-out.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RelayConfig {
    /// Text sent when an alert carries no `message`.
    pub default_message: String,
    /// Maximum number of sends in flight for one alert.
    pub max_concurrent_sends: usize,
    /// Upper bound for a single recipient's send, in milliseconds.
    pub send_timeout_ms: u64,
}

/// Configuration for the Prometheus endpoint.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct MetricsConfig {
    /// Serve `GET /metrics` on the main listener.
    pub enabled: bool,
}

impl Config {
    /// Loads the application configuration.
    ///
    /// Sources, lowest precedence first: built-in defaults, the TOML file,
    /// `SIGRELAY_`-prefixed variables (`__` separates nested keys), the plain
    /// `BOT_TOKEN`/`PORT` deployment variables, and finally command-line
    /// arguments.
    pub fn load(cli: &Cli) -> Result<Self> {
        let path = cli
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let config: Config = Self::figment(&path).merge(cli).extract()?;
        Ok(config)
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            // e.g. SIGRELAY_RELAY__MAX_CONCURRENT_SENDS=32
            .merge(Env::prefixed("SIGRELAY_").split("__"))
            .merge(Env::raw().filter_map(|key| {
                if key.as_str().eq_ignore_ascii_case("BOT_TOKEN") {
                    Some("telegram.bot_token".into())
                } else if key.as_str().eq_ignore_ascii_case("PORT") {
                    Some("server.port".into())
                } else {
                    None
                }
            }))
    }

    /// Rejects configurations the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            bail!("BOT_TOKEN is missing. Set BOT_TOKEN or telegram.bot_token in the config file.");
        }
        if self.relay.max_concurrent_sends == 0 {
            bail!("relay.max_concurrent_sends must be at least 1");
        }
        if self.subscribers.path.as_os_str().is_empty() {
            bail!("subscribers.path must not be empty");
        }
        Ok(())
    }
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            telegram: TelegramConfig {
                bot_token: String::new(),
                api_url: "https://api.telegram.org".to_string(),
                timeout_ms: 10_000,
            },
            subscribers: SubscribersConfig {
                path: PathBuf::from("subscribed_users.json"),
            },
            relay: RelayConfig {
                default_message: "New signal received".to_string(),
                max_concurrent_sends: 16,
                send_timeout_ms: 10_000,
            },
            metrics: MetricsConfig::default(),
        }
    }
}
