//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged with
//! the configuration from the `sigrelay.toml` file and environment variables.

use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Relays webhook trading alerts to subscribed Telegram chats.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Address to bind the HTTP listener to.
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Port to bind the HTTP listener to.
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Path of the subscriber list file.
    #[arg(long, value_name = "FILE")]
    pub subscribers_file: Option<PathBuf>,

    /// Log level or filter directive (e.g. "debug", "sigrelay=trace").
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Serve Prometheus metrics at /metrics.
    #[arg(long)]
    pub metrics: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub json_logs: bool,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut server = Dict::new();
        if let Some(host) = &self.host {
            server.insert("host".into(), Value::from(host.clone()));
        }
        if let Some(port) = self.port {
            server.insert("port".into(), Value::from(port));
        }

        let mut dict = Dict::new();
        if !server.is_empty() {
            dict.insert("server".into(), Value::from(server));
        }

        if let Some(path) = &self.subscribers_file {
            let mut subscribers = Dict::new();
            subscribers.insert(
                "path".into(),
                Value::from(path.to_string_lossy().into_owned()),
            );
            dict.insert("subscribers".into(), Value::from(subscribers));
        }

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        // A bare flag can only switch metrics on; absence leaves lower layers alone.
        if self.metrics {
            let mut metrics = Dict::new();
            metrics.insert("enabled".into(), Value::from(true));
            dict.insert("metrics".into(), Value::from(metrics));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
