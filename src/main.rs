//! sigrelay - TradingView to Telegram alert relay
//!
//! Accepts alert webhooks over HTTP and broadcasts them to every subscribed
//! chat through the Telegram Bot API.

use anyhow::Result;
use clap::Parser;
use sigrelay::{
    app::{supervise, App},
    cli::Cli,
    config::Config,
};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is the normal case in production.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match Config::load(&cli).and_then(|config| config.validate().map(|_| config)) {
        Ok(config) => config,
        Err(err) => {
            // Logging is not configured yet; fall back to a default subscriber for this one error.
            tracing_subscriber::fmt().init();
            error!("Failed to load configuration: {:#}", err);
            std::process::exit(1);
        }
    };

    init_logging(&config.log_level, cli.json_logs);

    info!("sigrelay starting up...");
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Listen Address: {}:{}", config.server.host, config.server.port);
    info!("Subscriber File: {}", config.subscribers.path.display());
    info!("Telegram API: {}", config.telegram.api_url);
    info!("Max Concurrent Sends: {}", config.relay.max_concurrent_sends);
    info!("Send Timeout: {}ms", config.relay.send_timeout_ms);
    info!(
        "Metrics Endpoint: {}",
        if config.metrics.enabled { "Enabled" } else { "Disabled" }
    );
    info!("-------------------------------------------------------");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let app = App::builder(config).build(shutdown_rx).await?;

    let server = tokio::spawn(app.run());
    let result = supervise(server, shutdown_tx, tokio::signal::ctrl_c()).await;
    if let Err(e) = &result {
        error!("Server exited with error: {:#}", e);
    }

    info!("Exiting.");
    result
}

/// Installs the global tracing subscriber. `RUST_LOG` wins over the configured level.
fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
