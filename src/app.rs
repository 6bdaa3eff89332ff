//! The main application logic, decoupled from the entry point.

use crate::{
    config::Config,
    core::{SubscriberStorage, Transport},
    internal_metrics,
    relay::AlertRelay,
    server::{self, AppState},
    store::{JsonFileStorage, SubscriberStore},
    telegram::TelegramClient,
};
use anyhow::{anyhow, Context, Result};
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, instrument};

/// A bound, ready-to-serve application.
pub struct App {
    listener: TcpListener,
    router: Router,
    local_addr: SocketAddr,
    store: Arc<SubscriberStore>,
    shutdown_rx: watch::Receiver<bool>,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn store(&self) -> Arc<SubscriberStore> {
        self.store.clone()
    }

    /// Serves requests until the shutdown signal fires, then drains in-flight requests.
    pub async fn run(self) -> Result<()> {
        let mut shutdown_rx = self.shutdown_rx;
        info!(addr = %self.local_addr, "sigrelay listening.");

        axum::serve(self.listener, self.router.into_make_service())
            .with_graceful_shutdown(async move {
                shutdown_rx.changed().await.ok();
                info!("Shutdown signal received. Draining requests...");
            })
            .await?;

        info!("Server stopped.");
        Ok(())
    }
}

/// Waits for either `signal` or the server task, whichever finishes first.
///
/// On `signal` the server is told to shut down and awaited. A server that
/// stops on its own before any signal is an error, even if it returned `Ok`.
pub async fn supervise<S>(
    mut server: JoinHandle<Result<()>>,
    shutdown_tx: watch::Sender<bool>,
    signal: S,
) -> Result<()>
where
    S: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        res = signal => {
            if let Err(e) = res {
                error!(error = %e, "Failed to listen for the shutdown signal.");
            }
            info!("Shutdown signal received. Shutting down gracefully...");
            shutdown_tx.send(true).ok();
            flatten(server.await)
        }
        res = &mut server => {
            error!("Server stopped before a shutdown signal was received.");
            flatten(res)?;
            Err(anyhow!("server stopped unexpectedly"))
        }
    }
}

fn flatten(joined: std::result::Result<Result<()>, JoinError>) -> Result<()> {
    match joined {
        Ok(result) => result.context("server exited with error"),
        Err(e) => Err(anyhow!("server task panicked: {:?}", e)),
    }
}

/// Builder for the main application.
///
/// Separates constructing the components from running them, and lets tests
/// swap the transport and storage for fakes.
pub struct AppBuilder {
    config: Config,
    transport_override: Option<Arc<dyn Transport>>,
    storage_override: Option<Arc<dyn SubscriberStorage>>,
    listener_override: Option<TcpListener>,
}

impl AppBuilder {
    /// Creates a new `AppBuilder` with the given configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            transport_override: None,
            storage_override: None,
            listener_override: None,
        }
    }

    /// Overrides the messaging transport for testing.
    pub fn transport_override(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport_override = Some(transport);
        self
    }

    /// Overrides the subscriber storage for testing.
    pub fn storage_override(mut self, storage: Arc<dyn SubscriberStorage>) -> Self {
        self.storage_override = Some(storage);
        self
    }

    /// Uses an already-bound listener instead of binding `server.host:server.port`.
    pub fn listener(mut self, listener: TcpListener) -> Self {
        self.listener_override = Some(listener);
        self
    }

    /// Builds and initializes all application components, returning a runnable `App`.
    #[instrument(skip_all)]
    pub async fn build(self, shutdown_rx: watch::Receiver<bool>) -> Result<App> {
        let config = self.config;

        // =========================================================================
        // 1. Metrics
        // =========================================================================
        let prometheus = if config.metrics.enabled {
            Some(internal_metrics::install_prometheus()?)
        } else {
            None
        };

        // =========================================================================
        // 2. Services
        // =========================================================================
        let transport = match self.transport_override {
            Some(transport) => transport,
            None => {
                config.validate()?;
                Arc::new(TelegramClient::from_config(&config.telegram)?) as Arc<dyn Transport>
            }
        };

        let storage = match self.storage_override {
            Some(storage) => storage,
            None => Arc::new(JsonFileStorage::new(&config.subscribers.path)) as Arc<dyn SubscriberStorage>,
        };
        let store = Arc::new(SubscriberStore::open(storage).await);
        info!(count = store.len(), "Subscriber store ready.");

        let relay = Arc::new(AlertRelay::new(store.clone(), transport, &config.relay));

        // =========================================================================
        // 3. HTTP
        // =========================================================================
        let router = server::router(
            AppState {
                store: store.clone(),
                relay,
            },
            prometheus,
        );

        let listener = match self.listener_override {
            Some(listener) => listener,
            None => {
                let addr = format!("{}:{}", config.server.host, config.server.port);
                TcpListener::bind(&addr)
                    .await
                    .with_context(|| format!("failed to bind {}", addr))?
            }
        };
        let local_addr = listener.local_addr()?;

        Ok(App {
            listener,
            router,
            local_addr,
            store,
            shutdown_rx,
        })
    }
}
