//! Broadcasts alerts to every current subscriber.
//!
//! Delivery is best effort: each recipient gets exactly one attempt, sends run
//! concurrently up to a fixed limit, and a failure for one recipient never
//! stops delivery to the others. Failures are logged and counted but are not
//! reported to the webhook caller.

use crate::config::RelayConfig;
use crate::core::{AlertPayload, SubscriberId, Transport};
use crate::errors::TransportError;
use crate::store::SubscriberStore;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};

/// The outcome of one send attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryOutcome {
    pub recipient: SubscriberId,
    pub result: Result<(), TransportError>,
}

/// Aggregate of a completed fan-out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchSummary {
    pub attempted: usize,
    pub delivered: usize,
    pub failures: Vec<DeliveryOutcome>,
}

impl DispatchSummary {
    fn from_outcomes(outcomes: Vec<DeliveryOutcome>) -> Self {
        let attempted = outcomes.len();
        let failures: Vec<_> = outcomes.into_iter().filter(|o| o.result.is_err()).collect();
        Self {
            attempted,
            delivered: attempted - failures.len(),
            failures,
        }
    }
}

/// What `handle_alert` did with an alert.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayReport {
    NoSubscribers,
    Dispatched(DispatchSummary),
}

/// Fans a single alert out to all subscribers through a `Transport`.
pub struct AlertRelay {
    store: Arc<SubscriberStore>,
    transport: Arc<dyn Transport>,
    default_message: String,
    max_concurrent_sends: usize,
    send_timeout: Duration,
}

impl AlertRelay {
    pub fn new(
        store: Arc<SubscriberStore>,
        transport: Arc<dyn Transport>,
        config: &RelayConfig,
    ) -> Self {
        Self {
            store,
            transport,
            default_message: config.default_message.clone(),
            max_concurrent_sends: config.max_concurrent_sends.max(1),
            send_timeout: Duration::from_millis(config.send_timeout_ms),
        }
    }

    /// Sends the alert's message once to every subscriber in the current snapshot.
    #[instrument(skip_all, fields(transport = self.transport.name()))]
    pub async fn handle_alert(&self, payload: &AlertPayload) -> RelayReport {
        metrics::counter!("relay_alerts_received_total").increment(1);
        let subscribers = self.store.snapshot();
        if subscribers.is_empty() {
            info!("No subscribed users to send the signal.");
            return RelayReport::NoSubscribers;
        }

        let message: Arc<str> = Arc::from(payload.message_or(&self.default_message).as_ref());
        let recipients: Vec<SubscriberId> = subscribers.iter().cloned().collect();

        let start = Instant::now();
        let outcomes: Vec<DeliveryOutcome> = stream::iter(recipients)
            .map(move |recipient| self.deliver(recipient, message.clone()))
            .buffer_unordered(self.max_concurrent_sends)
            .collect()
            .await;
        metrics::histogram!("relay_fanout_duration_seconds").record(start.elapsed().as_secs_f64());

        let summary = DispatchSummary::from_outcomes(outcomes);
        if summary.failures.is_empty() {
            info!(delivered = summary.delivered, "Signal delivered to all subscribers.");
        } else {
            warn!(
                attempted = summary.attempted,
                delivered = summary.delivered,
                failed = summary.failures.len(),
                "Signal delivered with failures."
            );
        }
        RelayReport::Dispatched(summary)
    }

    async fn deliver(&self, recipient: SubscriberId, message: Arc<str>) -> DeliveryOutcome {
        let send = self.transport.send(&recipient, &message);
        let result = match tokio::time::timeout(self.send_timeout, send).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        };

        match &result {
            Ok(()) => {
                metrics::counter!("relay_deliveries_total", "outcome" => "delivered").increment(1);
                info!(recipient = %recipient, "Sent signal.");
            }
            Err(e) => {
                metrics::counter!("relay_deliveries_total", "outcome" => "failed").increment(1);
                error!(recipient = %recipient, error = %e, "Failed to send signal.");
            }
        }

        DeliveryOutcome { recipient, result }
    }
}
