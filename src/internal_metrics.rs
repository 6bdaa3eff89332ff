//! # Internal Metrics
//!
//! Metric names and descriptions, plus installation of the Prometheus
//! recorder that backs `GET /metrics`. Call sites use the `metrics` macros
//! directly; without an installed recorder those calls are no-ops.

use anyhow::Result;
use metrics::Unit;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Registers descriptions for every metric the service emits.
pub fn describe() {
    metrics::describe_counter!(
        "relay_alerts_received_total",
        Unit::Count,
        "Total number of alerts received on the webhook."
    );
    metrics::describe_counter!(
        "relay_deliveries_total",
        Unit::Count,
        "Total number of per-recipient send attempts, labeled by outcome."
    );
    metrics::describe_histogram!(
        "relay_fanout_duration_seconds",
        Unit::Seconds,
        "Time taken to fan one alert out to all subscribers."
    );
    metrics::describe_gauge!(
        "subscribers",
        Unit::Count,
        "The current number of subscribers."
    );
    metrics::describe_counter!(
        "subscriber_persist_failures_total",
        Unit::Count,
        "Total number of failed writes of the subscriber file."
    );
}

/// Installs the global Prometheus recorder.
///
/// Fails if another recorder is already installed in this process.
pub fn install_prometheus() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe();
    Ok(handle)
}
