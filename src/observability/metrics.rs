// observability/metrics.rs - Prometheus Metrics

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Configuration for metrics
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Serve `/metrics` here; without it metrics are only rendered on demand
    pub listen_addr: Option<SocketAddr>,
}

/// Handle to the Prometheus recorder
#[derive(Clone)]
pub struct MetricsHandle {
    handle: PrometheusHandle,
}

impl MetricsHandle {
    /// Render metrics in Prometheus text format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Metric names
pub struct ChatMetrics;

impl ChatMetrics {
    pub const VALIDATIONS_TOTAL: &'static str = "chronos_validations_total";
    pub const MESSAGES_RECEIVED_TOTAL: &'static str = "chronos_messages_received_total";
    pub const INVITATIONS_TOTAL: &'static str = "chronos_invitations_total";
    pub const FETCH_TIMEOUTS_TOTAL: &'static str = "chronos_fetch_timeouts_total";
    pub const ROSTER_SIZE: &'static str = "chronos_roster_size";
}

/// Install the global recorder, serving it over HTTP when an address is set
///
/// With a listen address this must run inside a Tokio runtime.
pub fn init_metrics(config: MetricsConfig) -> Result<MetricsHandle, Box<dyn std::error::Error>> {
    let handle = match config.listen_addr {
        Some(addr) => {
            let (recorder, exporter) = PrometheusBuilder::new().with_http_listener(addr).build()?;
            let handle = recorder.handle();
            metrics::set_global_recorder(recorder).map_err(|e| e.to_string())?;
            tokio::spawn(async move {
                if let Err(e) = exporter.await {
                    tracing::error!(error = %e, "Metrics exporter stopped");
                }
            });
            tracing::info!(addr = %addr, "Metrics HTTP listener started");
            handle
        }
        None => PrometheusBuilder::new().install_recorder()?,
    };

    describe_counter!(
        ChatMetrics::VALIDATIONS_TOTAL,
        "Completed validations by outcome"
    );
    describe_counter!(
        ChatMetrics::MESSAGES_RECEIVED_TOTAL,
        "Chat messages received by type"
    );
    describe_counter!(
        ChatMetrics::INVITATIONS_TOTAL,
        "Invitation exchanges by outcome"
    );
    describe_counter!(
        ChatMetrics::FETCH_TIMEOUTS_TOTAL,
        "Data fetches abandoned after their last retry"
    );
    describe_gauge!(ChatMetrics::ROSTER_SIZE, "Participants currently in the roster");

    Ok(MetricsHandle { handle })
}

// Recording functions

/// Record a finished validation; `outcome` is "success" or a failure label
pub fn record_validation(outcome: &'static str) {
    counter!(ChatMetrics::VALIDATIONS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_message_received(msg_type: &'static str) {
    counter!(ChatMetrics::MESSAGES_RECEIVED_TOTAL, "type" => msg_type).increment(1);
}

/// Record an invitation outcome, e.g. "accepted", "rejected", "timed_out"
pub fn record_invitation(outcome: &'static str) {
    counter!(ChatMetrics::INVITATIONS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_fetch_timeout() {
    counter!(ChatMetrics::FETCH_TIMEOUTS_TOTAL).increment(1);
}

pub fn record_roster_size(size: usize) {
    gauge!(ChatMetrics::ROSTER_SIZE).set(size as f64);
}
