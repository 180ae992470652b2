// observability/mod.rs - Tracing and Metrics

//! Structured logging and Prometheus counters.
//!
//! - **Tracing**: `tracing-subscriber` with pretty, compact or JSON output
//! - **Metrics**: validation, message, invitation and fetch-timeout counters
//!
//! Recording functions are no-ops until [`init_metrics`] installs a recorder,
//! so library code records unconditionally.
//!
//! # Example
//!
//! ```ignore
//! use chronos_chat::observability::{init_tracing, init_metrics, MetricsConfig, TracingConfig};
//!
//! init_tracing(TracingConfig::default());
//! let handle = init_metrics(MetricsConfig::default()).unwrap();
//! println!("{}", handle.render());
//! ```

mod metrics;
mod tracing_setup;

pub use metrics::{
    init_metrics, record_fetch_timeout, record_invitation, record_message_received,
    record_roster_size, record_validation, ChatMetrics, MetricsConfig, MetricsHandle,
};

pub use tracing_setup::{init_tracing, TracingConfig, TracingFormat};
