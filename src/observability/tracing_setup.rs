// observability/tracing_setup.rs - Tracing Configuration

use serde::{Deserialize, Serialize};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Log output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TracingFormat {
    /// Human-readable multi-line output
    #[default]
    Pretty,
    /// Single line per event
    Compact,
    /// JSON lines for log aggregation
    Json,
}

/// Configuration for tracing
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Filter directive, overridden by `RUST_LOG`
    pub filter: String,

    pub format: TracingFormat,

    /// Emit span open/close events
    pub with_span_events: bool,

    /// Include file and line numbers
    pub with_file: bool,

    pub with_target: bool,

    /// ANSI colors (ignored for JSON)
    pub with_ansi: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            filter: "info,chronos_chat=debug".into(),
            format: TracingFormat::Compact,
            with_span_events: false,
            with_file: false,
            with_target: true,
            with_ansi: true,
        }
    }
}

impl TracingConfig {
    /// JSON, info level, no colors
    pub fn production() -> Self {
        Self {
            filter: "info".into(),
            format: TracingFormat::Json,
            with_ansi: false,
            ..Self::default()
        }
    }

    /// Pretty, trace level for this crate, with spans and locations
    pub fn development() -> Self {
        Self {
            filter: "debug,chronos_chat=trace".into(),
            format: TracingFormat::Pretty,
            with_span_events: true,
            with_file: true,
            ..Self::default()
        }
    }

    /// Default config with the crate's own level replaced
    pub fn from_level(level: &str) -> Self {
        Self {
            filter: format!("warn,chronos_chat={}", level),
            ..Self::default()
        }
    }

    fn fmt_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let span_events = if self.with_span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let layer = fmt::layer()
            .with_span_events(span_events)
            .with_file(self.with_file)
            .with_line_number(self.with_file)
            .with_target(self.with_target);

        match self.format {
            TracingFormat::Pretty => layer.pretty().with_ansi(self.with_ansi).boxed(),
            TracingFormat::Compact => layer.compact().with_ansi(self.with_ansi).boxed(),
            TracingFormat::Json => layer.json().with_ansi(false).boxed(),
        }
    }
}

/// Install the global subscriber
///
/// Returns false when a subscriber was already installed, e.g. by another
/// test in the same process.
pub fn init_tracing(config: TracingConfig) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let installed = tracing_subscriber::registry()
        .with(config.fmt_layer())
        .with(env_filter)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(filter = %config.filter, format = ?config.format, "Tracing initialized");
    }
    installed
}
