//! # Structured Logging
//!
//! Sets up the `tracing` subscriber for the wallet binary. Output format
//! is selectable (compact for humans, JSON for log pipelines), filtering
//! follows `RUST_LOG`, and everything goes to stderr so stdout stays
//! clean for the demo's summary output.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Compact human-readable output for local runs.
    Pretty,
    /// JSON lines for log aggregation.
    Json,
}

impl LogFormat {
    /// Parse a format string. Accepts "json" or "pretty" (case-insensitive);
    /// anything else falls back to `Pretty` rather than refusing to start.
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Initialize the global tracing subscriber. Call exactly once, early in
/// `main()` — a second call panics, by design of the global registry.
///
/// `default_level` applies when `RUST_LOG` is unset; the usual value is
/// `"umbra_wallet=info,umbra_protocol=info"`. When `RUST_LOG` is set it
/// wins, with full `EnvFilter` directive syntax.
pub fn init_logging(default_level: &str, format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry
            .with(fmt::layer().compact().with_target(true))
            .init(),
        LogFormat::Json => registry.with(fmt::layer().json().with_target(true)).init(),
    }

    tracing::debug!(?format, "logging initialized");
}
