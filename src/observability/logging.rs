//! Structured logging.
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies to this
//! crate and to `tower_http`'s request spans.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Install the global subscriber. Safe to call once per process.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(&config.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init(),
    };

    if let Err(e) = result {
        eprintln!("logging already initialized: {e}");
    }
}

fn default_filter(level: &str) -> EnvFilter {
    EnvFilter::new(format!("fusion_ingress={level},tower_http={level},telemetry={level}"))
}
