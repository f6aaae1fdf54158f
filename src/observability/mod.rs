//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every request reaching dispatch:
//!     → telemetry.rs (one TelemetryRecord → TelemetrySink)
//!     → metrics.rs (request counter, latency histogram)
//!
//! Ingress rejections, lifecycle transitions:
//!     → logging.rs (structured events)
//!     → metrics.rs (rejection counters, lifecycle gauge)
//! ```
//!
//! # Design Decisions
//! - Observability never fails a request
//! - Metrics are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
pub mod telemetry;

pub use telemetry::{
    ChannelSink, LogSink, TelemetryError, TelemetryInterceptor, TelemetryRecord, TelemetrySink,
};
