//! Per-request telemetry capture.
//!
//! # Responsibilities
//! - Build exactly one [`TelemetryRecord`] per request that reaches this layer
//! - Hand it to a [`TelemetrySink`] after the response is produced
//!
//! # Design Decisions
//! - Emission happens after the handler returns and before the body streams;
//!   the body is never buffered
//! - Sink errors and sink panics stop at [`TelemetryInterceptor::observe`];
//!   they are logged and counted, never surfaced to the client
//! - Handler panics are converted to 500 by an inner layer, so they are
//!   recorded like any other response

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::http::request::RequestContext;
use crate::observability::metrics;

/// Write-once record describing one request/response pair.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TelemetryRecord {
    pub request_id: Option<String>,
    pub method: String,
    pub path: String,
    pub origin: Option<String>,
    pub client: String,
    pub user_agent: Option<String>,
    pub received_at: DateTime<Utc>,
    pub status: u16,
    pub latency_ms: f64,
}

impl TelemetryRecord {
    pub fn new(ctx: &RequestContext, status: StatusCode, latency: Duration) -> Self {
        Self {
            request_id: ctx.request_id.clone(),
            method: ctx.method.to_string(),
            path: ctx.path.clone(),
            origin: ctx.origin.clone(),
            client: ctx.client_identity.clone(),
            user_agent: ctx.user_agent.clone(),
            received_at: ctx.received_at,
            status: status.as_u16(),
            latency_ms: latency.as_secs_f64() * 1000.0,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("telemetry channel is full")]
    ChannelFull,

    #[error("telemetry channel is closed")]
    ChannelClosed,
}

/// Destination for telemetry records. Must not block.
pub trait TelemetrySink: Send + Sync {
    fn emit(&self, record: TelemetryRecord) -> Result<(), TelemetryError>;
}

/// Emits each record as a structured event on the `telemetry` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn emit(&self, record: TelemetryRecord) -> Result<(), TelemetryError> {
        tracing::info!(
            target: "telemetry",
            request_id = record.request_id.as_deref().unwrap_or("-"),
            method = %record.method,
            path = %record.path,
            origin = record.origin.as_deref().unwrap_or("-"),
            client = %record.client,
            user_agent = record.user_agent.as_deref().unwrap_or("-"),
            status = record.status,
            latency_ms = record.latency_ms,
            received_at = %record.received_at.to_rfc3339(),
            "request completed"
        );
        Ok(())
    }
}

/// Forwards records over a bounded channel. A full channel drops the record.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<TelemetryRecord>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<TelemetryRecord>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl TelemetrySink for ChannelSink {
    fn emit(&self, record: TelemetryRecord) -> Result<(), TelemetryError> {
        self.tx.try_send(record).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TelemetryError::ChannelFull,
            mpsc::error::TrySendError::Closed(_) => TelemetryError::ChannelClosed,
        })
    }
}

/// Drain a [`ChannelSink`] into the `analytics` log target until shutdown.
pub fn spawn_channel_writer(
    mut rx: mpsc::Receiver<TelemetryRecord>,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                record = rx.recv() => match record {
                    Some(record) => match serde_json::to_string(&record) {
                        Ok(line) => tracing::info!(target: "analytics", "{line}"),
                        Err(e) => tracing::warn!(error = %e, "Failed to serialize telemetry record"),
                    },
                    None => break,
                },
                _ = shutdown.recv() => break,
            }
        }
        tracing::debug!("Telemetry writer exiting");
    })
}

/// Post-response callback with an isolation boundary around the sink.
#[derive(Clone)]
pub struct TelemetryInterceptor {
    sink: Option<Arc<dyn TelemetrySink>>,
}

impl TelemetryInterceptor {
    pub fn new(sink: Arc<dyn TelemetrySink>) -> Self {
        Self { sink: Some(sink) }
    }

    pub fn disabled() -> Self {
        Self { sink: None }
    }

    /// Build and emit the record for a finished request. Never fails.
    pub fn observe(&self, ctx: &RequestContext, status: StatusCode) {
        let latency = ctx.started.elapsed();
        metrics::record_request(ctx.method.as_str(), status.as_u16(), latency);

        let Some(sink) = &self.sink else {
            return;
        };

        let record = TelemetryRecord::new(ctx, status, latency);
        match catch_unwind(AssertUnwindSafe(|| sink.emit(record))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(error = %e, path = %ctx.path, "Telemetry record dropped");
                metrics::record_telemetry_dropped("sink_error");
            }
            Err(_) => {
                tracing::warn!(path = %ctx.path, "Telemetry sink panicked; record dropped");
                metrics::record_telemetry_dropped("sink_panic");
            }
        }
    }
}

pub async fn telemetry_middleware(
    State(interceptor): State<TelemetryInterceptor>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let ctx = req
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_else(|| RequestContext::from_request(&req, false));

    let response = next.run(req).await;
    interceptor.observe(&ctx, response.status());
    response
}
