//! HTTP server setup.
//!
//! # Responsibilities
//! - Assemble the ingress stages from configuration
//! - Wire the middleware stack in its fixed order
//! - Dispatch admitted requests through the router table
//! - Serve until shutdown and stop background tasks with it
//!
//! # Layer order (outermost first)
//! ```text
//! trace → request id → ingress (origin, rate limit) → body limit → decode
//!       → telemetry → timeout → catch panic → dispatch
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::from_fn_with_state,
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    catch_panic::CatchPanicLayer,
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{IngressConfig, TelemetrySinkKind};
use crate::dependencies::{CacheCapability, DatabaseHandle};
use crate::http::middleware::{decode_middleware, ingress_middleware, DecodeState, IngressState};
use crate::http::pipeline::{IngressPipeline, OriginStage, RateLimitStage};
use crate::lifecycle::startup::Dependencies;
use crate::lifecycle::state::LifecycleHandle;
use crate::observability::telemetry::{
    spawn_channel_writer, telemetry_middleware, ChannelSink, LogSink, TelemetryInterceptor,
    TelemetryRecord, TelemetrySink,
};
use crate::routing::RouterTable;
use crate::security::origin::{AllowList, OriginPolicy};
use crate::security::rate_limit::{CounterStore, FixedWindowLimiter, RatePolicy};

/// Shared state for the dispatch handler.
#[derive(Clone)]
pub struct AppState {
    pub table: Arc<RouterTable>,
    pub cache: CacheCapability,
    pub lifecycle: LifecycleHandle,
    pub database: DatabaseHandle,
}

pub struct HttpServer {
    config: IngressConfig,
    state: AppState,
    limiter: Arc<FixedWindowLimiter>,
    telemetry: TelemetryInterceptor,
    telemetry_rx: Option<mpsc::Receiver<TelemetryRecord>>,
}

impl HttpServer {
    pub fn new(config: IngressConfig, deps: Dependencies, table: RouterTable) -> Self {
        let limiter = Arc::new(FixedWindowLimiter::in_memory(RatePolicy::from(
            &config.rate_limit,
        )));

        let (telemetry, telemetry_rx) = if !config.telemetry.enabled {
            (TelemetryInterceptor::disabled(), None)
        } else {
            match config.telemetry.sink {
                TelemetrySinkKind::Log => (TelemetryInterceptor::new(Arc::new(LogSink)), None),
                TelemetrySinkKind::Channel => {
                    let (sink, rx) = ChannelSink::new(config.telemetry.channel_capacity);
                    (TelemetryInterceptor::new(Arc::new(sink)), Some(rx))
                }
            }
        };

        let state = AppState {
            table: Arc::new(table),
            cache: deps.cache,
            lifecycle: deps.lifecycle,
            database: deps.database,
        };

        Self {
            config,
            state,
            limiter,
            telemetry,
            telemetry_rx,
        }
    }

    /// Replace the in-memory rate window store.
    pub fn with_counter_store(mut self, store: Arc<dyn CounterStore>) -> Self {
        self.limiter = Arc::new(FixedWindowLimiter::new(
            RatePolicy::from(&self.config.rate_limit),
            store,
        ));
        self
    }

    /// Replace the configured telemetry sink.
    pub fn with_telemetry_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = TelemetryInterceptor::new(sink);
        self.telemetry_rx = None;
        self
    }

    pub fn limiter(&self) -> &Arc<FixedWindowLimiter> {
        &self.limiter
    }

    pub fn config(&self) -> &IngressConfig {
        &self.config
    }

    fn pipeline(&self) -> IngressPipeline {
        let origins = OriginPolicy::new(
            AllowList::new(self.config.cors.allowed_origins.iter().cloned()),
            self.config.cors.max_age_secs,
        );
        let mut pipeline = IngressPipeline::new().stage(OriginStage::new(origins));
        if self.config.rate_limit.enabled {
            pipeline = pipeline.stage(RateLimitStage::new(self.limiter.clone()));
        }
        pipeline
    }

    /// Build the Axum router with every middleware layer.
    #[allow(deprecated)]
    pub fn router(&self) -> Router {
        let ingress = IngressState {
            pipeline: Arc::new(self.pipeline()),
            trust_forwarded_for: self.config.listener.trust_forwarded_for,
            preflight_max_age_secs: self.config.cors.max_age_secs,
        };
        let decode = DecodeState {
            max_bytes: self.config.body.max_bytes,
        };

        Router::new()
            .fallback(dispatch)
            .with_state(self.state.clone())
            .layer(CatchPanicLayer::new())
            .layer(TimeoutLayer::new(Duration::from_secs(
                self.config.timeouts.request_secs,
            )))
            .layer(from_fn_with_state(self.telemetry.clone(), telemetry_middleware))
            .layer(from_fn_with_state(decode, decode_middleware))
            .layer(RequestBodyLimitLayer::new(self.config.body.max_bytes))
            .layer(from_fn_with_state(ingress, ingress_middleware))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        mut self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            state = %self.state.lifecycle.current(),
            cache = self.state.cache.is_available(),
            "HTTP server starting"
        );

        let mut background = Vec::new();
        if self.config.rate_limit.enabled {
            background.push(self.limiter.clone().spawn_sweeper(
                Duration::from_secs(self.config.rate_limit.sweep_interval_secs),
                shutdown.resubscribe(),
            ));
        }
        if let Some(rx) = self.telemetry_rx.take() {
            background.push(spawn_channel_writer(rx, shutdown.resubscribe()));
        }

        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received; draining connections");
            })
            .await?;

        for task in background {
            let _ = task.await;
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Fallback for every admitted request.
async fn dispatch(State(state): State<AppState>, mut req: Request<Body>) -> Response {
    let extensions = req.extensions_mut();
    extensions.insert(state.cache.clone());
    extensions.insert(state.lifecycle.current());
    extensions.insert(state.database.clone());
    state.table.dispatch(req).await
}
