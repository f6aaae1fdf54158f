//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::Extension,
    http::{Method, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::Utc;
use tokio::net::TcpListener;

use fusion_ingress::config::IngressConfig;
use fusion_ingress::dependencies::{
    CacheCapability, CacheConnector, CacheStore, DatabaseConnector, DatabaseHandle,
    DependencyError,
};
use fusion_ingress::lifecycle::{Dependencies, DependencyTimeouts, LifecycleHandle, LifecycleState};
use fusion_ingress::observability::{TelemetryError, TelemetryRecord, TelemetrySink};
use fusion_ingress::routing::{HandlerGroup, HealthCheck, RouterGroup, RouterTable};
use fusion_ingress::HttpServer;

pub const ALLOWED_ORIGIN: &str = "http://localhost:5173";
pub const DENIED_ORIGIN: &str = "http://evil.example";
pub const PANIC_PATH: &str = "/boom";

/// Handler group that counts invocations and panics on [`PANIC_PATH`].
pub struct SpyGroup {
    name: &'static str,
    calls: Arc<AtomicUsize>,
}

impl SpyGroup {
    pub fn new(name: &'static str) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                name,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

#[async_trait]
impl HandlerGroup for SpyGroup {
    fn name(&self) -> &str {
        self.name
    }

    async fn handle(&self, req: Request<Body>) -> Response {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if req.uri().path() == PANIC_PATH {
            panic!("handler failure");
        }
        (StatusCode::OK, format!("{} {}", self.name, req.uri().path())).into_response()
    }
}

/// Sink that keeps every record.
#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<TelemetryRecord>>,
}

impl RecordingSink {
    pub fn count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn statuses(&self) -> Vec<u16> {
        self.records.lock().unwrap().iter().map(|r| r.status).collect()
    }
}

impl TelemetrySink for RecordingSink {
    fn emit(&self, record: TelemetryRecord) -> Result<(), TelemetryError> {
        self.records.lock().unwrap().push(record);
        Ok(())
    }
}

pub struct FailingDatabase;

#[async_trait]
impl DatabaseConnector for FailingDatabase {
    async fn connect(&self) -> Result<DatabaseHandle, DependencyError> {
        Err(DependencyError::Backend {
            name: "database",
            message: "connection refused".into(),
        })
    }
}

pub struct FailingCache;

#[async_trait]
impl CacheConnector for FailingCache {
    async fn connect(&self) -> Result<Arc<dyn CacheStore>, DependencyError> {
        Err(DependencyError::Backend {
            name: "cache",
            message: "connection refused".into(),
        })
    }
}

/// A socket that accepts TCP connections, standing in for the database.
pub async fn start_fake_database() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("mongodb://{}/fusion", listener.local_addr().unwrap());
    (listener, url)
}

pub fn test_config() -> IngressConfig {
    let mut config = IngressConfig::default();
    config.listener.host = "127.0.0.1".into();
    config.listener.port = 0;
    config
}

pub fn timeouts() -> DependencyTimeouts {
    DependencyTimeouts {
        database: Duration::from_secs(2),
        cache: Duration::from_secs(2),
    }
}

pub fn dependencies(cache: CacheCapability) -> Dependencies {
    Dependencies {
        database: DatabaseHandle {
            endpoint: "127.0.0.1:27017".into(),
            redacted_url: "mongodb://127.0.0.1:27017/fusion".into(),
            connected_at: Utc::now(),
        },
        cache,
        lifecycle: LifecycleHandle::new(),
    }
}

/// Health check at `/` followed by a spy that serves every other path.
pub fn spy_table(spy: SpyGroup) -> RouterTable {
    let mut table = RouterTable::new();
    table.bind("/", Arc::new(HealthCheck)).unwrap();
    table.bind("/", Arc::new(spy)).unwrap();
    table
}

/// Activity-style group that reads through the cache when it can.
pub fn cache_group() -> RouterGroup {
    RouterGroup::new(
        "activity",
        Router::new()
            .route(
                "/feed",
                get(|Extension(cache): Extension<CacheCapability>| async move {
                    if let Some(hit) = cache.get("feed").await {
                        return hit;
                    }
                    cache.set("feed", "cached", Some(Duration::from_secs(60))).await;
                    "fresh".to_string()
                }),
            )
            .route(
                "/status",
                get(|Extension(state): Extension<LifecycleState>| async move {
                    state.to_string()
                }),
            ),
    )
}

pub fn app(config: IngressConfig, table: RouterTable, sink: Arc<RecordingSink>) -> Router {
    HttpServer::new(config, dependencies(CacheCapability::Unavailable), table)
        .with_telemetry_sink(sink)
        .router()
}

pub fn request(method: Method, uri: &str) -> axum::http::request::Builder {
    Request::builder().method(method).uri(uri)
}

pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
