//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the ingress
//! server. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Origins permitted when nothing else is configured.
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 4] = [
    "https://intrest-fusion-frontend.vercel.app",
    "https://another-frontend.vercel.app",
    "http://localhost:5173",
    "http://localhost:3000",
];

/// Message returned to rate-limited clients by default.
pub const DEFAULT_RATE_LIMIT_MESSAGE: &str = "Too many requests, please try again later.";

/// Root configuration for the ingress server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct IngressConfig {
    /// Listener configuration (host, port).
    pub listener: ListenerConfig,

    /// Cross-origin policy.
    pub cors: CorsConfig,

    /// Fixed-window rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Request body decoding limits.
    pub body: BodyConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Primary store (critical dependency).
    pub database: DatabaseConfig,

    /// Cache (optional dependency).
    pub cache: CacheConfig,

    /// Per-request telemetry capture.
    pub telemetry: TelemetryConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// TCP port to bind.
    pub port: u16,

    /// Derive the client identity from `X-Forwarded-For` instead of the peer
    /// address. Only enable behind a trusted proxy.
    pub trust_forwarded_for: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7777,
            trust_forwarded_for: false,
        }
    }
}

impl ListenerConfig {
    /// The `host:port` string handed to the socket layer.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Cross-origin policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Exact origins (scheme://host[:port]) allowed to call the API with credentials.
    pub allowed_origins: Vec<String>,

    /// How long browsers may cache a preflight answer.
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect(),
            max_age_secs: 600,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Length of a fixed window in seconds.
    pub window_secs: u64,

    /// Requests admitted per identity per window.
    pub max_requests: u64,

    /// Body of the 429 response.
    pub message: String,

    /// How often elapsed windows are evicted from the in-memory store.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: 3600,
            max_requests: 5000,
            message: DEFAULT_RATE_LIMIT_MESSAGE.to_string(),
            sweep_interval_secs: 300,
        }
    }
}

/// Body decoding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BodyConfig {
    /// Maximum accepted request body in bytes.
    pub max_bytes: usize,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            max_bytes: 100 * 1024,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for handler to respond) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Primary store connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL (e.g., "mongodb://127.0.0.1:27017/fusion").
    pub url: String,

    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "mongodb://127.0.0.1:27017/fusion".to_string(),
            connect_timeout_secs: 10,
        }
    }
}

/// Cache backend selection.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// In-process map. Never fails to connect.
    Memory,
    /// Remote Redis server at `cache.url`.
    Redis,
}

/// Cache connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Run the cache connect step during startup.
    pub enabled: bool,

    pub backend: CacheBackend,

    /// Connection URL for remote backends.
    pub url: Option<String>,

    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backend: CacheBackend::Redis,
            url: Some("redis://127.0.0.1:6379".to_string()),
            connect_timeout_secs: 5,
        }
    }
}

/// Where telemetry records are delivered.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TelemetrySinkKind {
    /// Structured log events on the `telemetry` target.
    Log,
    /// Bounded in-process channel drained by an analytics writer.
    Channel,
}

/// Telemetry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Enable telemetry capture.
    pub enabled: bool,

    pub sink: TelemetrySinkKind,

    /// Capacity of the channel sink; records beyond it are dropped.
    pub channel_capacity: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sink: TelemetrySinkKind::Log,
            channel_capacity: 1024,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
