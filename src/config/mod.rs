//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults (schema.rs)
//!     → optional TOML file (loader.rs)
//!     → environment overrides (loader.rs)
//!     → validation.rs (semantic checks)
//!     → IngressConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BodyConfig, CacheBackend, CacheConfig, CorsConfig, DatabaseConfig, IngressConfig,
    ListenerConfig, LogFormat, ObservabilityConfig, RateLimitConfig, TelemetryConfig,
    TelemetrySinkKind, TimeoutConfig,
};
