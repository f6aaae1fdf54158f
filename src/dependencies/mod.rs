//! External dependencies started before the listener.
//!
//! # Data Flow
//! ```text
//! config ──► connectors (database.rs, cache.rs)
//!                 │
//!                 ▼
//!        lifecycle::startup::DependencySequencer
//!                 │
//!                 ▼
//!   DatabaseHandle + CacheCapability ──► request extensions
//! ```
//!
//! # Design Decisions
//! - The database is critical; its failure aborts startup
//! - The cache is optional; its absence is a capability, not an error

pub mod cache;
pub mod database;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::{CacheBackend, CacheConfig, DatabaseConfig};

pub use cache::{
    CacheCapability, CacheConnector, CacheError, CacheStore, MemoryCache, MemoryCacheConnector,
    RedisCache, RedisCacheConnector,
};
pub use database::{DatabaseConnector, DatabaseHandle, ProbeDatabaseConnector};

#[derive(Debug, Error)]
pub enum DependencyError {
    #[error("invalid {name} url: {reason}")]
    InvalidUrl { name: &'static str, reason: String },

    #[error("{name} unreachable at {endpoint}: {source}")]
    Unreachable {
        name: &'static str,
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{name} did not connect within {timeout:?}")]
    Timeout {
        name: &'static str,
        timeout: Duration,
    },

    #[error("{name} backend error: {message}")]
    Backend { name: &'static str, message: String },
}

impl DependencyError {
    pub fn dependency(&self) -> &'static str {
        match self {
            DependencyError::InvalidUrl { name, .. }
            | DependencyError::Unreachable { name, .. }
            | DependencyError::Timeout { name, .. }
            | DependencyError::Backend { name, .. } => *name,
        }
    }
}

pub fn database_connector(config: &DatabaseConfig) -> Arc<dyn DatabaseConnector> {
    Arc::new(ProbeDatabaseConnector::new(config.url.clone()))
}

/// `None` when the cache is disabled by configuration.
pub fn cache_connector(config: &CacheConfig) -> Option<Arc<dyn CacheConnector>> {
    if !config.enabled {
        return None;
    }
    let connector: Arc<dyn CacheConnector> = match config.backend {
        CacheBackend::Memory => Arc::new(MemoryCacheConnector),
        CacheBackend::Redis => Arc::new(RedisCacheConnector::new(
            config.url.clone().unwrap_or_default(),
        )),
    };
    Some(connector)
}
