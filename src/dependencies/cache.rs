//! Optional cache.
//!
//! Handlers never talk to a [`CacheStore`] directly. They receive a
//! [`CacheCapability`], which turns an absent cache and cache errors into
//! misses.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use thiserror::Error;

use super::DependencyError;

const NAME: &str = "cache";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

#[async_trait]
pub trait CacheConnector: Send + Sync {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn connect(&self) -> Result<Arc<dyn CacheStore>, DependencyError>;
}

/// Cache as seen by handlers.
#[derive(Clone)]
pub enum CacheCapability {
    Available(Arc<dyn CacheStore>),
    Unavailable,
}

impl CacheCapability {
    pub fn is_available(&self) -> bool {
        matches!(self, CacheCapability::Available(_))
    }

    /// Errors read as a miss.
    pub async fn get(&self, key: &str) -> Option<String> {
        let CacheCapability::Available(store) = self else {
            return None;
        };
        match store.get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache read failed; treating as miss");
                None
            }
        }
    }

    pub async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        if let CacheCapability::Available(store) = self {
            if let Err(e) = store.set(key, value, ttl).await {
                tracing::warn!(key, error = %e, "Cache write failed");
            }
        }
    }

    pub async fn delete(&self, key: &str) {
        if let CacheCapability::Available(store) = self {
            if let Err(e) = store.delete(key).await {
                tracing::warn!(key, error = %e, "Cache delete failed");
            }
        }
    }
}

impl fmt::Debug for CacheCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheCapability::Available(_) => f.write_str("CacheCapability::Available"),
            CacheCapability::Unavailable => f.write_str("CacheCapability::Unavailable"),
        }
    }
}

/// In-process cache with per-entry expiry.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, (String, Option<Instant>)>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            match entry.1 {
                Some(expires_at) if expires_at <= now => {}
                _ => return Ok(Some(entry.0.clone())),
            }
        }
        self.entries
            .remove_if(key, |_, (_, expires_at)| expires_at.is_some_and(|t| t <= now));
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }
}

pub struct MemoryCacheConnector;

#[async_trait]
impl CacheConnector for MemoryCacheConnector {
    async fn connect(&self) -> Result<Arc<dyn CacheStore>, DependencyError> {
        Ok(Arc::new(MemoryCache::new()))
    }
}

pub struct RedisCache {
    conn: MultiplexedConnection,
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(ttl) => {
                let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
            }
            None => {
                let _: () = conn.set(key, value).await?;
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }
}

pub struct RedisCacheConnector {
    url: String,
}

impl RedisCacheConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl CacheConnector for RedisCacheConnector {
    async fn connect(&self) -> Result<Arc<dyn CacheStore>, DependencyError> {
        let client = Client::open(self.url.as_str()).map_err(|e| DependencyError::InvalidUrl {
            name: NAME,
            reason: e.to_string(),
        })?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| DependencyError::Backend {
                name: NAME,
                message: e.to_string(),
            })?;
        Ok(Arc::new(RedisCache { conn }))
    }
}
