//! Startup sequencing.
//!
//! # Responsibilities
//! - Connect the database; abort startup if it fails
//! - Connect the cache when enabled; degrade if it fails
//! - Bind the listener only once the state is Ready or Degraded
//!
//! # Design Decisions
//! - Every connect attempt is bounded by a timeout
//! - No retries; a failed optional dependency stays unavailable until restart

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::timeout;

use crate::config::IngressConfig;
use crate::dependencies::{
    self, CacheCapability, CacheConnector, DatabaseConnector, DatabaseHandle, DependencyError,
};
use crate::http::HttpServer;
use crate::lifecycle::state::{LifecycleHandle, LifecycleState, TransitionError};
use crate::net::{self, ListenerError};
use crate::routing::RouterTable;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("critical dependency '{name}' failed: {source}")]
    CriticalDependency {
        name: &'static str,
        #[source]
        source: DependencyError,
    },

    #[error(transparent)]
    Bind(#[from] ListenerError),

    #[error(transparent)]
    Lifecycle(#[from] TransitionError),

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

#[derive(Debug, Clone, Copy)]
pub struct DependencyTimeouts {
    pub database: Duration,
    pub cache: Duration,
}

impl From<&IngressConfig> for DependencyTimeouts {
    fn from(config: &IngressConfig) -> Self {
        Self {
            database: Duration::from_secs(config.database.connect_timeout_secs),
            cache: Duration::from_secs(config.cache.connect_timeout_secs),
        }
    }
}

/// Everything handlers may depend on, produced by a successful startup.
#[derive(Clone, Debug)]
pub struct Dependencies {
    pub database: DatabaseHandle,
    pub cache: CacheCapability,
    pub lifecycle: LifecycleHandle,
}

pub struct DependencySequencer {
    database: Arc<dyn DatabaseConnector>,
    cache: Option<Arc<dyn CacheConnector>>,
    timeouts: DependencyTimeouts,
    lifecycle: LifecycleHandle,
}

impl DependencySequencer {
    pub fn new(database: Arc<dyn DatabaseConnector>, timeouts: DependencyTimeouts) -> Self {
        Self {
            database,
            cache: None,
            timeouts,
            lifecycle: LifecycleHandle::new(),
        }
    }

    /// Connectors chosen by configuration. The cache is skipped when disabled.
    pub fn from_config(config: &IngressConfig) -> Self {
        let mut sequencer = Self::new(
            dependencies::database_connector(&config.database),
            DependencyTimeouts::from(config),
        );
        sequencer.cache = dependencies::cache_connector(&config.cache);
        sequencer
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheConnector>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn lifecycle(&self) -> LifecycleHandle {
        self.lifecycle.clone()
    }

    pub async fn initialize(self) -> Result<Dependencies, StartupError> {
        let name = self.database.name();
        let database = match timeout(self.timeouts.database, self.database.connect()).await {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => return Err(self.fail(e)),
            Err(_) => {
                let e = DependencyError::Timeout {
                    name,
                    timeout: self.timeouts.database,
                };
                return Err(self.fail(e));
            }
        };
        tracing::info!(
            endpoint = %database.endpoint,
            url = %database.redacted_url,
            "Database connection established"
        );

        let (cache, state) = match &self.cache {
            None => {
                tracing::info!("Cache disabled; continuing without it");
                (CacheCapability::Unavailable, LifecycleState::Ready)
            }
            Some(connector) => match timeout(self.timeouts.cache, connector.connect()).await {
                Ok(Ok(store)) => {
                    tracing::info!("Cache connection established");
                    (CacheCapability::Available(store), LifecycleState::Ready)
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "Cache unavailable; serving without it");
                    (CacheCapability::Unavailable, LifecycleState::Degraded)
                }
                Err(_) => {
                    tracing::warn!(
                        timeout = ?self.timeouts.cache,
                        "Cache connect timed out; serving without it"
                    );
                    (CacheCapability::Unavailable, LifecycleState::Degraded)
                }
            },
        };

        self.lifecycle.transition(state)?;
        Ok(Dependencies {
            database,
            cache,
            lifecycle: self.lifecycle,
        })
    }

    fn fail(&self, source: DependencyError) -> StartupError {
        let name = source.dependency();
        tracing::error!(dependency = name, error = %source, "Critical dependency failed");
        if let Err(e) = self.lifecycle.transition(LifecycleState::Failed) {
            tracing::warn!(error = %e, "Lifecycle already settled");
        }
        StartupError::CriticalDependency { name, source }
    }
}

/// A server whose dependencies are up and whose listener is bound.
pub struct PreparedServer {
    server: HttpServer,
    listener: TcpListener,
}

impl PreparedServer {
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Adjust the server before it starts serving.
    pub fn configure(mut self, f: impl FnOnce(HttpServer) -> HttpServer) -> Self {
        self.server = f(self.server);
        self
    }

    pub async fn serve(self, shutdown: broadcast::Receiver<()>) -> Result<(), StartupError> {
        self.server
            .run(self.listener, shutdown)
            .await
            .map_err(StartupError::Serve)
    }
}

/// Initialize dependencies, then bind. Nothing is bound on failure.
pub async fn prepare(
    config: IngressConfig,
    sequencer: DependencySequencer,
    table: RouterTable,
) -> Result<PreparedServer, StartupError> {
    let deps = sequencer.initialize().await?;
    let listener = net::bind(&config.listener).await?;
    tracing::info!(
        port = config.listener.port,
        state = %deps.lifecycle.current(),
        "Server is running"
    );
    Ok(PreparedServer {
        server: HttpServer::new(config, deps, table),
        listener,
    })
}

pub async fn launch(
    config: IngressConfig,
    sequencer: DependencySequencer,
    table: RouterTable,
    shutdown: broadcast::Receiver<()>,
) -> Result<(), StartupError> {
    prepare(config, sequencer, table).await?.serve(shutdown).await
}
