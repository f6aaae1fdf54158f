//! TCP listener binding.
//!
//! # Responsibilities
//! - Resolve the configured host and port
//! - Bind the socket only after dependencies are up
//!
//! Accepting, per-connection tasks and draining are left to `axum::serve`.

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ListenerConfig;

#[derive(Debug, Error)]
#[error("failed to bind {address}: {source}")]
pub struct ListenerError {
    pub address: String,
    #[source]
    pub source: std::io::Error,
}

pub async fn bind(config: &ListenerConfig) -> Result<TcpListener, ListenerError> {
    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .map_err(|source| ListenerError {
            address: config.bind_address(),
            source,
        })?;

    match listener.local_addr() {
        Ok(local) => tracing::info!(address = %local, "Listener bound"),
        Err(_) => tracing::info!(address = %config.bind_address(), "Listener bound"),
    }
    Ok(listener)
}
