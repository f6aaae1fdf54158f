//! Database connectivity.
//!
//! The ingress layer owns no schema; it only needs to know the database is
//! reachable before traffic is accepted. [`ProbeDatabaseConnector`] opens a
//! TCP connection to the host named by the connection URL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::net::TcpStream;
use url::Url;

use super::DependencyError;

const NAME: &str = "database";

/// Proof of a successful connect, handed to handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseHandle {
    pub endpoint: String,
    pub redacted_url: String,
    pub connected_at: DateTime<Utc>,
}

#[async_trait]
pub trait DatabaseConnector: Send + Sync {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn connect(&self) -> Result<DatabaseHandle, DependencyError>;
}

pub struct ProbeDatabaseConnector {
    url: String,
}

impl ProbeDatabaseConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl DatabaseConnector for ProbeDatabaseConnector {
    async fn connect(&self) -> Result<DatabaseHandle, DependencyError> {
        let url = Url::parse(&self.url).map_err(|e| DependencyError::InvalidUrl {
            name: NAME,
            reason: e.to_string(),
        })?;
        let endpoint = endpoint(&url)?;

        tracing::debug!(endpoint = %endpoint, "Probing database");
        let stream = TcpStream::connect(&endpoint)
            .await
            .map_err(|source| DependencyError::Unreachable {
                name: NAME,
                endpoint: endpoint.clone(),
                source,
            })?;
        drop(stream);

        Ok(DatabaseHandle {
            endpoint,
            redacted_url: redact(url),
            connected_at: Utc::now(),
        })
    }
}

fn endpoint(url: &Url) -> Result<String, DependencyError> {
    let host = url.host_str().ok_or_else(|| DependencyError::InvalidUrl {
        name: NAME,
        reason: "missing host".into(),
    })?;
    let port = url
        .port_or_known_default()
        .or_else(|| default_port(url.scheme()))
        .ok_or_else(|| DependencyError::InvalidUrl {
            name: NAME,
            reason: format!("no port given and no default for scheme '{}'", url.scheme()),
        })?;
    Ok(format!("{host}:{port}"))
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "mongodb" => Some(27017),
        "postgres" | "postgresql" => Some(5432),
        "mysql" => Some(3306),
        "redis" => Some(6379),
        _ => None,
    }
}

fn redact(mut url: Url) -> String {
    if url.password().is_some() {
        let _ = url.set_password(Some("****"));
    }
    url.to_string()
}
