//! Configuration validation.
//!
//! Serde handles syntax; this module checks meaning. Every problem is
//! reported, not just the first one.

use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::{CacheBackend, IngressConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Validate a configuration.
pub fn validate_config(config: &IngressConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.host.trim().is_empty() {
        errors.push(ValidationError::new("listener.host", "must not be empty"));
    }

    for origin in &config.cors.allowed_origins {
        if let Err(reason) = check_origin(origin) {
            errors.push(ValidationError::new(
                "cors.allowed_origins",
                format!("{origin:?} {reason}"),
            ));
        }
    }

    if config.rate_limit.window_secs == 0 {
        errors.push(ValidationError::new("rate_limit.window_secs", "must be greater than 0"));
    }
    if config.rate_limit.max_requests == 0 {
        errors.push(ValidationError::new("rate_limit.max_requests", "must be greater than 0"));
    }
    if config.rate_limit.sweep_interval_secs == 0 {
        errors.push(ValidationError::new(
            "rate_limit.sweep_interval_secs",
            "must be greater than 0",
        ));
    }

    if config.body.max_bytes == 0 {
        errors.push(ValidationError::new("body.max_bytes", "must be greater than 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    match Url::parse(&config.database.url) {
        Ok(url) if url.host_str().is_some() => {}
        Ok(_) => errors.push(ValidationError::new("database.url", "must name a host")),
        Err(e) => errors.push(ValidationError::new("database.url", e.to_string())),
    }
    if config.database.connect_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "database.connect_timeout_secs",
            "must be greater than 0",
        ));
    }

    if config.cache.enabled && config.cache.connect_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "cache.connect_timeout_secs",
            "must be greater than 0",
        ));
    }

    if config.cache.enabled && config.cache.backend == CacheBackend::Redis {
        match config.cache.url.as_deref().map(Url::parse) {
            None => errors.push(ValidationError::new("cache.url", "required for the redis backend")),
            Some(Err(e)) => errors.push(ValidationError::new("cache.url", e.to_string())),
            Some(Ok(_)) => {}
        }
    }

    if config.telemetry.channel_capacity == 0 {
        errors.push(ValidationError::new(
            "telemetry.channel_capacity",
            "must be greater than 0",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "must be a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// An allowed origin must be a bare `scheme://host[:port]` so that exact string
/// comparison against the browser's `Origin` header is meaningful.
fn check_origin(origin: &str) -> Result<(), &'static str> {
    if origin.contains('*') {
        return Err("wildcards are not allowed with credentials");
    }
    if origin.ends_with('/') {
        return Err("must not end with '/'");
    }
    let url = Url::parse(origin).map_err(|_| "is not a valid URL")?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err("must use http or https");
    }
    if url.host_str().is_none() {
        return Err("must name a host");
    }
    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        return Err("must not carry a path, query or fragment");
    }
    Ok(())
}
