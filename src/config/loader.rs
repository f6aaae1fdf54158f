//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::{CacheBackend, IngressConfig, LogFormat};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value {value:?} for environment variable {var}")]
    Env { var: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: defaults, then an optional TOML file, then the
/// environment. The result is validated before it is returned.
pub fn load_config(path: Option<&Path>) -> Result<IngressConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_file(path)?,
        None => IngressConfig::default(),
    };

    apply_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse a TOML file without environment overrides or validation.
pub fn read_file(path: &Path) -> Result<IngressConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Apply environment overrides using `lookup` to resolve variables.
pub fn apply_overrides<F>(config: &mut IngressConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup("HOST") {
        config.listener.host = host;
    }
    if let Some(port) = parsed(&lookup, "PORT")? {
        config.listener.port = port;
    }
    if let Some(trust) = flag(&lookup, "TRUST_PROXY")? {
        config.listener.trust_forwarded_for = trust;
    }
    if let Some(origins) = lookup("ALLOWED_ORIGINS") {
        config.cors.allowed_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();
    }

    if let Some(enabled) = flag(&lookup, "RATE_LIMIT_ENABLED")? {
        config.rate_limit.enabled = enabled;
    }
    if let Some(window) = parsed(&lookup, "RATE_LIMIT_WINDOW_SECS")? {
        config.rate_limit.window_secs = window;
    }
    if let Some(max) = parsed(&lookup, "RATE_LIMIT_MAX")? {
        config.rate_limit.max_requests = max;
    }
    if let Some(message) = lookup("RATE_LIMIT_MESSAGE") {
        config.rate_limit.message = message;
    }

    if let Some(max) = parsed(&lookup, "MAX_BODY_BYTES")? {
        config.body.max_bytes = max;
    }
    if let Some(secs) = parsed(&lookup, "REQUEST_TIMEOUT_SECS")? {
        config.timeouts.request_secs = secs;
    }

    if let Some(url) = lookup("DATABASE_URL") {
        config.database.url = url;
    }
    if let Some(enabled) = flag(&lookup, "CACHE_ENABLED")? {
        config.cache.enabled = enabled;
    }
    if let Some(backend) = lookup("CACHE_BACKEND") {
        config.cache.backend = match backend.to_lowercase().as_str() {
            "memory" => CacheBackend::Memory,
            "redis" => CacheBackend::Redis,
            _ => {
                return Err(ConfigError::Env {
                    var: "CACHE_BACKEND",
                    value: backend,
                })
            }
        };
    }
    if let Some(url) = lookup("CACHE_URL") {
        config.cache.url = Some(url);
    }

    if let Some(enabled) = flag(&lookup, "TELEMETRY_ENABLED")? {
        config.telemetry.enabled = enabled;
    }
    if let Some(level) = lookup("LOG_LEVEL") {
        config.observability.log_level = level;
    }
    if let Some(format) = lookup("LOG_FORMAT") {
        config.observability.log_format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" | "text" => LogFormat::Pretty,
            _ => {
                return Err(ConfigError::Env {
                    var: "LOG_FORMAT",
                    value: format,
                })
            }
        };
    }
    if let Some(enabled) = flag(&lookup, "METRICS_ENABLED")? {
        config.observability.metrics_enabled = enabled;
    }
    if let Some(address) = lookup("METRICS_ADDRESS") {
        config.observability.metrics_address = address;
    }

    Ok(())
}

fn parsed<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Env { var, value }),
        None => Ok(None),
    }
}

fn flag<F>(lookup: &F, var: &'static str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(value) => match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::Env { var, value }),
        },
        None => Ok(None),
    }
}
