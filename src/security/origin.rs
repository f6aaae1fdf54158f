//! Cross-origin policy.
//!
//! # Responsibilities
//! - Decide whether a declared origin may call the API
//! - Decide whether credentials may be shared with it
//! - Answer CORS preflights for allowed origins
//!
//! # Design Decisions
//! - Exact string match on `scheme://host[:port]`, never wildcards
//! - The matched origin is echoed back; `*` is never emitted
//! - A missing `Origin` header means a non-browser or same-origin caller and is allowed
//! - The allow-list is immutable after startup and shared without locking

use std::collections::HashSet;
use std::sync::Arc;

use axum::http::{header, HeaderMap, HeaderValue};

/// Methods advertised in preflight answers.
pub const PREFLIGHT_ALLOW_METHODS: &str = "GET,HEAD,PUT,PATCH,POST,DELETE";

/// Static set of permitted origins.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    origins: HashSet<String>,
}

impl AllowList {
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            origins: origins.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, origin: &str) -> bool {
        self.origins.contains(origin)
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }
}

/// Outcome of evaluating a request's origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginDecision {
    /// Listed origin: echo it and allow credentials.
    AllowWithCredentials(String),
    /// No origin declared: proceed without CORS headers.
    AllowWithoutCredentials,
    /// Unlisted origin: short-circuit.
    Deny(String),
}

/// Evaluates origins against the allow-list.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allow_list: Arc<AllowList>,
    max_age_secs: u64,
}

impl OriginPolicy {
    pub fn new(allow_list: AllowList, max_age_secs: u64) -> Self {
        Self {
            allow_list: Arc::new(allow_list),
            max_age_secs,
        }
    }

    pub fn evaluate(&self, origin: Option<&str>) -> OriginDecision {
        match origin {
            None => OriginDecision::AllowWithoutCredentials,
            Some(origin) if self.allow_list.contains(origin) => {
                OriginDecision::AllowWithCredentials(origin.to_string())
            }
            Some(origin) => OriginDecision::Deny(origin.to_string()),
        }
    }

    pub fn max_age_secs(&self) -> u64 {
        self.max_age_secs
    }
}

/// Response headers granted to an allowed origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsGrant {
    pub origin: String,
}

impl CorsGrant {
    /// Set `Access-Control-Allow-Origin`, `Access-Control-Allow-Credentials` and `Vary`.
    pub fn apply(&self, headers: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(&self.origin) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
            headers.append(header::VARY, HeaderValue::from_static("Origin"));
        }
    }
}

/// Preflight answer headers.
pub fn apply_preflight(headers: &mut HeaderMap, requested_headers: Option<&str>, max_age_secs: u64) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(PREFLIGHT_ALLOW_METHODS),
    );
    if let Some(value) = requested_headers.and_then(|h| HeaderValue::from_str(h).ok()) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, value);
        headers.append(
            header::VARY,
            HeaderValue::from_static("Access-Control-Request-Headers"),
        );
    }
    headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from(max_age_secs));
}
