//! Client-visible ingress errors.
//!
//! These are produced by the ingress stages before any feature handler runs.
//! Each maps to a deterministic status and message.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Message returned when an origin is not on the allow-list.
pub const ORIGIN_REJECTED_MESSAGE: &str = "Origin not allowed";

/// Errors that short-circuit the ingress pipeline.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IngressError {
    /// The declared origin is not on the allow-list.
    #[error("origin {origin} is not allowed")]
    OriginRejected { origin: String },

    /// The client identity exhausted its request budget for the current window.
    #[error("{message}")]
    RateLimitExceeded {
        message: String,
        retry_after_secs: u64,
    },
}

impl IngressError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            IngressError::OriginRejected { .. } => StatusCode::FORBIDDEN,
            IngressError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            IngressError::OriginRejected { .. } => "origin_rejected",
            IngressError::RateLimitExceeded { .. } => "rate_limited",
        }
    }
}

impl IntoResponse for IngressError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            IngressError::OriginRejected { .. } => {
                (status, ORIGIN_REJECTED_MESSAGE).into_response()
            }
            IngressError::RateLimitExceeded {
                message,
                retry_after_secs,
            } => {
                let mut response = (status, message).into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
                response
            }
        }
    }
}
