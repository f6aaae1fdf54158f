//! Per-request context.
//!
//! # Responsibilities
//! - Capture method, path, origin and client identity once per request
//! - Derive the client identity from the peer address or `X-Forwarded-For`
//! - Carry the preflight fields used by the origin stage
//!
//! # Design Decisions
//! - Built once by the ingress middleware and stored in request extensions
//! - Immutable after construction; later stages only read it
//! - `X-Forwarded-For` is honoured only when the listener trusts its proxy

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, Method, Request};
use chrono::{DateTime, Utc};
use tower_http::request_id::RequestId;

/// Identity used when neither the peer address nor a trusted header is known.
pub const UNKNOWN_CLIENT: &str = "unknown";

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// CORS preflight fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreflightRequest {
    pub method: String,
    pub headers: Option<String>,
}

/// Immutable per-request record consumed by every pipeline stage.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub origin: Option<String>,
    pub client_identity: String,
    pub user_agent: Option<String>,
    pub request_id: Option<String>,
    pub received_at: DateTime<Utc>,
    pub started: Instant,
    pub preflight: Option<PreflightRequest>,
}

impl RequestContext {
    pub fn from_request<B>(request: &Request<B>, trust_forwarded_for: bool) -> Self {
        let headers = request.headers();
        let method = request.method().clone();

        let preflight = if method == Method::OPTIONS {
            header_str(headers, header::ACCESS_CONTROL_REQUEST_METHOD.as_str()).map(|m| {
                PreflightRequest {
                    method: m,
                    headers: header_str(headers, header::ACCESS_CONTROL_REQUEST_HEADERS.as_str()),
                }
            })
        } else {
            None
        };

        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Self {
            method,
            path: request.uri().path().to_string(),
            origin: origin(headers),
            client_identity: client_identity(headers, peer, trust_forwarded_for),
            user_agent: header_str(headers, header::USER_AGENT.as_str()),
            request_id: request
                .extensions()
                .get::<RequestId>()
                .and_then(|id| id.header_value().to_str().ok())
                .map(str::to_string),
            received_at: Utc::now(),
            started: Instant::now(),
            preflight,
        }
    }

    pub fn is_preflight(&self) -> bool {
        self.preflight.is_some()
    }
}

/// Derive the rate-limit key for a request.
pub fn client_identity(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded_for: bool,
) -> String {
    if trust_forwarded_for {
        // First entry is the original client; later entries are proxies.
        let forwarded = headers
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(client) = forwarded {
            return client.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// A present but non-ASCII origin is decoded lossily so it stays present
/// and can never equal a listed origin.
fn origin(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::ORIGIN)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
