//! Handler groups mounted in the [`RouterTable`](super::RouterTable).

use std::convert::Infallible;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tower::ServiceExt;

use super::matcher::{ExactPathMatcher, Matcher, PathPrefixMatcher};

pub const HEALTH_MESSAGE: &str = "Server is running";

/// A set of routes owned by one feature. Paths passed to `serves` and
/// `handle` are relative to the mount point.
#[async_trait]
pub trait HandlerGroup: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this group answers `method path`. Groups that return false let
    /// resolution continue to later bindings.
    fn serves(&self, _method: &Method, _path: &str) -> bool {
        true
    }

    async fn handle(&self, req: Request<Body>) -> Response;
}

/// Adapts an axum [`Router`] into a group. Without claims the group serves
/// every path under its mount point.
pub struct RouterGroup {
    name: String,
    router: Router,
    claims: Vec<Box<dyn Matcher>>,
}

impl RouterGroup {
    pub fn new(name: impl Into<String>, router: Router) -> Self {
        Self {
            name: name.into(),
            router,
            claims: Vec::new(),
        }
    }

    pub fn claim(mut self, matcher: impl Matcher + 'static) -> Self {
        self.claims.push(Box::new(matcher));
        self
    }

    pub fn claim_exact(self, path: impl Into<String>) -> Self {
        self.claim(ExactPathMatcher::new(path))
    }

    pub fn claim_prefix(self, prefix: impl Into<String>) -> Self {
        self.claim(PathPrefixMatcher::new(prefix))
    }
}

#[async_trait]
impl HandlerGroup for RouterGroup {
    fn name(&self) -> &str {
        &self.name
    }

    fn serves(&self, method: &Method, path: &str) -> bool {
        self.claims.is_empty() || self.claims.iter().any(|m| m.matches(method, path))
    }

    async fn handle(&self, req: Request<Body>) -> Response {
        let result: Result<Response, Infallible> = self.router.clone().oneshot(req).await;
        match result {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }
}

/// `GET /` liveness answer.
#[derive(Debug, Default, Clone, Copy)]
pub struct HealthCheck;

#[async_trait]
impl HandlerGroup for HealthCheck {
    fn name(&self) -> &str {
        "health"
    }

    fn serves(&self, method: &Method, path: &str) -> bool {
        path == "/" && (method == Method::GET || method == Method::HEAD)
    }

    async fn handle(&self, _req: Request<Body>) -> Response {
        (StatusCode::OK, HEALTH_MESSAGE).into_response()
    }
}
