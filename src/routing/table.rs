//! Prefix-bound handler groups and dispatch.
//!
//! # Design Decisions
//! - Bindings are resolved in registration order; the first binding whose
//!   prefix matches and whose group serves the remaining path wins
//! - The mount prefix is stripped before the group sees the request; the
//!   untouched URI is kept as [`OriginalUri`]
//! - Immutable once the server starts; shared behind an `Arc`

use std::sync::Arc;

use axum::{
    body::Body,
    extract::OriginalUri,
    http::{uri::PathAndQuery, Method, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use super::groups::HandlerGroup;
use super::matcher::PathPrefixMatcher;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoutingError {
    #[error("handler group '{0}' is already bound")]
    DuplicateGroup(String),

    #[error("invalid mount prefix '{0}': must start with '/'")]
    InvalidPrefix(String),
}

struct Binding {
    prefix: PathPrefixMatcher,
    group: Arc<dyn HandlerGroup>,
}

/// Outcome of a successful lookup.
pub struct Resolved<'a> {
    pub group: &'a Arc<dyn HandlerGroup>,
    /// Path relative to the mount point.
    pub path: String,
}

#[derive(Default)]
pub struct RouterTable {
    bindings: Vec<Binding>,
}

impl RouterTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(
        &mut self,
        prefix: &str,
        group: Arc<dyn HandlerGroup>,
    ) -> Result<(), RoutingError> {
        if !prefix.starts_with('/') {
            return Err(RoutingError::InvalidPrefix(prefix.to_string()));
        }
        if self.bindings.iter().any(|b| b.group.name() == group.name()) {
            return Err(RoutingError::DuplicateGroup(group.name().to_string()));
        }

        tracing::debug!(prefix, group = group.name(), "Bound handler group");
        self.bindings.push(Binding {
            prefix: PathPrefixMatcher::new(prefix),
            group,
        });
        Ok(())
    }

    pub fn group_names(&self) -> Vec<&str> {
        self.bindings.iter().map(|b| b.group.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn resolve(&self, method: &Method, path: &str) -> Option<Resolved<'_>> {
        self.bindings.iter().find_map(|binding| {
            let relative = binding.prefix.strip(path)?;
            binding
                .group
                .serves(method, &relative)
                .then(|| Resolved {
                    group: &binding.group,
                    path: relative,
                })
        })
    }

    /// Hand the request to the resolved group, or answer 404.
    pub async fn dispatch(&self, mut req: Request<Body>) -> Response {
        let method = req.method().clone();
        let original = req.uri().clone();

        let Some(resolved) = self.resolve(&method, original.path()) else {
            return not_found(&method, original.path());
        };

        if resolved.path != original.path() {
            match rewrite_path(&original, &resolved.path) {
                Ok(uri) => *req.uri_mut() = uri,
                Err(e) => {
                    tracing::warn!(error = %e, path = original.path(), "Failed to rewrite request path");
                    return not_found(&method, original.path());
                }
            }
        }
        if req.extensions().get::<OriginalUri>().is_none() {
            req.extensions_mut().insert(OriginalUri(original));
        }

        resolved.group.handle(req).await
    }
}

pub fn not_found(method: &Method, path: &str) -> Response {
    (StatusCode::NOT_FOUND, format!("Cannot {method} {path}")).into_response()
}

fn rewrite_path(uri: &Uri, path: &str) -> Result<Uri, axum::http::Error> {
    let path_and_query = match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query)?);
    Ok(Uri::from_parts(parts)?)
}
