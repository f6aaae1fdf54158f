//! Path matching.
//!
//! # Design Decisions
//! - Prefixes match at segment boundaries: `/api` matches `/api` and
//!   `/api/x`, never `/apix`
//! - Matching is case-sensitive
//! - No regex; every check is a string comparison

use std::fmt::Debug;

use axum::http::Method;

/// Request condition evaluated against method and path.
pub trait Matcher: Send + Sync + Debug {
    fn matches(&self, method: &Method, path: &str) -> bool;
}

/// Mount-point prefix. Trailing slashes are insignificant, so `/api/` and
/// `/api` are the same prefix and `/` matches every path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Normalized prefix; empty for the root mount.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn matches_path(&self, path: &str) -> bool {
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Path as seen below the mount point, always starting with `/`.
    pub fn strip(&self, path: &str) -> Option<String> {
        if !self.matches_path(path) {
            return None;
        }
        let rest = &path[self.prefix.len()..];
        Some(if rest.is_empty() {
            "/".to_string()
        } else {
            rest.to_string()
        })
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, _method: &Method, path: &str) -> bool {
        self.matches_path(path)
    }
}

/// Exact path, optionally restricted to a set of methods.
#[derive(Debug, Clone)]
pub struct ExactPathMatcher {
    path: String,
    methods: Vec<Method>,
}

impl ExactPathMatcher {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            methods: Vec::new(),
        }
    }

    pub fn with_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }
}

impl Matcher for ExactPathMatcher {
    fn matches(&self, method: &Method, path: &str) -> bool {
        path == self.path && (self.methods.is_empty() || self.methods.contains(method))
    }
}
