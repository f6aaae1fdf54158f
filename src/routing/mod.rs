//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Admitted request (method, path)
//!     → table.rs (walk bindings in registration order)
//!     → matcher.rs (prefix at segment boundary, group claims)
//!     → groups.rs (HandlerGroup::handle with the mount prefix stripped)
//!     → or 404 "Cannot <METHOD> <path>"
//! ```
//!
//! # Design Decisions
//! - Bindings are fixed before the listener binds
//! - First match wins; registration order is the priority
//! - No regex in the hot path

pub mod groups;
pub mod matcher;
pub mod table;

pub use groups::{HandlerGroup, HealthCheck, RouterGroup, HEALTH_MESSAGE};
pub use matcher::{ExactPathMatcher, Matcher, PathPrefixMatcher};
pub use table::{not_found, Resolved, RouterTable, RoutingError};
