//! Ingress security policies.
//!
//! # Data Flow
//! ```text
//! RequestContext
//!     → origin.rs (exact-match allow-list, CORS headers)
//!     → rate_limit.rs (fixed window per client identity)
//! ```
//!
//! # Design Decisions
//! - Fail closed: an unlisted origin never reaches a handler
//! - Policy state is built once at startup

pub mod origin;
pub mod rate_limit;

pub use origin::{AllowList, CorsGrant, OriginDecision, OriginPolicy};
pub use rate_limit::{
    CounterStore, FixedWindowLimiter, MemoryCounterStore, Quota, RateDecision, RatePolicy,
};
