//! Ingress layer for the interest-fusion API server.
//!
//! Requests pass an ordered chain (origin policy, rate limiting, body and
//! cookie decoding, telemetry) before the router table hands them to a
//! feature's handler group. The listener is bound only after the database is
//! reachable; the cache is optional and its absence degrades the server
//! instead of stopping it.

pub mod config;
pub mod dependencies;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod security;

pub use config::IngressConfig;
pub use error::IngressError;
pub use http::HttpServer;
pub use lifecycle::{LifecycleState, Shutdown};
pub use routing::{HandlerGroup, RouterTable};
