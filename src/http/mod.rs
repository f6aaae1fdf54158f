//! HTTP ingress subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted connection (axum::serve)
//!     → server.rs (layer stack)
//!     → request.rs (RequestContext, client identity)
//!     → pipeline.rs (origin stage, rate-limit stage)
//!     → middleware/ (ingress, decode)
//!     → routing::RouterTable
//! ```

pub mod middleware;
pub mod pipeline;
pub mod request;
pub mod server;

pub use pipeline::{Admission, IngressPipeline, OriginStage, RateLimitStage, Stage, Verdict};
pub use request::RequestContext;
pub use server::{AppState, HttpServer};
