//! Network layer.
//!
//! # Data Flow
//! ```text
//! lifecycle::startup (dependencies Ready | Degraded)
//!     → listener.rs (bind host:port)
//!     → http::server (axum::serve with connect info)
//! ```

pub mod listener;

pub use listener::{bind, ListenerError};
