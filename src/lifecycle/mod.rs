//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     database connect ──fail──► Failed (listener never bound)
//!          │
//!          ▼
//!     cache connect (if enabled) ──fail──► Degraded
//!          │
//!          ▼
//!     Ready | Degraded → bind listener → serve
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGINT/SIGTERM → broadcast → stop accepting → drain → background tasks exit
//! ```
//!
//! # Design Decisions
//! - State transitions are published on a watch channel (state.rs)
//! - Only the database is critical

pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod state;

pub use shutdown::Shutdown;
pub use startup::{
    launch, prepare, Dependencies, DependencySequencer, DependencyTimeouts, PreparedServer,
    StartupError,
};
pub use state::{LifecycleHandle, LifecycleState};
