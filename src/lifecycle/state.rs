//! Server lifecycle state machine.
//!
//! ```text
//! Initializing ──► Ready
//!      │      └──► Degraded
//!      └─────────► Failed
//! ```
//!
//! Terminal states never change. The current state is published on a
//! `watch` channel so handlers and tests can observe it.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;

use crate::observability::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Initializing,
    Ready,
    /// Serving without one or more optional dependencies.
    Degraded,
    Failed,
}

impl LifecycleState {
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        matches!(
            (self, next),
            (LifecycleState::Initializing, LifecycleState::Ready)
                | (LifecycleState::Initializing, LifecycleState::Degraded)
                | (LifecycleState::Initializing, LifecycleState::Failed)
        )
    }

    /// Whether the listener may accept traffic in this state.
    pub fn is_serving(self) -> bool {
        matches!(self, LifecycleState::Ready | LifecycleState::Degraded)
    }

    pub fn as_gauge(self) -> f64 {
        match self {
            LifecycleState::Initializing => 0.0,
            LifecycleState::Ready => 1.0,
            LifecycleState::Degraded => 2.0,
            LifecycleState::Failed => 3.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Initializing => "initializing",
            LifecycleState::Ready => "ready",
            LifecycleState::Degraded => "degraded",
            LifecycleState::Failed => "failed",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("illegal lifecycle transition {from} -> {to}")]
pub struct TransitionError {
    pub from: LifecycleState,
    pub to: LifecycleState,
}

/// Shared handle to the lifecycle state.
#[derive(Clone, Debug)]
pub struct LifecycleHandle {
    tx: Arc<watch::Sender<LifecycleState>>,
}

impl LifecycleHandle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LifecycleState::Initializing);
        metrics::record_lifecycle_state(LifecycleState::Initializing);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> LifecycleState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }

    pub fn transition(&self, next: LifecycleState) -> Result<(), TransitionError> {
        let mut result = Ok(());
        self.tx.send_if_modified(|state| {
            if state.can_transition_to(next) {
                *state = next;
                true
            } else {
                result = Err(TransitionError { from: *state, to: next });
                false
            }
        });

        if result.is_ok() {
            tracing::info!(state = %next, "Lifecycle state changed");
            metrics::record_lifecycle_state(next);
        }
        result
    }
}

impl Default for LifecycleHandle {
    fn default() -> Self {
        Self::new()
    }
}
