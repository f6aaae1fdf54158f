//! Shutdown fan-out.
//!
//! One trigger stops the listener, the rate window sweeper and the telemetry
//! writer. Each holds its own `broadcast::Receiver`; in-flight requests drain
//! inside `axum::serve` after the listener stops accepting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

#[derive(Clone, Debug)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    triggered: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Fire once. Repeated signals are ignored; returns whether this call fired.
    pub fn trigger(&self) -> bool {
        if self.triggered.swap(true, Ordering::SeqCst) {
            return false;
        }
        let notified = self.tx.send(()).unwrap_or(0);
        tracing::info!(listeners = notified, "Shutdown triggered");
        true
    }

    /// Receivers created after the trigger never see the broadcast; check this first.
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
