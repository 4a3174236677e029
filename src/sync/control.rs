//! Run cancellation
//!
//! A run checks its control before dispatching each file. Files already in
//! flight finish; files not yet dispatched are recorded as cancelled. Waits
//! that precede the upload phase (readiness, connecting) are abandoned as soon
//! as the control is cancelled.

use std::sync::Arc;

use tokio::sync::watch;

/// Cancellation signal shared between a run and whoever may abort it
#[derive(Debug, Clone)]
pub struct RunControl {
    cancel_tx: Arc<watch::Sender<bool>>,
    cancel_rx: watch::Receiver<bool>,
}

impl RunControl {
    pub fn new() -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Self {
            cancel_tx: Arc::new(cancel_tx),
            cancel_rx,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_rx.borrow()
    }

    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    /// Resolves once [`cancel`](Self::cancel) has been called
    pub async fn cancelled(&self) {
        let mut rx = self.cancel_rx.clone();
        // The sender lives as long as `self`, so this only returns on cancel
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}
