//! The single process-wide abort signal that drives shutdown.

use tokio::sync::watch;

/// A cloneable handle onto the process-wide abort signal. Closed (set to
/// `true`) once to initiate shutdown; every waiter observes the same flip.
#[derive(Clone)]
pub struct AbortSignal {
    tx: std::sync::Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: std::sync::Arc::new(tx),
            rx,
        }
    }

    /// Fires the abort signal. Idempotent.
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the signal has fired. Safe to select! against.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return;
        }
        let _ = rx.changed().await;
    }
}

impl Default for AbortSignal {
    fn default() -> Self {
        Self::new()
    }
}
