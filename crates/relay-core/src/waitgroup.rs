//! A small async wait-group, used to track the three runner populations
//! (inputs, filters, decoders) during shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

struct Inner {
    count: AtomicUsize,
    notify: Notify,
}

/// Counts outstanding runners of one kind. `add`/`done` mutate the count;
/// `wait` resolves once it reaches zero.
#[derive(Clone)]
pub struct WaitGroup(Arc<Inner>);

impl WaitGroup {
    pub fn new() -> Self {
        Self(Arc::new(Inner {
            count: AtomicUsize::new(0),
            notify: Notify::new(),
        }))
    }

    pub fn add(&self, n: usize) {
        self.0.count.fetch_add(n, Ordering::SeqCst);
    }

    /// Decrements the count by one. Wakes waiters if it reaches zero.
    pub fn done(&self) {
        let prev = self.0.count.fetch_sub(1, Ordering::SeqCst);
        if prev == 1 {
            self.0.notify.notify_waiters();
        }
    }

    pub fn count(&self) -> usize {
        self.0.count.load(Ordering::SeqCst)
    }

    /// Resolves once the count reaches zero. A no-op if it already is.
    pub async fn wait(&self) {
        loop {
            if self.0.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            let notified = self.0.notify.notified();
            if self.0.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Default for WaitGroup {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_resolves_once_count_reaches_zero() {
        let wg = WaitGroup::new();
        wg.add(2);
        let wg2 = wg.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            wg2.done();
            wg2.done();
        });
        wg.wait().await;
        assert_eq!(wg.count(), 0);
    }

    #[tokio::test]
    async fn wait_is_immediate_when_already_zero() {
        let wg = WaitGroup::new();
        wg.wait().await;
    }
}
