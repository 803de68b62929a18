//! `PipelinePack`, the reusable message carrier, and the bounded pool it is
//! checked in and out of.

use crate::abort::AbortSignal;
use crate::error::{PipelineError, PipelineResult};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Which of the two pack pools a pack should be returned to when its
/// reference count reaches zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    /// Checked out by an input via `InputRecycleChan`.
    Input,
    /// Checked out by an injector (filter/output re-injection) via
    /// `InjectRecycleChan`.
    Inject,
}

/// A reusable message carrier. Allocated once at startup, checked out of a
/// [`PackPool`], mutated in place, and released back when its reference
/// count hits zero.
#[derive(Debug, Clone)]
pub struct PipelinePack {
    id: Uuid,
    timestamp_unix_nanos: u128,
    hostname: String,
    pid: u32,
    /// Opaque message payload. Wire format and message schema are out of
    /// scope for this crate.
    pub message: Value,
    ref_count: usize,
    loop_count: u32,
    pool: PoolKind,
}

impl PipelinePack {
    fn new(pool: PoolKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp_unix_nanos: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or_default(),
            hostname: hostname(),
            pid: std::process::id(),
            message: Value::Null,
            ref_count: 0,
            loop_count: 0,
            pool,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn timestamp_unix_nanos(&self) -> u128 {
        self.timestamp_unix_nanos
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn loop_count(&self) -> u32 {
        self.loop_count
    }

    pub fn pool_kind(&self) -> PoolKind {
        self.pool
    }

    pub fn ref_count(&self) -> usize {
        self.ref_count
    }

    /// Increments the reference count, e.g. when a pack is fanned out to
    /// more than one filter.
    pub fn retain(&mut self) {
        self.ref_count += 1;
    }

    /// Decrements the reference count. Returns `true` once it reaches zero,
    /// at which point the caller must release the pack back to its pool.
    pub fn release_ref(&mut self) -> bool {
        self.ref_count = self.ref_count.saturating_sub(1);
        self.ref_count == 0
    }

    /// Sets the loop count, e.g. `loopCount_in + 1` on a `PipelinePack` call.
    pub fn set_loop_count(&mut self, loop_count: u32) {
        self.loop_count = loop_count;
    }

    fn reset(&mut self) {
        self.id = Uuid::new_v4();
        self.timestamp_unix_nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        self.message = Value::Null;
        self.ref_count = 1;
        self.loop_count = 0;
    }
}

fn hostname() -> String {
    whoami::fallible::hostname().unwrap_or_else(|_| "unknown".to_string())
}

/// A fixed-capacity pool of [`PipelinePack`]s.
///
/// The orchestrator maintains exactly two of these (input pool and inject
/// pool) with equal capacity. They must never be collapsed into one: filters
/// re-emit packs from the inject pool while inputs may be blocked on the
/// input pool, and merging the two reintroduces a deadlock.
pub struct PackPool {
    tx: mpsc::Sender<PipelinePack>,
    rx: tokio::sync::Mutex<mpsc::Receiver<PipelinePack>>,
    capacity: usize,
    kind: PoolKind,
}

impl PackPool {
    /// Builds a pool of the given capacity, pre-filled with fresh packs.
    pub fn new(capacity: usize, kind: PoolKind) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        for _ in 0..capacity {
            tx.try_send(PipelinePack::new(kind))
                .expect("pool channel sized to its own capacity");
        }
        Self {
            tx,
            rx: tokio::sync::Mutex::new(rx),
            capacity,
            kind,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    /// Checks a pack out of the pool, blocking until one is available or
    /// `abort` fires.
    pub async fn checkout(&self, abort: &AbortSignal) -> PipelineResult<PipelinePack> {
        if abort.is_aborted() {
            return Err(PipelineError::Aborted);
        }
        let mut rx = self.rx.lock().await;
        tokio::select! {
            biased;
            _ = abort.wait() => Err(PipelineError::Aborted),
            pack = rx.recv() => {
                let mut pack = pack.expect("pool sender outlives every receiver reference");
                pack.reset();
                Ok(pack)
            }
        }
    }

    /// Returns a pack to the pool. Called once a pack's reference count
    /// reaches zero.
    pub async fn release(&self, pack: PipelinePack) {
        let _ = self.tx.send(pack).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn checkout_and_release_round_trip() {
        let pool = PackPool::new(2, PoolKind::Input);
        let abort = AbortSignal::new();
        let a = pool.checkout(&abort).await.unwrap();
        let b = pool.checkout(&abort).await.unwrap();
        assert_ne!(a.id(), b.id());
        pool.release(a).await;
        pool.release(b).await;
    }

    #[tokio::test]
    async fn checkout_blocks_past_capacity_until_abort() {
        let pool = PackPool::new(1, PoolKind::Inject);
        let abort = AbortSignal::new();
        let _held = pool.checkout(&abort).await.unwrap();

        let abort_clone = abort.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            abort_clone.abort();
        });

        let err = pool.checkout(&abort).await.unwrap_err();
        assert!(matches!(err, PipelineError::Aborted));
    }

    #[test]
    fn ref_counting_reaches_zero_once() {
        let mut pack = PipelinePack::new(PoolKind::Input);
        pack.ref_count = 1;
        pack.retain();
        assert_eq!(pack.ref_count(), 2);
        assert!(!pack.release_ref());
        assert!(pack.release_ref());
    }
}
