//! Shared tally of response status codes.
//!
//! An [`AggregationResult`] is a cheap handle around a lock-protected map.
//! Fetch tasks write into it, the completion watcher marks it done, and any
//! number of observers can read it while aggregation is still running.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;

#[derive(Debug, Default)]
struct Tally {
    counts: BTreeMap<u16, u64>,
    done: bool,
}

#[derive(Debug)]
struct Shared {
    tally: RwLock<Tally>,
    done_tx: watch::Sender<bool>,
}

/// Live, concurrency-safe count of HTTP status codes.
///
/// Cloning the handle shares the underlying state.
#[derive(Debug, Clone)]
pub struct AggregationResult {
    shared: Arc<Shared>,
}

impl Default for AggregationResult {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregationResult {
    /// Create an empty, not-done result.
    pub fn new() -> Self {
        let (done_tx, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                tally: RwLock::new(Tally::default()),
                done_tx,
            }),
        }
    }

    // Every write is a single increment or flag flip, so a poisoned lock
    // still guards a consistent tally.
    fn read(&self) -> RwLockReadGuard<'_, Tally> {
        self.shared
            .tally
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tally> {
        self.shared
            .tally
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Increment the count for `code`.
    pub fn record_status(&self, code: u16) {
        let mut tally = self.write();
        *tally.counts.entry(code).or_default() += 1;
    }

    /// Current count for `code`, 0 if it was never recorded.
    #[allow(dead_code)] // Query API; the CLI reads snapshots
    pub fn count(&self, code: u16) -> u64 {
        self.read().counts.get(&code).copied().unwrap_or(0)
    }

    /// Independent copy of every count recorded so far.
    pub fn snapshot(&self) -> BTreeMap<u16, u64> {
        self.read().counts.clone()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.read().counts.values().sum()
    }

    /// Whether aggregation has finished.
    #[allow(dead_code)] // Polling API; the CLI awaits `wait_done`
    pub fn is_done(&self) -> bool {
        self.read().done
    }

    /// Flag the result as finished. Calling it again is a no-op.
    pub fn mark_done(&self) {
        {
            let mut tally = self.write();
            if tally.done {
                return;
            }
            tally.done = true;
        }
        self.shared.done_tx.send_replace(true);
    }

    /// Wait until the result is marked done.
    ///
    /// Resolves immediately when the result is already done.
    pub async fn wait_done(&self) {
        let mut done_rx = self.shared.done_tx.subscribe();
        // The sender lives as long as `self`, so this cannot observe a
        // closed channel.
        let _ = done_rx.wait_for(|done| *done).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_new_result_is_empty() {
        let result = AggregationResult::new();
        assert!(!result.is_done());
        assert_eq!(result.count(200), 0);
        assert_eq!(result.total(), 0);
        assert!(result.snapshot().is_empty());
    }

    #[test]
    fn test_record_status() {
        let result = AggregationResult::new();
        result.record_status(200);
        result.record_status(200);
        result.record_status(404);

        assert_eq!(result.count(200), 2);
        assert_eq!(result.count(404), 1);
        assert_eq!(result.count(500), 0);
        assert_eq!(result.total(), 3);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let result = AggregationResult::new();
        result.record_status(200);

        let mut snapshot = result.snapshot();
        snapshot.insert(200, 99);
        snapshot.insert(500, 7);

        assert_eq!(result.count(200), 1);
        assert_eq!(result.count(500), 0);
        assert_eq!(result.snapshot(), BTreeMap::from([(200, 1)]));
    }

    #[test]
    fn test_mark_done_is_idempotent() {
        let result = AggregationResult::new();
        result.mark_done();
        result.mark_done();
        assert!(result.is_done());

        // Recording after done does not revert the flag.
        result.record_status(200);
        assert!(result.is_done());
    }

    #[test]
    fn test_clones_share_state() {
        let result = AggregationResult::new();
        let observer = result.clone();

        result.record_status(301);
        result.mark_done();

        assert_eq!(observer.count(301), 1);
        assert!(observer.is_done());
    }

    #[test]
    fn test_concurrent_records_from_threads() {
        let result = AggregationResult::new();
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let result = result.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        result.record_status(200);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(result.count(200), 16_000);
    }

    #[tokio::test]
    async fn test_wait_done_after_mark() {
        let result = AggregationResult::new();
        let waiter = result.clone();

        let task = tokio::spawn(async move { waiter.wait_done().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        result.mark_done();

        let joined = tokio_test::assert_ok!(tokio::time::timeout(Duration::from_secs(1), task).await);
        tokio_test::assert_ok!(joined);
    }

    #[tokio::test]
    async fn test_wait_done_when_already_done() {
        let result = AggregationResult::new();
        result.mark_done();

        tokio_test::assert_ok!(
            tokio::time::timeout(Duration::from_millis(100), result.wait_done()).await
        );
    }
}
