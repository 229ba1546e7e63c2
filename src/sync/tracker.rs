//! Per-run outcome accumulation

use std::sync::{Mutex, PoisonError};

use chrono::Utc;

use crate::domain::{ItemResult, SyncRun};

/// Collects item results while entities are being reconciled.
///
/// Shared by reference between concurrently running entity futures.
pub struct SyncRunTracker {
    run: Mutex<SyncRun>,
}

impl SyncRunTracker {
    pub fn start(total: usize) -> Self {
        Self {
            run: Mutex::new(SyncRun::new(total)),
        }
    }

    pub fn record(&self, item: ItemResult) {
        let mut run = self.run.lock().unwrap_or_else(PoisonError::into_inner);
        if item.is_success() {
            run.succeeded += 1;
        } else {
            run.failed += 1;
        }
        run.items.push(item);
    }

    /// Entities recorded so far
    pub fn processed(&self) -> usize {
        let run = self.run.lock().unwrap_or_else(PoisonError::into_inner);
        run.succeeded + run.failed
    }

    /// Copy of the run as it stands
    pub fn snapshot(&self) -> SyncRun {
        self.run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Close the run. A cancelled run only counts what was actually processed.
    pub fn finish(self, cancelled: bool) -> SyncRun {
        let mut run = self.run.into_inner().unwrap_or_else(PoisonError::into_inner);
        run.finished_at = Some(Utc::now());
        run.cancelled = cancelled;
        if cancelled {
            run.total = run.succeeded + run.failed;
        }
        run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EntityKind, SyncAction};

    fn ok(id: &str) -> ItemResult {
        ItemResult::success(id, EntityKind::Property, SyncAction::Update, None)
    }

    #[test]
    fn test_counts_follow_outcomes() {
        let tracker = SyncRunTracker::start(3);
        tracker.record(ok("a"));
        tracker.record(ItemResult::failure(
            "b",
            EntityKind::Agent,
            SyncAction::Create,
            "email: invalid",
        ));

        let snapshot = tracker.snapshot();
        assert_eq!((snapshot.succeeded, snapshot.failed), (1, 1));
        assert!(!snapshot.is_finished());

        tracker.record(ok("c"));
        let run = tracker.finish(false);
        assert!(run.is_finished());
        assert_eq!(run.total, run.succeeded + run.failed);
        assert_eq!(run.items.len(), 3);
    }

    #[test]
    fn test_cancelled_run_reduces_total() {
        let tracker = SyncRunTracker::start(10);
        tracker.record(ok("a"));
        tracker.record(ok("b"));

        let run = tracker.finish(true);
        assert!(run.cancelled);
        assert_eq!(run.total, 2);
    }

    #[test]
    fn test_concurrent_records() {
        let tracker = SyncRunTracker::start(64);
        std::thread::scope(|scope| {
            for worker in 0..8 {
                let tracker = &tracker;
                scope.spawn(move || {
                    for i in 0..8 {
                        tracker.record(ok(&format!("{}-{}", worker, i)));
                    }
                });
            }
        });
        assert_eq!(tracker.processed(), 64);
        assert_eq!(tracker.finish(false).items.len(), 64);
    }
}
