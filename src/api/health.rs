//! Shared progress state for the /health endpoint.
//! Updated by the orchestrator's progress callback.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::types::GroupProgress;

#[derive(Default)]
pub struct ProgressState {
    /// True while a batch is being analysed.
    pub running: AtomicBool,
    pub groups_completed: AtomicU64,
    pub groups_total: AtomicU64,
    /// Number of batches finished since startup.
    pub batches_finished: AtomicU64,
}

impl ProgressState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a batch as running until the returned guard is dropped.
    /// Returns None if a batch is already running.
    pub fn start_batch(self: &Arc<Self>) -> Option<BatchGuard> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        self.groups_completed.store(0, Ordering::Relaxed);
        self.groups_total.store(0, Ordering::Relaxed);
        Some(BatchGuard(Arc::clone(self)))
    }

    pub fn record(&self, progress: &GroupProgress) {
        self.groups_completed.store(progress.completed as u64, Ordering::Relaxed);
        self.groups_total.store(progress.total as u64, Ordering::Relaxed);
    }

    fn finish_batch(&self) {
        self.running.store(false, Ordering::Release);
        self.batches_finished.fetch_add(1, Ordering::Relaxed);
    }

    pub fn running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn groups_completed(&self) -> u64 {
        self.groups_completed.load(Ordering::Relaxed)
    }

    pub fn groups_total(&self) -> u64 {
        self.groups_total.load(Ordering::Relaxed)
    }

    pub fn batches_finished(&self) -> u64 {
        self.batches_finished.load(Ordering::Relaxed)
    }
}

/// Clears the running flag on drop, including when the batch future is dropped mid-await.
pub struct BatchGuard(Arc<ProgressState>);

impl Drop for BatchGuard {
    fn drop(&mut self) {
        self.0.finish_batch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GroupKey, GroupOutcome};
    use std::time::Duration;

    #[test]
    fn tracks_batch_lifecycle() {
        let state = Arc::new(ProgressState::new());
        let guard = state.start_batch().unwrap();
        assert!(state.running());
        assert!(state.start_batch().is_none());

        state.record(&GroupProgress {
            key: GroupKey::new("1", "L"),
            completed: 3,
            total: 5,
            outcome: GroupOutcome::NoCoverage { filtered_accounts: 4 },
            elapsed: Duration::from_millis(2),
        });
        assert_eq!(state.groups_completed(), 3);
        assert_eq!(state.groups_total(), 5);

        drop(guard);
        assert!(!state.running());
        assert_eq!(state.batches_finished(), 1);

        assert!(state.start_batch().is_some());
        assert_eq!(state.groups_completed(), 0);
    }

    #[test]
    fn guard_released_during_unwind() {
        let state = Arc::new(ProgressState::new());
        let inner = Arc::clone(&state);
        let unwound = std::panic::catch_unwind(move || {
            let _guard = inner.start_batch().unwrap();
            panic!("batch aborted");
        });
        assert!(unwound.is_err());
        assert!(!state.running());
        assert!(state.start_batch().is_some());
    }
}
