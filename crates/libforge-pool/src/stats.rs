use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use libforge_ring::StatRange;

/// Lifetime counters and distributions for a worker pool, matching the
/// schema the pool exposes on `destroy`/`snapshot`.
#[derive(Debug)]
pub struct PoolStats {
    pub threads_created: AtomicU64,
    pub threads_destroyed: AtomicU64,
    pub tasks_created: AtomicU64,
    inner: Mutex<PoolStatDistributions>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PoolStatDistributions {
    pub active_thread_count: StatRange,
    pub idle_thread_count: StatRange,
    /// Microseconds a task waited in the backlog before a worker picked it up.
    pub task_delay: StatRange,
    /// Per-worker count of tasks processed in one uninterrupted busy streak
    /// (reset whenever a worker goes idle).
    pub busy_streak: StatRange,
    /// Backlog depth observed at the moment a task was submitted.
    pub queue_depth: StatRange,
}

/// A point-in-time copy of [`PoolStats`], safe to hand out to callers.
#[derive(Debug, Clone, Copy)]
pub struct PoolStatsSnapshot {
    pub threads_created: u64,
    pub threads_destroyed: u64,
    pub tasks_created: u64,
    pub distributions: PoolStatDistributions,
}

impl Default for PoolStats {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolStats {
    pub fn new() -> Self {
        Self {
            threads_created: AtomicU64::new(0),
            threads_destroyed: AtomicU64::new(0),
            tasks_created: AtomicU64::new(0),
            inner: Mutex::new(PoolStatDistributions::default()),
        }
    }

    pub(crate) fn record_task_submitted(&self, queue_depth: u64, active: u64, idle: u64) {
        self.tasks_created.fetch_add(1, Ordering::Relaxed);
        let mut guard = self.inner.lock().unwrap();
        guard.queue_depth.update(queue_depth);
        guard.active_thread_count.update(active);
        guard.idle_thread_count.update(idle);
    }

    /// Folds another worker's locally accumulated stats into the pool-wide
    /// total, under a single lock, matching the fold-on-exit contract.
    pub(crate) fn fold(&self, local: &PoolStatDistributions) {
        let mut guard = self.inner.lock().unwrap();
        guard.active_thread_count.merge(&local.active_thread_count);
        guard.idle_thread_count.merge(&local.idle_thread_count);
        guard.task_delay.merge(&local.task_delay);
        guard.busy_streak.merge(&local.busy_streak);
        guard.queue_depth.merge(&local.queue_depth);
    }

    pub fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            threads_created: self.threads_created.load(Ordering::Relaxed),
            threads_destroyed: self.threads_destroyed.load(Ordering::Relaxed),
            tasks_created: self.tasks_created.load(Ordering::Relaxed),
            distributions: *self.inner.lock().unwrap(),
        }
    }
}
