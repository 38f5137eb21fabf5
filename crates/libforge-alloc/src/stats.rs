use std::sync::atomic::{AtomicU64, Ordering};

/// Lifetime counters for a single bucket.
#[derive(Debug, Default)]
pub struct BucketStats {
    pub allocs: AtomicU64,
    pub frees: AtomicU64,
    pub reused: AtomicU64,
    pub in_use: AtomicU64,
}

/// A point-in-time copy of [`BucketStats`], safe to hand out to callers.
#[derive(Debug, Clone, Copy, Default)]
pub struct BucketStatsSnapshot {
    pub size_class: usize,
    pub allocs: u64,
    pub frees: u64,
    pub reused: u64,
    pub in_use: u64,
}

impl BucketStats {
    pub(crate) fn record_alloc(&self, reused: bool) {
        self.allocs.fetch_add(1, Ordering::Relaxed);
        self.in_use.fetch_add(1, Ordering::Relaxed);
        if reused {
            self.reused.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_free(&self) {
        self.frees.fetch_add(1, Ordering::Relaxed);
        self.in_use.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, size_class: usize) -> BucketStatsSnapshot {
        BucketStatsSnapshot {
            size_class,
            allocs: self.allocs.load(Ordering::Relaxed),
            frees: self.frees.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            in_use: self.in_use.load(Ordering::Relaxed),
        }
    }
}
