//! A single fixed-size bucket: a free list of previously-released chunks
//! plus lifetime stats. Bucket lists are protected by a plain mutex, unlike
//! the lock-free core crates, since allocator churn is not expected to be
//! as hot a path as the ring queue or worker pool backlog.

use std::ptr::NonNull;
use std::sync::Mutex;

use crate::chunk::Chunk;
use crate::stats::{BucketStats, BucketStatsSnapshot};

pub(crate) struct Bucket {
    pub(crate) size_class: usize,
    free: Mutex<Vec<Chunk>>,
    stats: BucketStats,
}

impl Bucket {
    pub(crate) fn new(size_class: usize) -> Self {
        Self {
            size_class,
            free: Mutex::new(Vec::new()),
            stats: BucketStats::default(),
        }
    }

    /// Pops a chunk from the free list, or allocates a fresh one if the
    /// free list is empty, activates it for `requested` bytes, and returns
    /// the data pointer handed to the caller.
    pub(crate) fn alloc(&self, requested: usize) -> Option<NonNull<u8>> {
        let mut reused = true;
        let chunk = {
            let mut free = self.free.lock().unwrap();
            free.pop()
        };
        let chunk = match chunk {
            Some(c) => c,
            None => {
                reused = false;
                Chunk::alloc(self.size_class)?
            }
        };
        // SAFETY: this chunk is either fresh or was exclusively removed
        // from the free list, so nothing else references it.
        unsafe { chunk.activate(requested) };
        self.stats.record_alloc(reused);
        let data = chunk.data_ptr();
        std::mem::forget(chunk);
        Some(data)
    }

    /// Validates and returns a previously-allocated chunk to the free list.
    ///
    /// # Safety
    /// `data` must have come from a prior `alloc` on this exact bucket and
    /// must not be reused or freed again afterward.
    pub(crate) unsafe fn free(
        &self,
        data: NonNull<u8>,
        validate_guard: bool,
    ) -> Result<(), &'static str> {
        let chunk = Chunk::from_data_ptr(data, self.size_class);
        chunk.deactivate(validate_guard)?;
        self.stats.record_free();
        self.free.lock().unwrap().push(chunk);
        Ok(())
    }

    pub(crate) fn snapshot(&self) -> BucketStatsSnapshot {
        self.stats.snapshot(self.size_class)
    }
}

impl Drop for Bucket {
    fn drop(&mut self) {
        let mut free = self.free.lock().unwrap();
        for chunk in free.drain(..) {
            // SAFETY: these chunks are only reachable from this free list,
            // which is being torn down; nothing else can observe them.
            unsafe { chunk.release() };
        }
    }
}
