//! Pool handles: the vtable-dispatched allocator interface, and the
//! concrete bucketed arena pool that implements it.
//!
//! [`PoolHandle`] is a capability set of `alloc`/`realloc`/`free`/`get_size`
//! dispatched through a trait object rather than raw function pointers.
//! [`ArenaPool`] is the one implementation shipped here; test doubles can
//! implement the same trait.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock, Weak};
use std::sync::Arc;
use std::ptr::NonNull;

use crate::bucket::Bucket;
use crate::config::{PoolConfig, BUCKET_COUNT};
use crate::error::AllocError;
use crate::stats::BucketStatsSnapshot;

/// The allocator capability set every pool exposes, modeled as a trait
/// object so callers depend on an interface rather than a concrete arena
/// implementation.
pub trait PoolHandle: Send + Sync {
    fn alloc(&self, size: usize, name: &'static str) -> Result<NonNull<u8>, AllocError>;
    fn realloc(
        &self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
        name: &'static str,
    ) -> Result<NonNull<u8>, AllocError>;
    /// # Safety
    /// `ptr` must have been returned by a prior `alloc`/`realloc` on this
    /// same pool with the given `size`, and must not be freed twice.
    unsafe fn free(&self, ptr: NonNull<u8>, size: usize) -> Result<(), AllocError>;
    /// Total bytes currently checked out across all buckets.
    fn get_size(&self) -> u64;
}

static ROOT_POOLS: OnceLock<Mutex<Vec<Weak<ArenaPool>>>> = OnceLock::new();

fn root_registry() -> &'static Mutex<Vec<Weak<ArenaPool>>> {
    ROOT_POOLS.get_or_init(|| Mutex::new(Vec::new()))
}

/// A bucketed arena pool: `BUCKET_COUNT` fixed-size buckets plus an
/// oversize path that falls through to the system allocator directly.
/// Pools form a tree; destroying a pool cascades to its children.
pub struct ArenaPool {
    config: PoolConfig,
    buckets: Vec<Bucket>,
    bucket_sizes: [usize; BUCKET_COUNT],
    oversize_bytes: std::sync::atomic::AtomicU64,
    children: Mutex<Vec<Arc<ArenaPool>>>,
    destroyed: AtomicBool,
    name: &'static str,
}

impl ArenaPool {
    /// Creates a root pool (no parent) and registers it in the process-wide
    /// list walked by [`ArenaPool::diag_all`].
    pub fn new_root(name: &'static str, config: PoolConfig) -> Arc<Self> {
        let pool = Arc::new(Self::build(name, config));
        root_registry().lock().unwrap().push(Arc::downgrade(&pool));
        pool
    }

    /// Creates a child pool. The child is destroyed automatically when
    /// `self` is destroyed.
    pub fn new_child(self: &Arc<Self>, name: &'static str, config: PoolConfig) -> Arc<Self> {
        let child = Arc::new(Self::build(name, config));
        self.children.lock().unwrap().push(Arc::clone(&child));
        child
    }

    fn build(name: &'static str, config: PoolConfig) -> Self {
        let config = config.normalized();
        let bucket_sizes = config.bucket_sizes();
        let buckets = bucket_sizes.iter().map(|&sz| Bucket::new(sz)).collect();
        Self {
            config,
            buckets,
            bucket_sizes,
            oversize_bytes: std::sync::atomic::AtomicU64::new(0),
            children: Mutex::new(Vec::new()),
            destroyed: AtomicBool::new(false),
            name,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn bucket_for(&self, size: usize) -> Option<usize> {
        self.bucket_sizes.iter().position(|&sz| size <= sz)
    }

    /// Tears down this pool and every descendant: buckets release their
    /// backing memory and further `alloc` calls fail with
    /// [`AllocError::ResourceUnavailable`].
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        for child in self.children.lock().unwrap().drain(..) {
            child.destroy();
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Per-bucket statistics, oldest bucket first.
    pub fn bucket_stats(&self) -> Vec<BucketStatsSnapshot> {
        self.buckets.iter().map(Bucket::snapshot).collect()
    }

    /// Names of every currently-registered root pool, for diagnostics.
    pub fn diag_all() -> Vec<&'static str> {
        root_registry()
            .lock()
            .unwrap()
            .iter()
            .filter_map(Weak::upgrade)
            .map(|p| p.name)
            .collect()
    }
}

impl PoolHandle for ArenaPool {
    fn alloc(&self, size: usize, _name: &'static str) -> Result<NonNull<u8>, AllocError> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(AllocError::ResourceUnavailable);
        }
        if size == 0 {
            return Err(AllocError::InvalidArgument("alloc size must be non-zero"));
        }
        match self.bucket_for(size) {
            Some(idx) => self.buckets[idx]
                .alloc(size)
                .ok_or(AllocError::ResourceUnavailable),
            None => {
                // Oversize path: straight to the system allocator, no
                // bucket bookkeeping, no guard/magic (the bucket machinery
                // only covers the fixed size classes).
                let layout = std::alloc::Layout::array::<u8>(size)
                    .map_err(|_| AllocError::InvalidArgument("size too large"))?;
                // SAFETY: layout is non-zero-sized (checked above).
                let ptr = unsafe { std::alloc::alloc(layout) };
                let ptr = NonNull::new(ptr).ok_or(AllocError::ResourceUnavailable)?;
                self.oversize_bytes.fetch_add(size as u64, Ordering::Relaxed);
                Ok(ptr)
            }
        }
    }

    fn realloc(
        &self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
        name: &'static str,
    ) -> Result<NonNull<u8>, AllocError> {
        if new_size == 0 {
            // SAFETY: caller contract requires `ptr`/`old_size` to match a
            // prior allocation from this pool.
            unsafe { self.free(ptr, old_size)? };
            return self.alloc(1, name);
        }
        let same_bucket = match (self.bucket_for(old_size), self.bucket_for(new_size)) {
            (Some(a), Some(b)) => a == b,
            (None, None) => old_size >= new_size,
            _ => false,
        };
        if same_bucket {
            return Ok(ptr);
        }
        let new_ptr = self.alloc(new_size, name)?;
        // SAFETY: both regions are at least `min(old_size, new_size)` bytes
        // and non-overlapping (freshly allocated `new_ptr`).
        unsafe {
            std::ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr(), old_size.min(new_size));
            self.free(ptr, old_size)?;
        }
        Ok(new_ptr)
    }

    unsafe fn free(&self, ptr: NonNull<u8>, size: usize) -> Result<(), AllocError> {
        match self.bucket_for(size) {
            Some(idx) => self.buckets[idx]
                .free(ptr, self.config.flags.validate_on_free)
                .map_err(AllocError::Poisoned),
            None => {
                let layout = std::alloc::Layout::array::<u8>(size)
                    .map_err(|_| AllocError::InvalidArgument("size too large"))?;
                std::alloc::dealloc(ptr.as_ptr(), layout);
                self.oversize_bytes.fetch_sub(size as u64, Ordering::Relaxed);
                Ok(())
            }
        }
    }

    fn get_size(&self) -> u64 {
        let bucketed: u64 = self
            .buckets
            .iter()
            .map(|b| b.snapshot().in_use as u64 * b.size_class as u64)
            .sum();
        bucketed + self.oversize_bytes.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_free_roundtrip() {
        let pool = ArenaPool::new_root("test", PoolConfig::default());
        let ptr = pool.alloc(64, "thing").unwrap();
        unsafe {
            *ptr.as_ptr() = 0xAB;
            assert_eq!(*ptr.as_ptr(), 0xAB);
            pool.free(ptr, 64).unwrap();
        }
    }

    #[test]
    fn double_free_is_detected() {
        let pool = ArenaPool::new_root("test", PoolConfig {
            flags: crate::config::PoolFlags { validate_on_free: true },
            ..Default::default()
        });
        let ptr = pool.alloc(64, "thing").unwrap();
        unsafe {
            pool.free(ptr, 64).unwrap();
            assert_eq!(pool.free(ptr, 64), Err(AllocError::Poisoned("double free")));
        }
    }

    #[test]
    fn oversize_allocations_bypass_buckets() {
        let pool = ArenaPool::new_root("test", PoolConfig::default());
        let big = pool.config.max_bucket_size * 4;
        let ptr = pool.alloc(big, "huge").unwrap();
        assert_eq!(pool.get_size(), big as u64);
        assert!(pool.bucket_stats().iter().all(|s| s.in_use == 0));
        unsafe { pool.free(ptr, big).unwrap() };
        assert_eq!(pool.get_size(), 0);
    }

    #[test]
    fn destroying_parent_destroys_children() {
        let parent = ArenaPool::new_root("parent", PoolConfig::default());
        let child = parent.new_child("child", PoolConfig::default());
        parent.destroy();
        assert!(child.is_destroyed());
        assert!(matches!(
            parent.alloc(16, "x"),
            Err(AllocError::ResourceUnavailable)
        ));
    }

    #[test]
    fn reused_chunks_are_tracked() {
        let pool = ArenaPool::new_root("test", PoolConfig::default());
        let a = pool.alloc(32, "a").unwrap();
        unsafe { pool.free(a, 32).unwrap() };
        let _b = pool.alloc(32, "b").unwrap();
        let stats = pool.bucket_stats();
        let bucket = stats.iter().find(|s| s.size_class == 32).unwrap();
        assert_eq!(bucket.reused, 1);
    }
}
