//! Bounded pointer stack (BS).
//!
//! A fixed-capacity LIFO backed by a flat array, shared by all producers and
//! consumers through a single `size` counter: pushers CAS-claim `size` as
//! their slot index and bump it, poppers CAS-claim `size - 1` and decrement
//! it. Each claimed slot is then spin-published/spin-consumed exactly as in
//! the ring queue, so a thread that has claimed an index but not yet
//! published never gets raced by a pop that could otherwise observe a
//! half-written slot.

use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use crate::backoff::Backoff;
use crate::error::StackError;

/// A bounded, array-backed LIFO stack of pointers, used primarily as the
/// worker pool's task queue.
pub struct PtrStack<T> {
    capacity: usize,
    size: AtomicUsize,
    slots: Box<[AtomicPtr<T>]>,
}

unsafe impl<T: Send> Send for PtrStack<T> {}
unsafe impl<T: Send> Sync for PtrStack<T> {}

impl<T> PtrStack<T> {
    pub fn new(capacity: usize) -> Result<Self, StackError> {
        if capacity == 0 {
            return Err(StackError::InvalidArgument("capacity must be non-zero"));
        }
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || AtomicPtr::new(ptr::null_mut()));
        Ok(Self {
            capacity,
            size: AtomicUsize::new(0),
            slots: slots.into_boxed_slice(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&self, value: T) -> Result<(), StackError> {
        let raw = Box::into_raw(Box::new(value));
        let mut size;
        loop {
            size = self.size.load(Ordering::Relaxed);
            if size >= self.capacity {
                // SAFETY: `raw` was never published; reclaim it.
                unsafe { drop(Box::from_raw(raw)) };
                return Err(StackError::Full);
            }
            if self
                .size
                .compare_exchange_weak(size, size + 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
        }

        let slot = &self.slots[size];
        let mut backoff = Backoff::new();
        loop {
            if slot
                .compare_exchange_weak(ptr::null_mut(), raw, Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                return Ok(());
            }
            backoff.snooze();
        }
    }

    pub fn pop(&self) -> Result<T, StackError> {
        let new_size;
        loop {
            let size = self.size.load(Ordering::Relaxed);
            if size == 0 {
                return Err(StackError::Empty);
            }
            let candidate = size - 1;
            if self
                .size
                .compare_exchange_weak(size, candidate, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                new_size = candidate;
                break;
            }
        }

        let slot = &self.slots[new_size];
        let mut backoff = Backoff::new();
        let raw = loop {
            let candidate = slot.load(Ordering::Acquire);
            if !candidate.is_null()
                && slot
                    .compare_exchange_weak(
                        candidate,
                        ptr::null_mut(),
                        Ordering::AcqRel,
                        Ordering::Relaxed,
                    )
                    .is_ok()
            {
                break candidate;
            }
            backoff.snooze();
        };
        // SAFETY: `raw` was produced by `Box::into_raw` in `push` and this is
        // the only path that reclaims it.
        Ok(*unsafe { Box::from_raw(raw) })
    }
}

impl<T> Drop for PtrStack<T> {
    fn drop(&mut self) {
        while self.pop().is_ok() {}
    }
}
