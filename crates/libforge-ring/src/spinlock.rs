use std::sync::atomic::{AtomicBool, Ordering};

use crate::backoff::Backoff;

/// A minimal test-and-test-and-set spinlock.
///
/// Used internally to serialize the small critical sections that the ring
/// queue and LIFO stack need on their consumer side (claiming the next
/// index/node). It is intentionally not exposed as a general-purpose
/// mutex: both callers hold it only long enough to perform a single CAS.
#[derive(Debug, Default)]
pub(crate) struct Spinlock {
    locked: AtomicBool,
}

impl Spinlock {
    pub(crate) const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    pub(crate) fn lock(&self) -> SpinlockGuard<'_> {
        let mut backoff = Backoff::new();
        loop {
            if !self.locked.load(Ordering::Relaxed)
                && self
                    .locked
                    .compare_exchange_weak(
                        false,
                        true,
                        Ordering::Acquire,
                        Ordering::Relaxed,
                    )
                    .is_ok()
            {
                return SpinlockGuard { lock: self };
            }
            backoff.snooze();
        }
    }
}

pub(crate) struct SpinlockGuard<'a> {
    lock: &'a Spinlock,
}

impl Drop for SpinlockGuard<'_> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}
