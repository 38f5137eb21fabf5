//! Bounded multi-producer multi-consumer ring queue (RQ).
//!
//! Producers claim a tail index with a CAS loop, then spin-publish their
//! pointer into that slot (the slot transitions `NULL -> value`). Consumers
//! serialize head-claiming behind a small spinlock — only one consumer may
//! be advancing `head` at a time — then spin-read the claimed slot until the
//! producer's publish becomes visible, and swap it back to `NULL` so the
//! slot can be reused.
//!
//! One slot of the backing array is always kept empty so that `head == tail`
//! is an unambiguous "empty" signal; a full queue is instead tracked with a
//! separate in-flight counter so that [`RingQueue::try_enqueue`] can fail
//! fast rather than ever leaving a claimed-but-unpublished slot behind.

use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use crate::backoff::Backoff;
use crate::cache::CacheAligned;
use crate::error::RingError;
use crate::spinlock::Spinlock;

/// A bounded, intrusive-pointer ring queue supporting any number of
/// concurrent producers and consumers.
///
/// Values are transported by pointer: `enqueue` takes ownership of a `T` by
/// boxing it, and `dequeue` hands ownership back out as a `Box<T>`, keeping
/// the public API memory-safe while preserving the any-non-null-pointer
/// transport contract underneath.
pub struct RingQueue<T> {
    /// Backing array length; one larger than the usable capacity.
    capacity: usize,
    tail: CacheAligned<AtomicUsize>,
    head: CacheAligned<AtomicUsize>,
    read_lock: Spinlock,
    in_flight: AtomicUsize,
    slots: Box<[AtomicPtr<T>]>,
}

// SAFETY: the ring only ever stores pointers obtained from `Box::into_raw`
// of a `T: Send`, and ownership transfers atomically through the slot swap.
unsafe impl<T: Send> Send for RingQueue<T> {}
unsafe impl<T: Send> Sync for RingQueue<T> {}

impl<T> RingQueue<T> {
    /// Allocates a ring able to hold `capacity` concurrently in-flight
    /// elements. `capacity` must be non-zero.
    pub fn new(capacity: usize) -> Result<Self, RingError> {
        if capacity == 0 {
            return Err(RingError::InvalidArgument("capacity must be non-zero"));
        }
        let backing = capacity + 1; // one slot is always kept empty
        let mut slots = Vec::with_capacity(backing);
        slots.resize_with(backing, || AtomicPtr::new(ptr::null_mut()));
        Ok(Self {
            capacity: backing,
            tail: CacheAligned::new(AtomicUsize::new(0)),
            head: CacheAligned::new(AtomicUsize::new(0)),
            read_lock: Spinlock::new(),
            in_flight: AtomicUsize::new(0),
            slots: slots.into_boxed_slice(),
        })
    }

    /// Usable capacity (one less than the backing array length).
    pub fn capacity(&self) -> usize {
        self.capacity - 1
    }

    /// Approximate number of elements currently enqueued. Racy under
    /// concurrent use; intended for accounting/diagnostics, not control flow.
    pub fn len(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enqueues `value`, blocking (with adaptive backoff) until a slot is
    /// available. Matches the "does not check if full, spins" contract: a
    /// queue sized to accommodate its expected maximum concurrency never
    /// observably blocks here.
    pub fn enqueue(&self, value: T) {
        let raw = Box::into_raw(Box::new(value));
        self.enqueue_raw(raw);
    }

    /// Enqueues `value` without blocking. Fails fast with
    /// [`RingError::CapacityExhausted`] if the queue looks full, without
    /// ever claiming a tail slot it can't immediately publish into.
    pub fn try_enqueue(&self, value: T) -> Result<(), RingError> {
        if self.in_flight.load(Ordering::Acquire) >= self.capacity - 1 {
            return Err(RingError::CapacityExhausted);
        }
        let raw = Box::into_raw(Box::new(value));
        self.enqueue_raw(raw);
        Ok(())
    }

    fn enqueue_raw(&self, raw: *mut T) {
        let mut tail;
        let mut backoff = Backoff::new();
        loop {
            tail = self.tail.load(Ordering::Relaxed);
            let new_tail = (tail + 1) % self.capacity;
            if self
                .tail
                .compare_exchange_weak(tail, new_tail, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
            backoff.snooze();
        }

        let slot = &self.slots[tail];
        let mut backoff = Backoff::new();
        loop {
            if slot
                .compare_exchange_weak(ptr::null_mut(), raw, Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
            backoff.snooze();
        }
        self.in_flight.fetch_add(1, Ordering::AcqRel);
    }

    /// Dequeues the oldest element, or `Drained` if the queue was empty at
    /// the time of the call.
    pub fn dequeue(&self) -> Result<T, RingError> {
        let head = {
            let _guard = self.read_lock.lock();
            let mut head;
            loop {
                head = self.head.load(Ordering::Relaxed);
                if head == self.tail.load(Ordering::Acquire) {
                    return Err(RingError::Drained);
                }
                let new_head = (head + 1) % self.capacity;
                if self
                    .head
                    .compare_exchange_weak(head, new_head, Ordering::AcqRel, Ordering::Relaxed)
                    .is_ok()
                {
                    break;
                }
            }
            head
        };

        let slot = &self.slots[head];
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
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        // SAFETY: `raw` was produced by `Box::into_raw` in `enqueue_raw` and
        // this is the only path that ever reclaims it.
        Ok(*unsafe { Box::from_raw(raw) })
    }
}

impl<T> Drop for RingQueue<T> {
    fn drop(&mut self) {
        while self.dequeue().is_ok() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn single_thread_fifo() {
        let q: RingQueue<u32> = RingQueue::new(8).unwrap();
        for i in 0..8 {
            q.try_enqueue(i).unwrap();
        }
        assert_eq!(q.try_enqueue(99), Err(RingError::CapacityExhausted));
        for i in 0..8 {
            assert_eq!(q.dequeue().unwrap(), i);
        }
        assert_eq!(q.dequeue(), Err(RingError::Drained));
    }

    #[test]
    fn empty_queue_drained() {
        let q: RingQueue<u32> = RingQueue::new(4).unwrap();
        assert_eq!(q.dequeue(), Err(RingError::Drained));
    }

    #[test]
    fn mpmc_total_conservation() {
        let q = Arc::new(RingQueue::<u64>::new(64).unwrap());
        const PRODUCERS: u64 = 8;
        const PER_PRODUCER: u64 = 4096;

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let q = Arc::clone(&q);
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        q.enqueue(p * PER_PRODUCER + i);
                    }
                })
            })
            .collect();

        let consumer_q = Arc::clone(&q);
        let total = PRODUCERS * PER_PRODUCER;
        let consumer = thread::spawn(move || {
            let mut seen = 0u64;
            let mut sum = 0u128;
            while seen < total {
                if let Ok(v) = consumer_q.dequeue() {
                    sum += u128::from(v);
                    seen += 1;
                }
            }
            sum
        });

        for p in producers {
            p.join().unwrap();
        }
        let sum = consumer.join().unwrap();
        let expected: u128 = (0..total).map(u128::from).sum();
        assert_eq!(sum, expected);
        assert!(q.is_empty());
    }
}
