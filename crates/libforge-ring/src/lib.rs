//! Lock-free concurrency substrate: a bounded MPMC ring queue, an intrusive
//! LIFO stack, a bounded pointer stack, a periodic clock thread, and the
//! overflow-safe running statistics shared by the crates built on top of
//! this one.

mod backoff;
mod cache;
mod clock;
mod error;
mod lstack;
mod ring;
mod spinlock;
mod stack;
mod stats;

pub use backoff::Backoff;
pub use cache::CacheAligned;
pub use clock::{now, Micros, PeriodicClock, MSEC, SEC, USEC};
pub use error::{RingError, StackError};
pub use lstack::LifoStack;
pub use ring::RingQueue;
pub use stack::PtrStack;
pub use stats::StatRange;
