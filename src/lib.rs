//! libforge: a foundational systems library providing the shared plumbing
//! used by higher-level servers and tools.
//!
//! The concurrency substrate — a lock-free bounded MPMC ring queue, an
//! intrusive LIFO stack, a bounded pointer stack, and a periodic clock
//! thread — lives in [`ring`]. An elastic, autoscaling [`pool::WorkerPool`]
//! consumes the bounded pointer stack. A fan-out [`log`] routing fabric
//! multiplexes records to synchronous "direct" sinks and asynchronous
//! "queued" sinks. [`alloc`] is a bucketed pool allocator collaborator, and
//! [`net`] is a readiness-driven TCP acceptor that dispatches accepted
//! connections into the ring queue, a fresh thread, or the worker pool.
//!
//! This crate is a thin re-export facade; the actual implementations live
//! in the `libforge-*` crates under `crates/` so each can be depended on
//! independently.

pub use libforge_ring as ring;

pub use libforge_pool as pool;

pub use libforge_log as log;

pub use libforge_alloc as alloc;

pub use libforge_net as net;
