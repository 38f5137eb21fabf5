//! Vtable-dispatched bucketed pool allocator (PA): a tree of pools, each
//! owning fixed-size buckets with free-list reuse, chunk-header poisoning,
//! and an oversize path that falls through to the system allocator. A
//! collaborator consumed by the other crates in this workspace only at
//! their interface boundary — nothing here is on the hot path of the ring
//! queue, worker pool, or log router.

mod bucket;
mod chunk;
mod config;
mod error;
mod pool;
mod stats;

pub use config::{PoolConfig, PoolFlags, BUCKET_COUNT, MIN_BUCKET_SIZE};
pub use error::AllocError;
pub use pool::{ArenaPool, PoolHandle};
pub use stats::{BucketStats, BucketStatsSnapshot};
