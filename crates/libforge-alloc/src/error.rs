use thiserror::Error;

/// Errors surfaced by the pool allocator.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// The backing system allocator returned null.
    #[error("system allocator exhausted")]
    ResourceUnavailable,
    /// A construction argument was out of range (zero-sized bucket, etc.).
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// A chunk header's magic or tail guard did not match on free — either
    /// a double free or a write past the end of the allocation.
    #[error("corrupted chunk: {0}")]
    Poisoned(&'static str),
}
