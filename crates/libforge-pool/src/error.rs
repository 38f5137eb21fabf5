use thiserror::Error;

/// Errors returned by the worker pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// `submit` was called after `drain`/`shutdown` was initiated.
    #[error("worker pool has been drained")]
    Drained,
    /// Bad combination of task function / default function / override flag.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// The backlog stack was full.
    #[error("worker pool backlog is at capacity")]
    CapacityExhausted,
    /// A new worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    ResourceUnavailable(#[from] std::io::Error),
}
