use thiserror::Error;

/// Errors returned by the bounded ring queue (RQ).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RingError {
    /// The queue had no free slot at the time of the call.
    #[error("ring queue is at capacity")]
    CapacityExhausted,
    /// The queue was empty at the time of the call.
    #[error("ring queue is empty")]
    Drained,
    /// A construction argument was out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

/// Errors returned by the bounded pointer stack (BS).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StackError {
    /// The stack had no free slot at the time of the call.
    #[error("stack is at capacity")]
    Full,
    /// The stack was empty at the time of the call.
    #[error("stack is empty")]
    Empty,
    /// A construction argument was out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}
