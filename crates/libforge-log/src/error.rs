use thiserror::Error;

/// Errors surfaced by the log router.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LogError {
    /// A queued sink's out-queue was empty, or its in-queue was full, and
    /// the configured error policy was `ReturnError`.
    #[error("queued sink backpressure")]
    QueueBackpressure,
    /// A construction argument was invalid (e.g. a zero-capacity queue).
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// Looked up a sink id that is not currently registered.
    #[error("sink not found")]
    NotFound,
}
