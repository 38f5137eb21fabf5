use thiserror::Error;

/// Errors surfaced by the acceptor.
#[derive(Debug, Error)]
pub enum AcceptorError {
    /// Binding or registering a listener failed.
    #[error("failed to bind listener: {0}")]
    ResourceUnavailable(#[from] std::io::Error),
    /// A construction argument was invalid.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// The acceptor's disposition queue rejected the connection (ring
    /// full, or the worker pool was drained).
    #[error("dispatch failed: {0}")]
    DispatchFailed(&'static str),
}
