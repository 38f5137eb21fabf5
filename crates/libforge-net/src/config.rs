use libforge_ring::Micros;

/// What the acceptor thread does when accepting on a listener fails
/// (beyond the expected `WouldBlock`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcceptFailurePolicy {
    /// Abort the process.
    Abort,
    /// Stop the acceptor thread; already-dispatched connections are
    /// unaffected.
    #[default]
    Stop,
    /// Log nothing, drop the failed accept, and keep polling the other
    /// listeners.
    Continue,
}

/// Acceptor configuration.
#[derive(Debug, Clone, Copy)]
pub struct AcceptorConfig {
    /// How long the poll loop sleeps between readiness sweeps across all
    /// registered listeners when nothing was ready last pass.
    pub poll_period: Micros,
    pub on_accept_failure: AcceptFailurePolicy,
}

impl Default for AcceptorConfig {
    fn default() -> Self {
        Self {
            poll_period: libforge_ring::MSEC,
            on_accept_failure: AcceptFailurePolicy::default(),
        }
    }
}
