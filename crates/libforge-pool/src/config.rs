use libforge_ring::Micros;

/// Worker pool configuration.
///
/// Defaults: a 5ms poll period for blocking-mode workers, a backlog of 15
/// tasks, and a single minimum worker thread.
#[derive(Clone)]
pub struct PoolConfig {
    /// Wait for a condvar wakeup between empty-queue polls instead of
    /// spin-polling. Off by default, matching the polling worker loop.
    pub blocking: bool,
    /// Defer spawning `min_threads` workers until the first task submits.
    pub lazy_start: bool,
    /// Allow `submit` to pass an explicit task function even when a default
    /// function is configured. Without this, a default-function pool only
    /// accepts `None` tasks.
    pub func_override: bool,
    /// How often an idle worker re-checks for work / teardown eligibility.
    pub poll_period: Micros,
    /// How long a worker above `min_threads` may sit idle before exiting.
    /// Zero disables idle teardown entirely.
    pub idle_timeout: Micros,
    /// Hard cap on live worker threads. Zero means unbounded.
    pub max_threads: usize,
    /// Worker threads that are never torn down by the idle timer.
    pub min_threads: usize,
    /// Backlog capacity of the task queue.
    pub backlog: usize,
    /// Emits pool lifecycle events (thread spawned/exited, drain
    /// started/completed) through this router's direct sinks when set.
    /// Purely observational: absence never changes scheduling behavior.
    pub logger: Option<libforge_log::Router>,
}

impl std::fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolConfig")
            .field("blocking", &self.blocking)
            .field("lazy_start", &self.lazy_start)
            .field("func_override", &self.func_override)
            .field("poll_period", &self.poll_period)
            .field("idle_timeout", &self.idle_timeout)
            .field("max_threads", &self.max_threads)
            .field("min_threads", &self.min_threads)
            .field("backlog", &self.backlog)
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            blocking: false,
            lazy_start: false,
            func_override: false,
            poll_period: 5 * libforge_ring::MSEC,
            idle_timeout: 0,
            max_threads: 0,
            min_threads: 1,
            backlog: 15,
            logger: None,
        }
    }
}

impl PoolConfig {
    /// Clamps `max_threads` so it's never below `min_threads` (zero stays
    /// unbounded).
    pub(crate) fn normalized(mut self) -> Self {
        if self.max_threads != 0 && self.max_threads < self.min_threads {
            self.max_threads = self.min_threads;
        }
        if self.min_threads == 0 {
            self.min_threads = 1;
        }
        if self.backlog == 0 {
            self.backlog = 15;
        }
        if self.poll_period == 0 {
            self.poll_period = 5 * libforge_ring::MSEC;
        }
        self
    }
}
