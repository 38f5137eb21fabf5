//! Periodic clock (L4): a background thread that samples monotonic time at
//! a configurable refresh period and publishes it for cheap, lock-free
//! reads by other components (the worker pool's task accounting, the log
//! router's record timestamps).
//!
//! Sampling at a period rather than calling the OS clock on every read
//! trades a small amount of staleness for removing a syscall from hot
//! paths. The clock tracks its own worst observed drift (how far a sample
//! fell behind its expected refresh period) so callers can judge whether
//! that staleness bound is actually being honored under load.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Time unit used throughout this crate: microseconds since the Unix epoch.
pub type Micros = u64;

pub const USEC: Micros = 1;
pub const MSEC: Micros = 1_000;
pub const SEC: Micros = 1_000_000;

const DEFAULT_REFRESH_PERIOD: Micros = MSEC;

/// Returns the current wall-clock time as microseconds since the epoch.
pub fn now() -> Micros {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as Micros
}

struct ClockState {
    now: AtomicU64,
    refresh_period: AtomicU64,
    max_drift: AtomicU64,
    ignore_drift: AtomicBool,
    stop: AtomicBool,
}

/// A handle to a running periodic clock thread.
///
/// Dropping the handle without calling [`PeriodicClock::stop`] or
/// [`PeriodicClock::stop_detached`] leaves the background thread running
/// forever — callers own its shutdown explicitly, matching the two stop
/// modes (blocking join vs. fire-and-forget) the clock supports.
pub struct PeriodicClock {
    state: Arc<ClockState>,
    worker: Option<JoinHandle<()>>,
}

impl PeriodicClock {
    /// Starts a new periodic clock thread. `refresh_period` of zero selects
    /// the default (1ms).
    pub fn start(refresh_period: Micros) -> Self {
        let period = if refresh_period == 0 {
            DEFAULT_REFRESH_PERIOD
        } else {
            refresh_period
        };
        let state = Arc::new(ClockState {
            now: AtomicU64::new(now()),
            refresh_period: AtomicU64::new(period),
            max_drift: AtomicU64::new(0),
            ignore_drift: AtomicBool::new(false),
            stop: AtomicBool::new(false),
        });

        let worker_state = Arc::clone(&state);
        let worker = thread::spawn(move || periodic_loop(worker_state));

        Self {
            state,
            worker: Some(worker),
        }
    }

    /// Last published timestamp.
    pub fn now(&self) -> Micros {
        self.state.now.load(Ordering::Relaxed)
    }

    pub fn refresh_period(&self) -> Micros {
        self.state.refresh_period.load(Ordering::Relaxed)
    }

    /// Changes the refresh period. The next drift computation is suppressed
    /// since the resulting gap is a deliberate reconfiguration, not skew.
    pub fn set_refresh_period(&self, period: Micros) {
        self.state.ignore_drift.store(true, Ordering::Relaxed);
        self.state.refresh_period.store(
            if period == 0 { DEFAULT_REFRESH_PERIOD } else { period },
            Ordering::Relaxed,
        );
    }

    pub fn max_drift(&self) -> Micros {
        self.state.max_drift.load(Ordering::Relaxed)
    }

    pub fn reset_max_drift(&self) {
        self.state.max_drift.store(0, Ordering::Relaxed);
    }

    /// Stops the clock and blocks until the background thread exits,
    /// returning the worst drift observed over its lifetime.
    pub fn stop(mut self) -> Micros {
        self.state.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.state.max_drift.load(Ordering::Relaxed)
    }

    /// Signals the clock to stop without waiting for it to exit. The
    /// background thread tears itself down on its next wakeup.
    pub fn stop_detached(self) {
        self.state.stop.store(true, Ordering::Relaxed);
        // The JoinHandle is dropped here; the OS thread keeps running
        // independently until it observes `stop` on its next iteration.
    }
}

fn periodic_loop(state: Arc<ClockState>) {
    while !state.stop.load(Ordering::Relaxed) {
        let period = state.refresh_period.load(Ordering::Relaxed);
        let old_now = state.now.load(Ordering::Relaxed);
        let new_now = now();

        if state.ignore_drift.swap(false, Ordering::Relaxed) {
            state.max_drift.store(1, Ordering::Relaxed);
        } else {
            let elapsed = new_now.saturating_sub(old_now);
            if elapsed > period {
                let prev = state.max_drift.load(Ordering::Relaxed);
                if elapsed > prev {
                    state.max_drift.store(elapsed, Ordering::Relaxed);
                }
            }
        }

        state.now.store(new_now, Ordering::Relaxed);
        thread::sleep(Duration::from_micros(period));
    }
}
