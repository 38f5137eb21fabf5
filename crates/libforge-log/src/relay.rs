//! Optional relay thread.
//!
//! Registering a relay turns the router's internal dispatch into a single
//! extra queued sink: producers hand a record off (bounded latency,
//! non-blocking on a healthy queue) and the relay thread, running on its
//! own stack, is the only thing that ever invokes a direct sink's callback.
//! This keeps a slow or panicking direct sink from ever stalling a
//! producer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::error::LogError;
use crate::record::LogRecord;
use crate::router::Router;
use crate::sink::{queued_sink_queues, SinkId};

/// A running relay thread. Dropping this without calling [`RelayHandle::stop`]
/// leaves the thread running; ownership of shutdown is explicit, matching
/// the rest of this crate's thread-lifecycle style.
pub struct RelayHandle {
    sink_id: SinkId,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl RelayHandle {
    pub fn sink_id(&self) -> SinkId {
        self.sink_id
    }

    /// Signals the relay thread to stop once its in-queue drains, and
    /// blocks until it exits.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}

/// Starts a relay thread registered as a queued sink with `capacity`
/// pre-allocated buffers.
pub fn start_relay(router: &Router, capacity: usize) -> Result<RelayHandle, LogError> {
    let (in_queue, out_queue) = queued_sink_queues(capacity)
        .map_err(|_| LogError::InvalidArgument("relay capacity must be non-zero"))?;
    let sink_id = router.register_queued("relay", Arc::clone(&in_queue), Arc::clone(&out_queue));
    router.set_mask(sink_id, 0)?;
    router.set_level(sink_id, u64::MAX)?;
    // From here on `emit` must not also run direct callbacks itself; the
    // relay thread below becomes their sole caller.
    router.mark_relay_active();

    let stop = Arc::new(AtomicBool::new(false));
    let thread_stop = Arc::clone(&stop);
    let thread_router = router.clone();

    let thread = thread::spawn(move || loop {
        match in_queue.dequeue() {
            Ok(buf) => {
                thread_router.dispatch_to_direct(LogRecord::from(&buf));
                out_queue.enqueue(buf);
            }
            Err(_) => {
                if thread_stop.load(Ordering::Relaxed) {
                    break;
                }
                thread::yield_now();
            }
        }
    });

    Ok(RelayHandle {
        sink_id,
        stop,
        thread: Some(thread),
    })
}
