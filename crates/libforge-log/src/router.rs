//! Log routing fabric (LG).
//!
//! `emit` formats a record at most once — only after confirming at least one
//! registered sink's level/mask filter would actually accept it — then fans
//! the formatted record out to every passing direct sink (synchronously, in
//! the caller's thread) and every passing queued sink (by buffer handoff).
//!
//! Once a relay thread is installed, direct sinks are reached only through
//! it: `emit` stops invoking them itself, so a producer that only has direct
//! sinks registered alongside a relay never runs a direct callback on its
//! own thread.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use libforge_ring::now;

use crate::error::LogError;
use crate::record::{format_bounded, LogRecord, RecordBuffer};
use crate::sink::{DirectSink, QueuedSink, SinkId};

/// What to do when a queued sink's buffer pool is exhausted (out-queue
/// empty) or its in-queue is momentarily full.
///
/// Modeled as an enum rather than two "mutually exclusive" flags: the type
/// itself rules out the invalid combination instead of relying on a runtime
/// check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Surface [`LogError::QueueBackpressure`] immediately.
    #[default]
    ReturnError,
    /// Spin with backoff until the operation succeeds.
    SpinRetry,
    /// Abort the process. Present for parity with the stricter deployments
    /// this router is modeled on; callers opt in explicitly.
    Abort,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RouterConfig {
    pub error_policy: ErrorPolicy,
}

/// Outcome of a single `emit` call.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmitOutcome {
    pub direct_delivered: usize,
    pub queued_delivered: usize,
    /// True when no registered sink's filter would have accepted the
    /// record, so nothing was formatted or delivered. Not an error.
    pub filtered: bool,
}

struct Registries {
    direct: RwLock<Vec<DirectSink>>,
    queued: RwLock<Vec<QueuedSink>>,
}

/// The log router. Cheap to clone (an `Arc` internally); every clone shares
/// the same sink registries.
#[derive(Clone)]
pub struct Router {
    registries: Arc<Registries>,
    next_id: Arc<AtomicU64>,
    relay_active: Arc<AtomicBool>,
    config: RouterConfig,
}

impl Router {
    pub fn new(config: RouterConfig) -> Self {
        Self {
            registries: Arc::new(Registries {
                direct: RwLock::new(Vec::new()),
                queued: RwLock::new(Vec::new()),
            }),
            next_id: Arc::new(AtomicU64::new(1)),
            relay_active: Arc::new(AtomicBool::new(false)),
            config,
        }
    }

    /// Marks that a relay thread now owns direct-sink dispatch. Called once
    /// by [`crate::relay::start_relay`]; from this point on `emit` hands
    /// every record that reaches a direct sink to the relay's queued sink
    /// instead of invoking the callback itself.
    pub(crate) fn mark_relay_active(&self) {
        self.relay_active.store(true, Ordering::Relaxed);
    }

    fn alloc_id(&self) -> SinkId {
        SinkId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn register_direct<F>(&self, name: impl Into<String>, callback: F) -> SinkId
    where
        F: Fn(LogRecord<'_>) + Send + Sync + 'static,
    {
        let id = self.alloc_id();
        let sink = DirectSink {
            id,
            name: name.into(),
            level: AtomicU64::new(u64::MAX),
            mask: AtomicU64::new(0),
            callback: Arc::new(callback),
        };
        self.registries.direct.write().unwrap().push(sink);
        id
    }

    pub fn register_queued(
        &self,
        name: impl Into<String>,
        in_queue: Arc<libforge_ring::RingQueue<RecordBuffer>>,
        out_queue: Arc<libforge_ring::RingQueue<RecordBuffer>>,
    ) -> SinkId {
        let id = self.alloc_id();
        let sink = QueuedSink {
            id,
            name: name.into(),
            level: AtomicU64::new(u64::MAX),
            mask: AtomicU64::new(0),
            in_queue,
            out_queue,
        };
        self.registries.queued.write().unwrap().push(sink);
        id
    }

    pub fn set_level(&self, id: SinkId, level: u64) -> Result<(), LogError> {
        self.with_sink_atomics(id, |l, _| l.store(level, Ordering::Relaxed))
    }

    pub fn set_mask(&self, id: SinkId, mask: u64) -> Result<(), LogError> {
        self.with_sink_atomics(id, |_, m| m.store(mask, Ordering::Relaxed))
    }

    fn with_sink_atomics(
        &self,
        id: SinkId,
        f: impl Fn(&AtomicU64, &AtomicU64),
    ) -> Result<(), LogError> {
        let direct = self.registries.direct.read().unwrap();
        if let Some(s) = direct.iter().find(|s| s.id == id) {
            f(&s.level, &s.mask);
            return Ok(());
        }
        drop(direct);
        let queued = self.registries.queued.read().unwrap();
        if let Some(s) = queued.iter().find(|s| s.id == id) {
            f(&s.level, &s.mask);
            return Ok(());
        }
        Err(LogError::NotFound)
    }

    pub fn unregister(&self, id: SinkId) -> Result<(), LogError> {
        let mut direct = self.registries.direct.write().unwrap();
        let before = direct.len();
        direct.retain(|s| s.id != id);
        if direct.len() != before {
            return Ok(());
        }
        drop(direct);
        let mut queued = self.registries.queued.write().unwrap();
        let before = queued.len();
        queued.retain(|s| s.id != id);
        if queued.len() != before {
            return Ok(());
        }
        Err(LogError::NotFound)
    }

    /// Emits one record. Formats the message at most once, and only once a
    /// sink's filters confirm it would actually be delivered somewhere.
    pub fn emit(
        &self,
        level: u64,
        mask: u64,
        file: &'static str,
        line: i32,
        args: std::fmt::Arguments<'_>,
    ) -> Result<EmitOutcome, LogError> {
        let direct = self.registries.direct.read().unwrap();
        let queued = self.registries.queued.read().unwrap();

        // Once a relay owns direct dispatch, `emit` never touches direct
        // sinks itself — the relay's queued sink (which always passes)
        // carries the record there instead.
        let relay_active = self.relay_active.load(Ordering::Relaxed);
        let any_direct = !relay_active && direct.iter().any(|s| s.passes(level, mask));
        let any_queued = queued.iter().any(|s| s.passes(level, mask));
        if !any_direct && !any_queued {
            return Ok(EmitOutcome {
                filtered: true,
                ..Default::default()
            });
        }

        let message = format_bounded(args);
        let timestamp = now();

        let mut direct_delivered = 0;
        if any_direct {
            for sink in direct.iter().filter(|s| s.passes(level, mask)) {
                let record = LogRecord {
                    timestamp,
                    level,
                    mask,
                    file,
                    line,
                    message: &message,
                };
                (sink.callback)(record);
                direct_delivered += 1;
            }
        }

        let mut queued_delivered = 0;
        for sink in queued.iter().filter(|s| s.passes(level, mask)) {
            self.deliver_to_queued(sink, timestamp, level, mask, file, line, &message)?;
            queued_delivered += 1;
        }

        Ok(EmitOutcome {
            direct_delivered,
            queued_delivered,
            filtered: false,
        })
    }

    /// Invokes every registered direct sink whose filter accepts `record`.
    /// Used by the relay thread so producers that only ever touch queued
    /// sinks still reach direct sinks, off the producer's own thread.
    pub(crate) fn dispatch_to_direct(&self, record: LogRecord<'_>) {
        let direct = self.registries.direct.read().unwrap();
        for sink in direct.iter().filter(|s| s.passes(record.level, record.mask)) {
            (sink.callback)(record);
        }
    }

    fn deliver_to_queued(
        &self,
        sink: &QueuedSink,
        timestamp: libforge_ring::Micros,
        level: u64,
        mask: u64,
        file: &'static str,
        line: i32,
        message: &str,
    ) -> Result<(), LogError> {
        let mut backoff = libforge_ring::Backoff::new();
        let mut buffer = loop {
            match sink.out_queue.dequeue() {
                Ok(buf) => break buf,
                Err(_) => match self.config.error_policy {
                    ErrorPolicy::ReturnError => return Err(LogError::QueueBackpressure),
                    ErrorPolicy::SpinRetry => {
                        backoff.snooze();
                        continue;
                    }
                    ErrorPolicy::Abort => std::process::abort(),
                },
            }
        };

        buffer.fill(timestamp, level, mask, file, line, message);

        let mut backoff = libforge_ring::Backoff::new();
        loop {
            match sink.in_queue.try_enqueue(buffer.clone()) {
                Ok(()) => return Ok(()),
                Err(_) => match self.config.error_policy {
                    ErrorPolicy::ReturnError => {
                        // The buffer was drawn from the out-queue; give it
                        // back rather than drop it, preserving the
                        // invariant that every out-queue buffer is either
                        // in circulation or back in the out-queue.
                        sink.out_queue.enqueue(buffer);
                        return Err(LogError::QueueBackpressure);
                    }
                    ErrorPolicy::SpinRetry => {
                        backoff.snooze();
                        // in-queue and out-queue share a capacity, so the
                        // in-queue cannot fill faster than the out-queue
                        // empties; this loop is a bounded-in-practice retry.
                        continue;
                    }
                    ErrorPolicy::Abort => std::process::abort(),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::queued_sink_queues;
    use std::sync::atomic::AtomicUsize;

    /// S6: a direct sink at DEBUG level with a broadcast mask receives
    /// exactly the records at or below its threshold.
    #[test]
    fn direct_sink_level_filtering() {
        let router = Router::new(RouterConfig::default());
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let id = router.register_direct("counter", move |_rec| {
            c.fetch_add(1, Ordering::Relaxed);
        });
        router.set_level(id, crate::level::level::DEBUG).unwrap();
        router.set_mask(id, 0).unwrap();

        for lvl in 0..100u64 {
            router
                .emit(lvl, 0, file!(), line!() as i32, format_args!("record {lvl}"))
                .unwrap();
        }

        assert_eq!(count.load(Ordering::Relaxed), 11);
    }

    /// S7: with a direct sink and a queued sink both passing, every emitted
    /// record reaches both, and every queued buffer returns to the
    /// out-queue once its consumer is done with it.
    #[test]
    fn queued_and_direct_sinks_both_see_every_record() {
        let router = Router::new(RouterConfig {
            error_policy: ErrorPolicy::SpinRetry,
        });

        let direct_count = Arc::new(AtomicUsize::new(0));
        let dc = Arc::clone(&direct_count);
        let direct_id = router.register_direct("counter", move |_rec| {
            dc.fetch_add(1, Ordering::Relaxed);
        });
        router.set_mask(direct_id, 0).unwrap();

        let (in_q, out_q) = queued_sink_queues(2048).unwrap();
        let queued_id = router.register_queued("relay-ish", Arc::clone(&in_q), Arc::clone(&out_q));
        router.set_mask(queued_id, 0).unwrap();

        const TOTAL: usize = 100_000;
        let consumer_in = Arc::clone(&in_q);
        let consumer_out = Arc::clone(&out_q);
        let consumer = std::thread::spawn(move || {
            let mut drained = 0usize;
            while drained < TOTAL {
                if let Ok(buf) = consumer_in.dequeue() {
                    consumer_out.enqueue(buf);
                    drained += 1;
                } else {
                    std::thread::yield_now();
                }
            }
            drained
        });

        for i in 0..TOTAL {
            router
                .emit(
                    crate::level::level::INFO,
                    0,
                    file!(),
                    line!() as i32,
                    format_args!("record {i}"),
                )
                .unwrap();
        }

        let drained = consumer.join().unwrap();
        assert_eq!(drained, TOTAL);
        assert_eq!(direct_count.load(Ordering::Relaxed), TOTAL);
        assert_eq!(out_q.len(), 2048);
    }

    #[test]
    fn filtered_record_is_not_an_error() {
        let router = Router::new(RouterConfig::default());
        let id = router.register_direct("quiet", |_| panic!("should not be called"));
        router.set_level(id, crate::level::level::ERROR).unwrap();
        let outcome = router
            .emit(crate::level::level::DEBUG, 0, file!(), line!() as i32, format_args!("x"))
            .unwrap();
        assert!(outcome.filtered);
    }
}
