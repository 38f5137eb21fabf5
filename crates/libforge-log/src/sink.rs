use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use libforge_ring::RingQueue;

use crate::record::{LogRecord, RecordBuffer};

/// Identifies a registered sink for later `set_level`/`set_mask`/`unregister`
/// calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkId(pub(crate) u64);

pub(crate) fn passes(sink_level: u64, sink_mask: u64, record_level: u64, record_mask: u64) -> bool {
    let level_ok = sink_level >= record_level;
    let mask_ok = sink_mask == 0 || record_mask == 0 || (sink_mask & record_mask) != 0;
    level_ok && mask_ok
}

/// A synchronous sink: the router invokes its callback in the emitting
/// thread's context.
pub struct DirectSink {
    pub(crate) id: SinkId,
    pub(crate) name: String,
    pub(crate) level: AtomicU64,
    pub(crate) mask: AtomicU64,
    pub(crate) callback: Arc<dyn Fn(LogRecord<'_>) + Send + Sync>,
}

impl DirectSink {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn passes(&self, record_level: u64, record_mask: u64) -> bool {
        passes(
            self.level.load(Ordering::Relaxed),
            self.mask.load(Ordering::Relaxed),
            record_level,
            record_mask,
        )
    }
}

/// An asynchronous sink: records are handed off by buffer through an
/// in-queue/out-queue pair that the sink itself owns.
pub struct QueuedSink {
    pub(crate) id: SinkId,
    pub(crate) name: String,
    pub(crate) level: AtomicU64,
    pub(crate) mask: AtomicU64,
    pub(crate) in_queue: Arc<RingQueue<RecordBuffer>>,
    pub(crate) out_queue: Arc<RingQueue<RecordBuffer>>,
}

impl QueuedSink {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn in_queue(&self) -> &Arc<RingQueue<RecordBuffer>> {
        &self.in_queue
    }

    pub fn out_queue(&self) -> &Arc<RingQueue<RecordBuffer>> {
        &self.out_queue
    }

    pub(crate) fn passes(&self, record_level: u64, record_mask: u64) -> bool {
        passes(
            self.level.load(Ordering::Relaxed),
            self.mask.load(Ordering::Relaxed),
            record_level,
            record_mask,
        )
    }
}

/// Pre-allocates a queued sink's buffer pool: `capacity` empty
/// [`RecordBuffer`]s sit in the out-queue, ready for the router to draw
/// from, and an equally-sized in-queue stands ready to receive filled ones.
pub fn queued_sink_queues(
    capacity: usize,
) -> Result<(Arc<RingQueue<RecordBuffer>>, Arc<RingQueue<RecordBuffer>>), libforge_ring::RingError> {
    let in_queue = Arc::new(RingQueue::new(capacity)?);
    let out_queue = Arc::new(RingQueue::new(capacity)?);
    for _ in 0..capacity {
        out_queue.enqueue(RecordBuffer::default());
    }
    Ok((in_queue, out_queue))
}
