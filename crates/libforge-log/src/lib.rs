//! Structured log routing fabric (LG): fan-out of log records to direct
//! (synchronous callback) and queued (buffer handoff) sinks, with an
//! optional relay thread that keeps direct callbacks off producer threads.

mod error;
mod level;
mod record;
mod relay;
mod router;
mod sink;

pub use error::LogError;
pub use level::level;
pub use record::{binary_dump, hex_dump, LogRecord, RecordBuffer, MAX_MESSAGE_LEN};
pub use relay::{start_relay, RelayHandle};
pub use router::{EmitOutcome, ErrorPolicy, Router, RouterConfig};
pub use sink::{queued_sink_queues, DirectSink, QueuedSink, SinkId};

/// Emits a record at the given level/mask through `router`, capturing the
/// call site automatically.
#[macro_export]
macro_rules! forge_log {
    ($router:expr, $level:expr, $mask:expr, $($arg:tt)*) => {
        $router.emit($level, $mask, file!(), line!() as i32, format_args!($($arg)*))
    };
}
