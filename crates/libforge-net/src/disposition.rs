use std::net::TcpStream;
use std::sync::Arc;
use std::thread;

use libforge_pool::WorkerPool;
use libforge_ring::RingQueue;

use crate::error::AcceptorError;

/// What to do with a freshly accepted connection.
pub enum Disposition {
    /// Push the connection into a caller-supplied ring queue; some other
    /// part of the application drains it.
    Queued(Arc<RingQueue<TcpStream>>),
    /// Spawn a detached thread per connection running `callback`.
    Threaded(Arc<dyn Fn(TcpStream) + Send + Sync>),
    /// Submit the connection to a worker pool, to be handled by
    /// `callback` on whichever worker picks it up.
    Pooled(WorkerPool, Arc<dyn Fn(TcpStream) + Send + Sync>),
}

impl Disposition {
    pub(crate) fn dispatch(&self, stream: TcpStream) -> Result<(), AcceptorError> {
        match self {
            Disposition::Queued(queue) => {
                queue
                    .try_enqueue(stream)
                    .map_err(|_| AcceptorError::DispatchFailed("ring queue at capacity"))?;
            }
            Disposition::Threaded(callback) => {
                let callback = Arc::clone(callback);
                thread::Builder::new()
                    .spawn(move || callback(stream))
                    .map_err(AcceptorError::ResourceUnavailable)?;
            }
            Disposition::Pooled(pool, callback) => {
                let callback = Arc::clone(callback);
                pool.submit(Some(Box::new(move || callback(stream))))
                    .map_err(|_| AcceptorError::DispatchFailed("worker pool backlog at capacity or drained"))?;
            }
        }
        Ok(())
    }
}
