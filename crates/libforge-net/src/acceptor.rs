//! Readiness-driven TCP acceptor (AC).
//!
//! A single background thread round-robins across every registered
//! listener in non-blocking mode, dispatching each accepted connection per
//! the configured [`Disposition`]. This trades a platform-specific
//! epoll/kqueue binding for a short poll sleep when every listener is
//! momentarily idle, keeping the readiness loop portable across targets.

use std::io;
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::{AcceptFailurePolicy, AcceptorConfig};
use crate::disposition::Disposition;
use crate::error::AcceptorError;

/// A running acceptor thread dispatching to a single [`Disposition`].
pub struct Acceptor {
    listeners: Arc<Mutex<Vec<TcpListener>>>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Acceptor {
    /// Starts the background acceptor thread with no listeners registered
    /// yet; add sockets with [`Acceptor::add_socket`].
    pub fn start(config: AcceptorConfig, disposition: Disposition) -> Self {
        let listeners = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(false));

        let thread_listeners = Arc::clone(&listeners);
        let thread_stop = Arc::clone(&stop);
        let thread = thread::spawn(move || poll_loop(thread_listeners, thread_stop, config, disposition));

        Self {
            listeners,
            stop,
            thread: Some(thread),
        }
    }

    /// Registers an additional listening socket, switched to non-blocking
    /// mode so the poll loop never stalls on it.
    pub fn add_socket(&self, listener: TcpListener) -> Result<(), AcceptorError> {
        listener.set_nonblocking(true)?;
        self.listeners.lock().unwrap().push(listener);
        Ok(())
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    /// Signals the acceptor thread to stop and blocks until it exits.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}

impl Drop for Acceptor {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}

fn poll_loop(
    listeners: Arc<Mutex<Vec<TcpListener>>>,
    stop: Arc<AtomicBool>,
    config: AcceptorConfig,
    disposition: Disposition,
) {
    while !stop.load(Ordering::Relaxed) {
        let mut any_ready = false;
        let count = listeners.lock().unwrap().len();
        for idx in 0..count {
            let accepted = {
                let guard = listeners.lock().unwrap();
                guard.get(idx).map(TcpListener::accept)
            };
            match accepted {
                Some(Ok((stream, _remote_addr))) => {
                    any_ready = true;
                    let _ = disposition.dispatch(stream);
                }
                Some(Err(e)) if e.kind() == io::ErrorKind::WouldBlock => {}
                Some(Err(_)) => match config.on_accept_failure {
                    AcceptFailurePolicy::Abort => std::process::abort(),
                    AcceptFailurePolicy::Stop => return,
                    AcceptFailurePolicy::Continue => {}
                },
                None => {}
            }
        }
        if !any_ready {
            thread::sleep(Duration::from_micros(config.poll_period.max(1)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libforge_ring::RingQueue;
    use std::io::Write;
    use std::net::TcpStream;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    #[test]
    fn queued_disposition_delivers_connections() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        listener.set_nonblocking(true).unwrap();

        let queue = Arc::new(RingQueue::<TcpStream>::new(8).unwrap());
        let acceptor = Acceptor::start(
            AcceptorConfig {
                poll_period: 200,
                ..Default::default()
            },
            Disposition::Queued(Arc::clone(&queue)),
        );
        acceptor.add_socket(listener).unwrap();

        for _ in 0..3 {
            let mut stream = TcpStream::connect(addr).unwrap();
            let _ = stream.write_all(b"hi");
        }

        let start = Instant::now();
        let mut received = 0;
        while received < 3 && start.elapsed() < Duration::from_secs(5) {
            if queue.dequeue().is_ok() {
                received += 1;
            } else {
                thread::yield_now();
            }
        }
        assert_eq!(received, 3);
        acceptor.stop();
    }

    #[test]
    fn threaded_disposition_invokes_callback_per_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        listener.set_nonblocking(true).unwrap();

        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let acceptor = Acceptor::start(
            AcceptorConfig {
                poll_period: 200,
                ..Default::default()
            },
            Disposition::Threaded(Arc::new(move |_stream| {
                c.fetch_add(1, Ordering::Relaxed);
            })),
        );
        acceptor.add_socket(listener).unwrap();

        let _s1 = TcpStream::connect(addr).unwrap();
        let _s2 = TcpStream::connect(addr).unwrap();

        let start = Instant::now();
        while count.load(Ordering::Relaxed) < 2 && start.elapsed() < Duration::from_secs(5) {
            thread::yield_now();
        }
        assert_eq!(count.load(Ordering::Relaxed), 2);
        acceptor.stop();
    }

    #[test]
    fn pooled_disposition_submits_to_worker_pool() {
        use libforge_pool::{PoolConfig, WorkerPool};

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        listener.set_nonblocking(true).unwrap();

        let pool = WorkerPool::new(PoolConfig {
            min_threads: 2,
            ..Default::default()
        })
        .unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);

        let acceptor = Acceptor::start(
            AcceptorConfig {
                poll_period: 200,
                ..Default::default()
            },
            Disposition::Pooled(pool.clone(), Arc::new(move |_stream| {
                c.fetch_add(1, Ordering::Relaxed);
            })),
        );
        acceptor.add_socket(listener).unwrap();

        let _s1 = TcpStream::connect(addr).unwrap();

        let start = Instant::now();
        while count.load(Ordering::Relaxed) < 1 && start.elapsed() < Duration::from_secs(5) {
            thread::yield_now();
        }
        assert_eq!(count.load(Ordering::Relaxed), 1);
        acceptor.stop();
        pool.drain();
    }
}
