//! Cross-crate scenarios exercising the workspace the way a server built on
//! top of it actually would: connections accepted off the wire land on the
//! worker pool, whose lifecycle is observed through the log router, with a
//! relay thread keeping direct sinks off the hot path.

use libforge_log::{level, Router, RouterConfig};
use libforge_net::{AcceptFailurePolicy, Acceptor, AcceptorConfig, Disposition};
use libforge_pool::{PoolConfig, WorkerPool};
use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

fn wait_until(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        std::thread::yield_now();
    }
    cond()
}

/// Connections accepted off a listener are submitted to a worker pool,
/// whose threads process them concurrently.
#[test]
fn acceptor_feeds_connections_into_worker_pool() {
    let pool = WorkerPool::new(PoolConfig {
        min_threads: 2,
        max_threads: 4,
        backlog: 64,
        ..Default::default()
    })
    .unwrap();

    let processed = Arc::new(AtomicUsize::new(0));
    let p = Arc::clone(&processed);
    let acceptor = Acceptor::start(
        AcceptorConfig {
            poll_period: 200,
            on_accept_failure: AcceptFailurePolicy::Continue,
        },
        Disposition::Pooled(
            pool.clone(),
            Arc::new(move |_stream| {
                p.fetch_add(1, Ordering::Relaxed);
            }),
        ),
    );

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    acceptor.add_socket(listener).unwrap();

    for _ in 0..10 {
        let mut stream = TcpStream::connect(addr).unwrap();
        let _ = stream.write_all(b"ping");
    }

    assert!(wait_until(
        || processed.load(Ordering::Relaxed) >= 10,
        Duration::from_secs(5)
    ));

    acceptor.stop();
    pool.drain();
}

/// A worker pool's lifecycle events reach the log router's direct sinks
/// through a relay thread, never blocking the worker threads themselves.
#[test]
fn pool_lifecycle_flows_through_router_relay() {
    let router = Router::new(RouterConfig::default());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    let sink_id = router.register_direct("observer", move |rec| {
        s.lock().unwrap().push(rec.message.to_string());
    });
    router.set_mask(sink_id, 0).unwrap();

    let relay = libforge_log::start_relay(&router, 256).unwrap();

    let pool = WorkerPool::new(PoolConfig {
        min_threads: 3,
        logger: Some(router.clone()),
        ..Default::default()
    })
    .unwrap();

    let done = Arc::new(AtomicUsize::new(0));
    for _ in 0..50 {
        let d = Arc::clone(&done);
        pool.submit(Some(Box::new(move || {
            d.fetch_add(1, Ordering::Relaxed);
        })))
        .unwrap();
    }
    assert!(wait_until(
        || done.load(Ordering::Relaxed) >= 50,
        Duration::from_secs(5)
    ));

    pool.drain();

    assert!(wait_until(
        || {
            let log = seen.lock().unwrap();
            log.iter().any(|m| m.contains("spawned"))
                && log.iter().any(|m| m.contains("drain completed"))
        },
        Duration::from_secs(5)
    ));

    relay.stop();
}

/// Direct emission at a level below a sink's threshold never reaches it,
/// while a queued sink registered at a lower threshold still sees it.
#[test]
fn router_filters_independently_per_sink() {
    let router = Router::new(RouterConfig::default());

    let verbose_hits = Arc::new(AtomicUsize::new(0));
    let v = Arc::clone(&verbose_hits);
    let verbose_id = router.register_direct("verbose", move |_rec| {
        v.fetch_add(1, Ordering::Relaxed);
    });
    router.set_level(verbose_id, level::DEBUG).unwrap();
    router.set_mask(verbose_id, 0).unwrap();

    let quiet_hits = Arc::new(AtomicUsize::new(0));
    let q = Arc::clone(&quiet_hits);
    let quiet_id = router.register_direct("quiet", move |_rec| {
        q.fetch_add(1, Ordering::Relaxed);
    });
    router.set_level(quiet_id, level::ERROR).unwrap();
    router.set_mask(quiet_id, 0).unwrap();

    router
        .emit(level::DEBUG, 0, file!(), line!() as i32, format_args!("debug detail"))
        .unwrap();

    assert_eq!(verbose_hits.load(Ordering::Relaxed), 1);
    assert_eq!(quiet_hits.load(Ordering::Relaxed), 0);
}
