//! Elastic worker pool (WP).
//!
//! A bounded backlog ([`PtrStack`]) feeds any number of worker threads.
//! Submitting a task while every worker is busy spawns a new one (up to
//! `max_threads`); workers above `min_threads` that sit idle past
//! `idle_timeout` tear themselves down. The race between "check idle, start
//! a thread" and "a thread that was about to go idle picks up the task
//! first" is accepted rather than synchronized away — a spare worker
//! spinning up and finding nothing to do is cheap, and serializing the
//! decision would turn every submit into a global bottleneck.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use libforge_log::level;
use libforge_ring::{now, Micros, PtrStack};

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::stats::{PoolStatDistributions, PoolStats, PoolStatsSnapshot};

/// Emits a pool lifecycle event through the configured logger, if any.
/// Best-effort: a full log queue never blocks or fails pool operation.
fn log_lifecycle(config: &PoolConfig, args: std::fmt::Arguments<'_>) {
    if let Some(router) = &config.logger {
        let _ = router.emit(level::INFO, 0, file!(), line!() as i32, args);
    }
}

/// A task supplied explicitly at submit time.
pub type BoxedTask = Box<dyn FnOnce() + Send>;
/// A pool-wide fallback task, invoked whenever `submit` is called with no
/// explicit task.
pub type DefaultTask = Arc<dyn Fn() + Send + Sync>;

enum TaskBody {
    Once(BoxedTask),
    Default(DefaultTask),
}

struct Task {
    body: TaskBody,
    queue_time: Micros,
}

struct Inner {
    config: PoolConfig,
    default_func: Mutex<Option<DefaultTask>>,
    queue: PtrStack<Task>,
    stats: PoolStats,
    active_thread_count: AtomicU64,
    idle_thread_count: AtomicU64,
    running_id: AtomicU64,
    drain_signal: AtomicBool,
    work_cv: Condvar,
    work_mutex: Mutex<()>,
}

/// An elastic pool of worker threads draining a bounded task backlog.
#[derive(Clone)]
pub struct WorkerPool(Arc<Inner>);

impl WorkerPool {
    /// Builds a pool and, unless `config.lazy_start` is set, spawns
    /// `min_threads` workers immediately.
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        let config = config.normalized();
        let queue = PtrStack::new(config.backlog)
            .map_err(|_| PoolError::InvalidArgument("backlog must be non-zero"))?;
        let inner = Arc::new(Inner {
            config,
            default_func: Mutex::new(None),
            queue,
            stats: PoolStats::new(),
            active_thread_count: AtomicU64::new(0),
            idle_thread_count: AtomicU64::new(0),
            running_id: AtomicU64::new(0),
            drain_signal: AtomicBool::new(false),
            work_cv: Condvar::new(),
            work_mutex: Mutex::new(()),
        });
        let pool = Self(inner);

        if !pool.0.config.lazy_start {
            for _ in 0..pool.0.config.min_threads {
                if let Err(e) = pool.start_thread() {
                    // Roll back: let whatever workers did start drain
                    // themselves out via the signal, then surface the error.
                    pool.0.drain_signal.store(true, Ordering::Release);
                    pool.0.work_cv.notify_all();
                    return Err(e);
                }
            }
        }
        Ok(pool)
    }

    /// Installs (or replaces) the pool-wide default task.
    pub fn set_default_func<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.0.default_func.lock().unwrap() = Some(Arc::new(f));
    }

    pub fn thread_count(&self) -> u64 {
        self.0.active_thread_count.load(Ordering::Relaxed)
    }

    pub fn idle_thread_count(&self) -> u64 {
        self.0.idle_thread_count.load(Ordering::Relaxed)
    }

    pub fn is_drained(&self) -> bool {
        self.0.drain_signal.load(Ordering::Acquire)
    }

    /// Submits a task. `None` asks the pool to run its default task;
    /// passing `Some` when a default is configured requires
    /// `config.func_override`.
    pub fn submit(&self, task: Option<BoxedTask>) -> Result<(), PoolError> {
        if self.is_drained() {
            return Err(PoolError::Drained);
        }
        let body = self.resolve_task_body(task)?;

        let active = self.thread_count();
        let idle = self.idle_thread_count();
        let queue_depth = self.0.queue.len() as u64;

        let task = Task {
            body,
            queue_time: now(),
        };

        if idle == 0 {
            // Best effort: a pool already at max_threads simply runs the
            // task once an existing worker frees up.
            let _ = self.start_thread();
        }

        // Only account for a task once it is actually enqueued: a full
        // backlog must leave `tasks_created` and the enqueue-time
        // distributions untouched, so a rejected submit never needs a
        // rollback — nothing was recorded for it in the first place.
        self.0
            .queue
            .push(task)
            .map_err(|_| PoolError::CapacityExhausted)?;
        self.0.stats.record_task_submitted(queue_depth, active, idle);
        if self.0.config.blocking {
            self.0.work_cv.notify_one();
        }
        Ok(())
    }

    fn resolve_task_body(&self, task: Option<BoxedTask>) -> Result<TaskBody, PoolError> {
        let default = self.0.default_func.lock().unwrap().clone();
        match (task, default) {
            (Some(f), None) => Ok(TaskBody::Once(f)),
            (Some(f), Some(_)) if self.0.config.func_override => Ok(TaskBody::Once(f)),
            (Some(_), Some(_)) => Err(PoolError::InvalidArgument(
                "pool has a default function; set func_override to submit an explicit task",
            )),
            (None, Some(d)) => Ok(TaskBody::Default(d)),
            (None, None) => Err(PoolError::InvalidArgument(
                "no task function provided and no default function configured",
            )),
        }
    }

    fn start_thread(&self) -> Result<(), PoolError> {
        if self.is_drained() {
            return Err(PoolError::Drained);
        }
        let created = self.0.stats.threads_created.fetch_add(1, Ordering::AcqRel) + 1;
        let destroyed = self.0.stats.threads_destroyed.load(Ordering::Acquire);
        let active = created - destroyed;
        if self.0.config.max_threads != 0 && active as usize >= self.0.config.max_threads + 1 {
            self.0.stats.threads_created.fetch_sub(1, Ordering::AcqRel);
            return Err(PoolError::CapacityExhausted);
        }

        let id = self.0.running_id.fetch_add(1, Ordering::AcqRel) + 1;
        self.0.active_thread_count.fetch_add(1, Ordering::AcqRel);

        let inner = Arc::clone(&self.0);
        if let Err(e) = thread::Builder::new().spawn(move || worker_loop(inner, id)) {
            self.0.stats.threads_created.fetch_sub(1, Ordering::AcqRel);
            self.0.active_thread_count.fetch_sub(1, Ordering::AcqRel);
            return Err(PoolError::ResourceUnavailable(e));
        }
        log_lifecycle(&self.0.config, format_args!("worker {id} spawned"));
        Ok(())
    }

    /// Signals shutdown and blocks until every worker has exited, then
    /// returns the pool's final statistics.
    pub fn drain(self) -> PoolStatsSnapshot {
        log_lifecycle(&self.0.config, format_args!("drain started"));
        self.0.drain_signal.store(true, Ordering::Release);
        self.0.work_cv.notify_all();
        while self.0.stats.threads_destroyed.load(Ordering::Acquire)
            < self.0.stats.threads_created.load(Ordering::Acquire)
        {
            thread::sleep(Duration::from_micros(self.0.config.poll_period.max(1)));
        }
        log_lifecycle(&self.0.config, format_args!("drain completed"));
        self.0.stats.snapshot()
    }

    pub fn snapshot(&self) -> PoolStatsSnapshot {
        self.0.stats.snapshot()
    }
}

fn should_stop(config: &PoolConfig, id: u64, now: Micros, last_work: Micros) -> bool {
    if config.idle_timeout == 0 {
        return false;
    }
    if id <= config.min_threads as u64 {
        return false;
    }
    now.saturating_sub(last_work) >= config.idle_timeout
}

fn worker_loop(inner: Arc<Inner>, id: u64) {
    let mut last_work = now();
    let mut local = PoolStatDistributions::default();
    let mut busy_streak: u64 = 0;
    let mut is_idle = false;

    loop {
        match inner.queue.pop() {
            Ok(task) => {
                if is_idle {
                    inner.idle_thread_count.fetch_sub(1, Ordering::AcqRel);
                    is_idle = false;
                }
                let delay = now().saturating_sub(task.queue_time);
                local.task_delay.update(delay);
                local
                    .active_thread_count
                    .update(inner.active_thread_count.load(Ordering::Relaxed));
                local
                    .idle_thread_count
                    .update(inner.idle_thread_count.load(Ordering::Relaxed));
                busy_streak += 1;

                match task.body {
                    TaskBody::Once(f) => f(),
                    TaskBody::Default(f) => f(),
                }
                last_work = now();
            }
            Err(_) => {
                if busy_streak > 0 {
                    local.busy_streak.update(busy_streak);
                    busy_streak = 0;
                }
                if !is_idle {
                    inner.idle_thread_count.fetch_add(1, Ordering::AcqRel);
                    is_idle = true;
                }
                if inner.drain_signal.load(Ordering::Acquire) {
                    break;
                }
                if should_stop(&inner.config, id, now(), last_work) {
                    break;
                }
                if inner.config.blocking {
                    let guard = inner.work_mutex.lock().unwrap();
                    let _ = inner
                        .work_cv
                        .wait_timeout(guard, Duration::from_micros(inner.config.poll_period.max(1)));
                } else {
                    thread::sleep(Duration::from_micros(inner.config.poll_period.max(1)));
                }
            }
        }
    }

    if busy_streak > 0 {
        local.busy_streak.update(busy_streak);
    }
    inner.stats.fold(&local);
    if is_idle {
        inner.idle_thread_count.fetch_sub(1, Ordering::AcqRel);
    }
    inner.active_thread_count.fetch_sub(1, Ordering::AcqRel);
    inner.stats.threads_destroyed.fetch_add(1, Ordering::AcqRel);
    log_lifecycle(&inner.config, format_args!("worker {id} exited"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn lifecycle_events_reach_the_configured_logger() {
        let router = libforge_log::Router::new(libforge_log::RouterConfig::default());
        let events = Arc::new(std::sync::Mutex::new(Vec::new()));
        let e = Arc::clone(&events);
        let sink_id = router.register_direct("lifecycle", move |rec| {
            e.lock().unwrap().push(rec.message.to_string());
        });
        router.set_mask(sink_id, 0).unwrap();

        let pool = WorkerPool::new(PoolConfig {
            min_threads: 1,
            logger: Some(router),
            ..Default::default()
        })
        .unwrap();
        pool.drain();

        let seen = events.lock().unwrap();
        assert!(seen.iter().any(|m| m.contains("spawned")));
        assert!(seen.iter().any(|m| m.contains("drain started")));
        assert!(seen.iter().any(|m| m.contains("exited")));
        assert!(seen.iter().any(|m| m.contains("drain completed")));
    }

    /// S4: a pool with no default function rejects a null task, accepts an
    /// explicit one, and accepts a null task again once a default is set.
    #[test]
    fn default_function_override_rules() {
        let pool = WorkerPool::new(PoolConfig {
            min_threads: 1,
            ..Default::default()
        })
        .unwrap();

        assert!(matches!(
            pool.submit(None),
            Err(PoolError::InvalidArgument(_))
        ));

        let ran = Arc::new(AtomicU32::new(0));
        let ran_clone = Arc::clone(&ran);
        pool.submit(Some(Box::new(move || {
            ran_clone.fetch_add(1, Ordering::Relaxed);
        })))
        .unwrap();

        let default_ran = Arc::new(AtomicU32::new(0));
        let default_clone = Arc::clone(&default_ran);
        pool.set_default_func(move || {
            default_clone.fetch_add(1, Ordering::Relaxed);
        });
        pool.submit(None).unwrap();

        let stats = pool.drain();
        assert_eq!(stats.tasks_created, 2);
        assert_eq!(ran.load(Ordering::Relaxed), 1);
        assert_eq!(default_ran.load(Ordering::Relaxed), 1);
    }

    /// S5: a fixed-size pool processes every submitted task exactly once,
    /// and the busy-streak distribution accounts for all of them.
    #[test]
    fn fixed_size_pool_processes_full_backlog() {
        let pool = WorkerPool::new(PoolConfig {
            min_threads: 4,
            max_threads: 4,
            backlog: 8192,
            ..Default::default()
        })
        .unwrap();

        let processed = Arc::new(AtomicU64::new(0));
        for _ in 0..8192 {
            let processed = Arc::clone(&processed);
            loop {
                match pool.submit(Some(Box::new({
                    let processed = Arc::clone(&processed);
                    move || {
                        processed.fetch_add(1, Ordering::Relaxed);
                    }
                }))) {
                    Ok(()) => break,
                    Err(PoolError::CapacityExhausted) => thread::yield_now(),
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
        }

        while processed.load(Ordering::Relaxed) < 8192 {
            thread::yield_now();
        }

        let stats = pool.drain();
        assert_eq!(stats.tasks_created, 8192);
        assert_eq!(stats.distributions.busy_streak.sum, 8192);
        assert!(stats.threads_created >= 4);
    }

    /// WP autoscaling bound: flooding a pool with more concurrent work than
    /// `max_threads` allows never grows `thread_count()` past the cap.
    #[test]
    fn active_threads_never_exceed_max_threads() {
        let pool = WorkerPool::new(PoolConfig {
            min_threads: 1,
            max_threads: 3,
            backlog: 4096,
            ..Default::default()
        })
        .unwrap();

        let release = Arc::new(AtomicBool::new(false));
        let in_flight = Arc::new(AtomicU64::new(0));
        let peak = Arc::new(AtomicU64::new(0));
        for _ in 0..64 {
            let release = Arc::clone(&release);
            let in_flight = Arc::clone(&in_flight);
            pool.submit(Some(Box::new(move || {
                in_flight.fetch_add(1, Ordering::AcqRel);
                while !release.load(Ordering::Acquire) {
                    thread::yield_now();
                }
                in_flight.fetch_sub(1, Ordering::AcqRel);
            })))
            .unwrap();
            peak.fetch_max(pool.thread_count(), Ordering::Relaxed);
            assert!(pool.thread_count() <= 3);
        }
        release.store(true, Ordering::Release);
        let stats = pool.drain();
        assert_eq!(stats.tasks_created, 64);
    }

    /// WP idle teardown: workers spun up above `min_threads` to absorb a
    /// burst tear themselves back down to `min_threads` once `idle_timeout`
    /// has elapsed with no further work.
    #[test]
    fn idle_workers_above_min_threads_tear_down() {
        let pool = WorkerPool::new(PoolConfig {
            min_threads: 1,
            max_threads: 4,
            backlog: 4096,
            idle_timeout: 2 * libforge_ring::MSEC,
            poll_period: libforge_ring::MSEC,
            ..Default::default()
        })
        .unwrap();

        let barrier_count = 4usize;
        let release = Arc::new(AtomicBool::new(false));
        for _ in 0..barrier_count {
            let release = Arc::clone(&release);
            pool.submit(Some(Box::new(move || {
                while !release.load(Ordering::Acquire) {
                    thread::yield_now();
                }
            })))
            .unwrap();
        }
        release.store(true, Ordering::Release);

        let deadline = Duration::from_secs(2);
        let start = std::time::Instant::now();
        while pool.thread_count() > 1 && start.elapsed() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(pool.thread_count(), 1);
        pool.drain();
    }
}
