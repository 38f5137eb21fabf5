//! Property-based coverage of the worker pool's core contract: a task that
//! `submit` accepts always runs exactly once before `drain` returns.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use proptest::prelude::*;

use libforge_pool::{PoolConfig, WorkerPool};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// INV-WP-01: every task accepted by `submit` runs exactly once by the
    /// time `drain` returns, regardless of how many worker threads or how
    /// many tasks were submitted.
    #[test]
    fn prop_every_accepted_task_runs_exactly_once(
        min_threads in 1usize..5,
        task_count in 1u64..200,
    ) {
        let pool = WorkerPool::new(PoolConfig {
            min_threads,
            backlog: 4096,
            ..Default::default()
        })
        .unwrap();

        let counts: Arc<Vec<AtomicU64>> =
            Arc::new((0..task_count).map(|_| AtomicU64::new(0)).collect());

        for i in 0..task_count {
            let counts = Arc::clone(&counts);
            pool.submit(Some(Box::new(move || {
                counts[i as usize].fetch_add(1, Ordering::Relaxed);
            })))
            .unwrap();
        }

        let stats = pool.drain();
        prop_assert_eq!(stats.tasks_created, task_count);
        for c in counts.iter() {
            prop_assert_eq!(c.load(Ordering::Relaxed), 1);
        }
    }
}
