//! Gauges for worker pools, labelled by pool name.

use super::{Collector, describe_all};
use crate::events::{MetricKind, MetricMetadata};
use hashbrown::HashMap;
use parking_lot::RwLock;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

pub const ACTIVE_THREADS: &str = "threadpool_active_threads_current";
pub const QUEUE_SIZE: &str = "threadpool_queue_size_current";
pub const COMPLETED_TASKS: &str = "threadpool_completed_tasks_total";

/// Read access to the state of a worker pool.
pub trait PoolStats: Send + Sync {
    /// Workers currently running a task.
    fn active_threads(&self) -> u64;

    /// Tasks waiting for a worker, including scheduled ones.
    fn queue_size(&self) -> u64;

    /// Tasks finished since the pool was created. Never decreases.
    fn completed_tasks(&self) -> u64;
}

/// [`PoolStats`] kept by the pool itself through a few atomic counters.
#[derive(Debug, Default)]
pub struct PoolCounters {
    queued: AtomicU64,
    active: AtomicU64,
    completed: AtomicU64,
}

impl PoolCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_queued(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    /// A worker took a queued task.
    pub fn on_started(&self) {
        saturating_decrement(&self.queued);
        self.active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_completed(&self) {
        saturating_decrement(&self.active);
        self.completed.fetch_add(1, Ordering::Relaxed);
    }
}

fn saturating_decrement(value: &AtomicU64) {
    let _ = value.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
}

impl PoolStats for PoolCounters {
    fn active_threads(&self) -> u64 {
        self.active.load(Ordering::Relaxed)
    }

    fn queue_size(&self) -> u64 {
        self.queued.load(Ordering::Relaxed)
    }

    fn completed_tasks(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }
}

/// Publishes the state of every added pool under its name.
///
/// A removed pool is no longer read; the values it last published stay with the recorder.
#[derive(Default)]
pub struct ThreadPoolCollector {
    pools: RwLock<HashMap<String, Arc<dyn PoolStats>>>,
}

impl ThreadPoolCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the pool, replacing and returning any pool previously added under `name`.
    pub fn add_pool(&self, name: &str, pool: Arc<dyn PoolStats>) -> Option<Arc<dyn PoolStats>> {
        self.pools.write().insert(name.to_string(), pool)
    }

    pub fn remove_pool(&self, name: &str) -> Option<Arc<dyn PoolStats>> {
        self.pools.write().remove(name)
    }

    pub fn clear(&self) {
        self.pools.write().clear();
    }

    pub fn len(&self) -> usize {
        self.pools.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.read().is_empty()
    }
}

impl Collector for ThreadPoolCollector {
    fn describe(&self) {
        describe_all(&[
            MetricMetadata::new(
                ACTIVE_THREADS,
                MetricKind::Gauge,
                "Amount of active threads in a thread pool",
            ),
            MetricMetadata::new(
                QUEUE_SIZE,
                MetricKind::Gauge,
                "Size of queue of a thread pool (including scheduled tasks)",
            ),
            MetricMetadata::new(
                COMPLETED_TASKS,
                MetricKind::Counter,
                "Total completed tasks by a thread pool",
            ),
        ]);
    }

    #[allow(clippy::cast_precision_loss)]
    fn collect(&self) {
        let pools: Vec<_> = self
            .pools
            .read()
            .iter()
            .map(|(name, pool)| (name.clone(), Arc::clone(pool)))
            .collect();

        for (name, pool) in pools {
            metrics::gauge!(ACTIVE_THREADS, "name" => name.clone())
                .set(pool.active_threads() as f64);
            metrics::gauge!(QUEUE_SIZE, "name" => name.clone()).set(pool.queue_size() as f64);
            metrics::counter!(COMPLETED_TASKS, "name" => name).absolute(pool.completed_tasks());
        }
    }
}
