mod cardinality;
mod handlers;
mod thread_pool;

pub use cardinality::{CardinalityAggregator, DEFAULT_HEADROOM, DISTINCT_USERS_GAUGE};
pub use handlers::{describe_all, describe_metric};
pub use thread_pool::{PoolCounters, PoolStats, ThreadPoolCollector};

use crate::error::MetricsError;
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
#[cfg(not(feature = "tokio"))]
use std::thread;
#[cfg(feature = "tokio")]
use tokio::task;

/// Something that publishes its current values into the installed `metrics` recorder.
///
/// Collectors are pulled: nothing is published until [`Collector::collect`] runs, which
/// usually happens right before the exporter renders a scrape.
pub trait Collector: Send + Sync {
    /// Registers descriptions for the metrics this collector publishes.
    fn describe(&self) {}

    fn collect(&self);
}

/// Runs a set of [`Collector`]s, either on demand or periodically.
pub struct MetricsCollector {
    collectors: Vec<Arc<dyn Collector>>,
    period: Duration,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            collectors: Vec::new(),
            period: Duration::from_secs(60),
        }
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a collector to run.
    #[must_use]
    pub fn register(mut self, collector: Arc<dyn Collector>) -> Self {
        self.collectors.push(collector);
        self
    }

    /// Sets the interval used by [`start_collecting`](Self::start_collecting).
    #[must_use]
    pub const fn period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn describe(&self) {
        self.collectors.iter().for_each(|c| c.describe());
    }

    /// Runs every registered collector once, on the calling thread.
    pub fn collect(&self) {
        self.collectors.iter().for_each(|c| c.collect());
    }

    /// Like [`collect`](Self::collect), but a collector that panics is logged and skipped so
    /// the remaining collectors and later runs still happen.
    fn collect_logging_failures(&self) {
        for collector in &self.collectors {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| collector.collect())) {
                log::warn!("Failed to run metrics job: {}", panic_message(payload.as_ref()));
            }
        }
    }

    /// Describes all metrics, then keeps collecting them every `period` in the background.
    /// The first collection happens immediately.
    ///
    /// Dropping the returned handle leaves the job running; call [`CollectorHandle::stop`]
    /// to end it.
    ///
    /// # Example
    /// ```
    /// use shard_metrics::{CardinalityAggregator, MetricsCollector, ShardRegistry};
    /// use std::{sync::Arc, time::Duration};
    ///
    /// let registry = Arc::new(ShardRegistry::new());
    /// let aggregator = Arc::new(CardinalityAggregator::new(registry));
    /// let collector = MetricsCollector::new()
    ///     .register(aggregator)
    ///     .period(Duration::from_secs(30));
    /// match collector.start_collecting() {
    ///     Ok(handle) => handle.stop(),
    ///     Err(e) => eprintln!("Failed to start metrics collector: {e}"),
    /// }
    /// ```
    ///
    /// # Errors
    /// Returns an error if the collector thread can not be spawned.
    #[cfg(not(feature = "tokio"))]
    pub fn start_collecting(self) -> Result<CollectorHandle, MetricsError> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let period = self.period;

        self.describe();
        let thread = thread::Builder::new()
            .name("metrics-collector".into())
            .spawn(move || {
                log::info!("Metrics collector started, collecting every {period:?}");
                while flag.load(Ordering::Acquire) {
                    self.collect_logging_failures();
                    thread::park_timeout(period);
                }
                log::info!("Metrics collector stopped");
            })?;

        Ok(CollectorHandle {
            running,
            thread: thread.thread().clone(),
        })
    }

    /// Describes all metrics, then keeps collecting them every `period` on a Tokio task.
    /// The first collection happens immediately.
    ///
    /// Dropping the returned handle leaves the job running; call [`CollectorHandle::stop`]
    /// to end it.
    ///
    /// # Errors
    /// Never fails with the `tokio` feature; the signature matches the threaded variant.
    #[cfg(feature = "tokio")]
    pub fn start_collecting(self) -> Result<CollectorHandle, MetricsError> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let period = self.period;

        self.describe();
        let task = task::spawn(async move {
            log::info!("Metrics collector started, collecting every {period:?}");
            let mut interval = tokio::time::interval(period);
            while flag.load(Ordering::Acquire) {
                interval.tick().await;
                self.collect_logging_failures();
            }
        });

        Ok(CollectorHandle { running, task })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("collector panicked")
}

/// Controls a collector started with [`MetricsCollector::start_collecting`].
#[derive(Debug)]
pub struct CollectorHandle {
    running: Arc<AtomicBool>,
    #[cfg(not(feature = "tokio"))]
    thread: thread::Thread,
    #[cfg(feature = "tokio")]
    task: task::JoinHandle<()>,
}

impl CollectorHandle {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stops the periodic job. A collection already in progress runs to completion.
    pub fn stop(self) {
        self.running.store(false, Ordering::Release);
        #[cfg(not(feature = "tokio"))]
        self.thread.unpark();
        #[cfg(feature = "tokio")]
        self.task.abort();
    }
}
