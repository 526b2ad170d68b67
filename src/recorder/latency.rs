//! Fixed-bucket latency histograms for executed queries.
//!
//! One histogram exists for every (statement kind, outcome) pair. They are allocated up
//! front, so recording is a handful of relaxed atomic adds and never takes a lock.

use crate::{
    collector::describe_metric,
    events::{MetricKind, MetricMetadata, Outcome, StatementKind},
};
use serde::Serialize;
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

pub const QUERY_DURATION_HISTOGRAM: &str = "jdbc_query_duration_seconds";

/// Inclusive upper bounds of the default buckets.
pub const DEFAULT_BUCKETS: [Duration; 11] = [
    Duration::from_millis(5),
    Duration::from_millis(10),
    Duration::from_millis(25),
    Duration::from_millis(50),
    Duration::from_millis(100),
    Duration::from_millis(250),
    Duration::from_millis(500),
    Duration::from_secs(1),
    Duration::from_millis(2500),
    Duration::from_secs(5),
    Duration::from_secs(10),
];

const HISTOGRAM_COUNT: usize = StatementKind::ALL.len() * Outcome::ALL.len();

#[derive(Debug)]
struct LatencyHistogram {
    // One slot per bound plus the overflow bucket.
    buckets: Box<[AtomicU64]>,
    count: AtomicU64,
    sum_nanos: AtomicU64,
}

impl LatencyHistogram {
    fn new(bounds: usize) -> Self {
        Self {
            buckets: (0..=bounds).map(|_| AtomicU64::new(0)).collect(),
            count: AtomicU64::new(0),
            sum_nanos: AtomicU64::new(0),
        }
    }

    fn observe(&self, bucket: usize, nanos: u64) {
        self.buckets[bucket].fetch_add(1, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_nanos.fetch_add(nanos, Ordering::Relaxed);
    }
}

/// Records query durations keyed by statement kind and outcome.
#[derive(Debug)]
pub struct QueryLatencyRecorder {
    bounds: Vec<Duration>,
    histograms: Vec<LatencyHistogram>,
    histogram_name: String,
}

impl Default for QueryLatencyRecorder {
    fn default() -> Self {
        Self::with_bounds(DEFAULT_BUCKETS.to_vec(), QUERY_DURATION_HISTOGRAM.into())
    }
}

impl QueryLatencyRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_bounds(mut bounds: Vec<Duration>, histogram_name: String) -> Self {
        bounds.sort_unstable();
        bounds.dedup();
        let histograms = (0..HISTOGRAM_COUNT)
            .map(|_| LatencyHistogram::new(bounds.len()))
            .collect();
        Self {
            bounds,
            histograms,
            histogram_name,
        }
    }

    /// Replaces the bucket bounds. Anything recorded so far is discarded.
    #[must_use]
    pub fn buckets(self, bounds: impl IntoIterator<Item = Duration>) -> Self {
        Self::with_bounds(bounds.into_iter().collect(), self.histogram_name)
    }

    /// Sets the name of the `metrics` histogram each observation is forwarded to.
    #[must_use]
    pub fn histogram(mut self, name: &str) -> Self {
        self.histogram_name = name.to_string();
        self
    }

    pub fn bounds(&self) -> &[Duration] {
        &self.bounds
    }

    /// Adds one observation to the histogram of `(kind, outcome)`.
    pub fn record_call(&self, kind: StatementKind, outcome: Outcome, duration_nanos: u64) {
        let duration = Duration::from_nanos(duration_nanos);
        let bucket = self.bounds.partition_point(|bound| *bound < duration);
        self.histogram_for(kind, outcome).observe(bucket, duration_nanos);

        metrics::histogram!(
            self.histogram_name.clone(),
            "kind" => kind.as_str(),
            "outcome" => outcome.as_str()
        )
        .record(duration.as_secs_f64());
    }

    pub fn snapshot(&self, kind: StatementKind, outcome: Outcome) -> HistogramSnapshot {
        let histogram = self.histogram_for(kind, outcome);
        HistogramSnapshot {
            bounds: self.bounds.clone(),
            buckets: histogram
                .buckets
                .iter()
                .map(|bucket| bucket.load(Ordering::Relaxed))
                .collect(),
            count: histogram.count.load(Ordering::Relaxed),
            sum: Duration::from_nanos(histogram.sum_nanos.load(Ordering::Relaxed)),
        }
    }

    pub fn describe(&self) {
        describe_metric(
            &MetricMetadata::new(
                self.histogram_name.clone(),
                MetricKind::Histogram,
                "Query execution time by statement kind and outcome",
            )
            .unit(metrics::Unit::Seconds),
        );
    }

    fn histogram_for(&self, kind: StatementKind, outcome: Outcome) -> &LatencyHistogram {
        &self.histograms[kind.index() * Outcome::ALL.len() + outcome.index()]
    }
}

/// Counts of one histogram at the time it was read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistogramSnapshot {
    /// Inclusive upper bounds, ascending.
    pub bounds: Vec<Duration>,
    /// Observations per bucket; the last entry holds everything above the largest bound.
    pub buckets: Vec<u64>,
    pub count: u64,
    pub sum: Duration,
}

impl HistogramSnapshot {
    /// Number of observations that fell into buckets bounded by at most `limit`.
    pub fn count_at_or_below(&self, limit: Duration) -> u64 {
        self.bounds
            .iter()
            .zip(&self.buckets)
            .take_while(|(bound, _)| **bound <= limit)
            .map(|(_, count)| count)
            .sum()
    }

    /// Cumulative counts per bound, in the `le` form used by Prometheus. The last entry is
    /// the `+Inf` bucket and equals `count` once all writers are done.
    pub fn cumulative(&self) -> Vec<u64> {
        self.buckets
            .iter()
            .scan(0_u64, |total, count| {
                *total += count;
                Some(*total)
            })
            .collect()
    }
}
