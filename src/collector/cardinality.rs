use super::{Collector, handlers::describe_metric};
use crate::{
    events::{MetricKind, MetricMetadata},
    registry::ShardRegistry,
};
use hashbrown::HashSet;
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Instant,
};

pub const DISTINCT_USERS_GAUGE: &str = "discord_distinct_users_current";

/// Extra slots reserved on top of the previous count when sizing the union table.
pub const DEFAULT_HEADROOM: usize = 10_000;

/// Counts the distinct entity ids across every live shard.
///
/// Every call to [`compute_unique_count`](Self::compute_unique_count) unions all shard sets
/// from scratch. Ids seen by several shards are counted once; shards that have been detached
/// no longer contribute. The work is proportional to the total number of ids held by all
/// shards, so this is meant to run on scrape cadence rather than per event.
#[derive(Debug)]
pub struct CardinalityAggregator {
    registry: Arc<ShardRegistry>,
    gauge: String,
    headroom: usize,
    last_count: AtomicU64,
}

impl CardinalityAggregator {
    pub fn new(registry: Arc<ShardRegistry>) -> Self {
        Self {
            registry,
            gauge: DISTINCT_USERS_GAUGE.into(),
            headroom: DEFAULT_HEADROOM,
            last_count: AtomicU64::new(0),
        }
    }

    /// Sets the name of the gauge the count is published to.
    #[must_use]
    pub fn gauge(mut self, name: &str) -> Self {
        self.gauge = name.to_string();
        self
    }

    /// Sets how many slots beyond the previous count the union table starts with.
    #[must_use]
    pub const fn headroom(mut self, headroom: usize) -> Self {
        self.headroom = headroom;
        self
    }

    pub const fn registry(&self) -> &Arc<ShardRegistry> {
        &self.registry
    }

    /// Returns the number of distinct ids held by the shards attached right now.
    ///
    /// An empty registry yields zero. A single shard needs no deduplication, so its size is
    /// returned directly.
    pub fn compute_unique_count(&self) -> u64 {
        let started = Instant::now();
        let mut shards = self.registry.list_live();

        let count = match shards.len() {
            0 => 0,
            1 => shards.next().map_or(0, |(_, set)| set.len() as u64),
            _ => {
                let expected = usize::try_from(self.last_count()).unwrap_or(usize::MAX);
                let mut distinct = HashSet::with_capacity(expected.saturating_add(self.headroom));
                for (_, set) in shards {
                    set.union_into(&mut distinct);
                }
                distinct.len() as u64
            }
        };

        log::debug!(
            "Distinct entities counted: {count} in {:?}",
            started.elapsed()
        );
        self.last_count.store(count, Ordering::Relaxed);
        count
    }

    /// The result of the most recent count, zero before the first one.
    pub fn last_count(&self) -> u64 {
        self.last_count.load(Ordering::Relaxed)
    }
}

impl Collector for CardinalityAggregator {
    fn describe(&self) {
        describe_metric(&MetricMetadata::new(
            self.gauge.clone(),
            MetricKind::Gauge,
            "Total distinct users",
        ));
    }

    #[allow(clippy::cast_precision_loss)]
    fn collect(&self) {
        let count = self.compute_unique_count();
        metrics::gauge!(self.gauge.clone()).set(count as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id_set::ShardLocalIdSet;
    use metrics_exporter_prometheus::PrometheusBuilder;

    fn registry_with(shards: &[(u32, Vec<u64>)]) -> Arc<ShardRegistry> {
        let registry = Arc::new(ShardRegistry::new());
        for (shard_id, ids) in shards {
            let set: ShardLocalIdSet = ids.iter().copied().collect();
            registry
                .attach(*shard_id, Arc::new(set))
                .expect("attach should succeed");
        }
        registry
    }

    #[test]
    fn empty_registry_counts_zero() {
        let aggregator = CardinalityAggregator::new(Arc::new(ShardRegistry::new()));
        assert_eq!(aggregator.compute_unique_count(), 0);
    }

    #[test]
    fn single_shard_count_is_its_size() {
        let aggregator = CardinalityAggregator::new(registry_with(&[(0, vec![3, 1, 2])]));
        assert_eq!(aggregator.compute_unique_count(), 3);
    }

    #[test]
    fn overlapping_shards_are_deduplicated() {
        let registry = registry_with(&[(0, vec![1, 2, 3]), (1, vec![2, 3, 4])]);
        let aggregator = CardinalityAggregator::new(Arc::clone(&registry));
        assert_eq!(aggregator.compute_unique_count(), 4);

        registry.detach(1);
        assert_eq!(aggregator.compute_unique_count(), 3);
        assert_eq!(aggregator.last_count(), 3);
    }

    #[test]
    fn count_follows_writes_between_calls() {
        let registry = registry_with(&[(0, vec![1, 2]), (1, vec![2])]);
        let aggregator = CardinalityAggregator::new(Arc::clone(&registry)).headroom(0);
        assert_eq!(aggregator.compute_unique_count(), 2);

        let shard = registry.get(1).expect("shard 1 should be attached");
        shard.insert(9);
        shard.remove(2);
        assert_eq!(aggregator.compute_unique_count(), 3);

        registry.get(0).expect("shard 0 should be attached").remove(2);
        assert_eq!(aggregator.compute_unique_count(), 2);
    }

    #[test]
    fn collect_publishes_gauge() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let registry = registry_with(&[(0, vec![1, 2, 3]), (1, vec![2, 3, 4])]);
        let aggregator = CardinalityAggregator::new(registry).gauge("test_distinct_entities");

        metrics::with_local_recorder(&recorder, || {
            aggregator.describe();
            aggregator.collect();
        });

        let rendered = handle.render();
        assert!(rendered.contains("# HELP test_distinct_entities Total distinct users"));
        assert!(rendered.contains("test_distinct_entities 4"));
    }
}
