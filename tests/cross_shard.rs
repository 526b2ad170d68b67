//! Cross-shard distinct counting through the public API.
//!
//! Shards are driven from their own threads while a scraper keeps collecting, the way a
//! gateway client and a metrics endpoint share the crate in production.

#![allow(clippy::expect_used, clippy::panic)]

use metrics_exporter_prometheus::PrometheusBuilder;
use shard_metrics::{
    CardinalityAggregator, GatewayEvent, GatewayMetrics, MetricsCollector, MetricsError,
    ShardLocalIdSet, ShardRegistry,
};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

/// Number of shard worker threads.
const SHARDS: u32 = 8;

/// Ids each shard inserts. Consecutive shards share half of their ids.
const IDS_PER_SHARD: u64 = 5_000;

fn shard_ids(shard_id: u32) -> impl Iterator<Item = u64> {
    let start = u64::from(shard_id) * IDS_PER_SHARD / 2;
    start..start + IDS_PER_SHARD
}

// ---------------------------------------------------------------------------
// Union semantics
// ---------------------------------------------------------------------------

#[test]
fn union_counts_shared_entities_once() {
    let registry = Arc::new(ShardRegistry::new());
    let aggregator = CardinalityAggregator::new(Arc::clone(&registry));

    let a: ShardLocalIdSet = [1, 2, 3].into_iter().collect();
    let b: ShardLocalIdSet = [2, 3, 4].into_iter().collect();
    registry.attach(0, Arc::new(a)).expect("attach a");
    registry.attach(1, Arc::new(b)).expect("attach b");
    assert_eq!(aggregator.compute_unique_count(), 4);

    registry.detach(1);
    assert_eq!(aggregator.compute_unique_count(), 3);

    let err = registry
        .attach(0, Arc::new(ShardLocalIdSet::new()))
        .expect_err("shard 0 is live");
    assert!(matches!(err, MetricsError::DuplicateShard { shard_id: 0 }));
    assert!(registry.attach(1, Arc::new(ShardLocalIdSet::new())).is_ok());
    assert_eq!(aggregator.compute_unique_count(), 3);
}

// ---------------------------------------------------------------------------
// Concurrent shards and scrapes
// ---------------------------------------------------------------------------

/// Every shard inserts its ids and removes every fourth one while a scraper keeps
/// counting. Intermediate counts must stay within bounds; the final count is exact.
#[test]
fn scrapes_during_shard_traffic_stay_in_bounds() {
    let gateway = Arc::new(GatewayMetrics::new());
    let total_ops = u64::from(SHARDS) * IDS_PER_SHARD;
    let done = Arc::new(AtomicBool::new(false));

    let scraper = {
        let gateway = Arc::clone(&gateway);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut scrapes = 0u32;
            while !done.load(Ordering::Acquire) || scrapes == 0 {
                let count = gateway.unique_entities();
                assert!(count <= total_ops, "count {count} exceeds {total_ops}");
                scrapes += 1;
            }
            scrapes
        })
    };

    let workers: Vec<_> = (0..SHARDS)
        .map(|shard_id| {
            let gateway = Arc::clone(&gateway);
            thread::spawn(move || {
                let set = gateway
                    .on_shard_connected(shard_id)
                    .expect("shard ids are unique");
                for id in shard_ids(shard_id) {
                    set.insert(id);
                    if id % 4 == 0 {
                        gateway.on_entity_removed(shard_id, id);
                    }
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("shard worker should not panic");
    }
    done.store(true, Ordering::Release);
    let scrapes = scraper.join().expect("scraper should not panic");
    assert!(scrapes > 0);

    let max_id = u64::from(SHARDS - 1) * IDS_PER_SHARD / 2 + IDS_PER_SHARD;
    let expected = (0..max_id).filter(|id| id % 4 != 0).count() as u64;
    assert_eq!(gateway.unique_entities(), expected);
}

/// Shards connect and disconnect while scrapes run; a scrape never sees a torn shard and
/// the registry ends up empty.
#[test]
fn shard_churn_during_scrapes() {
    let gateway = Arc::new(GatewayMetrics::new());

    let churn: Vec<_> = (0..SHARDS)
        .map(|shard_id| {
            let gateway = Arc::clone(&gateway);
            thread::spawn(move || {
                for _ in 0..50 {
                    gateway
                        .handle_event(&GatewayEvent::ShardConnected { shard_id })
                        .expect("shard is not live");
                    for entity_id in shard_ids(shard_id).take(200) {
                        gateway
                            .handle_event(&GatewayEvent::EntityObserved {
                                shard_id,
                                entity_id,
                            })
                            .expect("observations never fail");
                    }
                    gateway
                        .handle_event(&GatewayEvent::ShardDisconnected { shard_id })
                        .expect("disconnects never fail");
                }
            })
        })
        .collect();

    for _ in 0..200 {
        let count = gateway.unique_entities();
        assert!(count <= u64::from(SHARDS) * 200);
    }

    for worker in churn {
        worker.join().expect("churn worker should not panic");
    }
    assert!(gateway.registry().is_empty());
    assert_eq!(gateway.unique_entities(), 0);
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

#[test]
fn scrape_renders_current_distinct_count() {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    let gateway = Arc::new(GatewayMetrics::new());
    let collector = MetricsCollector::new().register(gateway.clone());

    let first = gateway.on_shard_connected(0).expect("connect 0");
    let second = gateway.on_shard_connected(1).expect("connect 1");
    first.insert(80_351_110_224_678_912);
    second.insert(80_351_110_224_678_912);
    second.insert(41_771_983_423_143_937);

    metrics::with_local_recorder(&recorder, || {
        collector.describe();
        collector.collect();
    });
    assert!(handle.render().contains("discord_distinct_users_current 2"));

    gateway.on_shard_disconnected(1);
    metrics::with_local_recorder(&recorder, || collector.collect());
    assert!(handle.render().contains("discord_distinct_users_current 1"));
}
