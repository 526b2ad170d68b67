#![warn(clippy::pedantic, clippy::nursery, clippy::cargo, clippy::perf)]

//! # `shard_metrics`
//!
//! Metrics for sharded gateway clients and the query proxies behind them, published through
//! the [`metrics`] facade so any exporter can serve them.
//!
//! The interesting part is the distinct entity count. Every shard keeps the ids it currently
//! sees in its own [`ShardLocalIdSet`], registered in a [`ShardRegistry`] while the shard is
//! connected. When metrics are collected the [`CardinalityAggregator`] unions all live sets
//! and publishes the exact number of distinct ids, so an entity visible on several shards is
//! counted once.
//!
//! ```
//! use shard_metrics::{GatewayMetrics, MetricsCollector};
//! use std::sync::Arc;
//!
//! let gateway = Arc::new(GatewayMetrics::new());
//! let shard = gateway.on_shard_connected(0).unwrap();
//! shard.insert(80351110224678912);
//!
//! let collector = MetricsCollector::new().register(gateway.clone());
//! collector.describe();
//! // Right before the exporter renders a scrape:
//! collector.collect();
//! assert_eq!(gateway.aggregator().last_count(), 1);
//! ```
//!
//! ## Async Support
//!
//! Async support is available via the `tokio` feature flag. When enabled, the periodic
//! collector runs on a Tokio task and requires a Tokio runtime. Enable with:
//!
//! ```toml
//! [dependencies]
//! shard_metrics = { version = "...", features = ["tokio"] }
//! ```
//!
//! If the `tokio` feature is not enabled, the periodic collector uses a dedicated thread.

mod collector;
mod error;
mod events;
mod gateway;
mod id_set;
mod recorder;
mod registry;

pub use collector::{
    CardinalityAggregator, Collector, CollectorHandle, DEFAULT_HEADROOM, DISTINCT_USERS_GAUGE,
    MetricsCollector, PoolCounters, PoolStats, ThreadPoolCollector, describe_all,
    describe_metric,
};
pub use error::MetricsError;
pub use events::{
    EntityId, EntityKind, GatewayEvent, MetricKind, MetricMetadata, Outcome, ShardId,
    StatementKind, StatementType,
};
pub use gateway::{EVENTS_RECEIVED, GatewayMetrics};
pub use id_set::{IdSnapshot, ShardLocalIdSet};
pub use recorder::{
    DEFAULT_BUCKETS, HistogramSnapshot, QUERY_DURATION_HISTOGRAM, QueryCountSnapshot,
    QueryLatencyRecorder, QueryMetrics,
};
pub use registry::{LiveShards, ShardRegistry};
