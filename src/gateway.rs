//! Glue between gateway callbacks and the shard registry.

use crate::{
    collector::{CardinalityAggregator, Collector, describe_all},
    error::MetricsError,
    events::{EntityId, EntityKind, GatewayEvent, MetricKind, MetricMetadata, ShardId},
    id_set::ShardLocalIdSet,
    registry::ShardRegistry,
};
use std::sync::Arc;

pub const EVENTS_RECEIVED: &str = "discord_events_received_total";
pub const CLOSE_CODES: &str = "discord_websocket_close_codes_total";
pub const VOICE_CHANNELS_CONNECTED: &str = "discord_voicechannels_connected_current";
pub const ENTITIES: &str = "discord_entities_current";
pub const UNAVAILABLE_GUILDS: &str = "discord_unavailable_guilds_current";
pub const SESSION_START_LIMIT_TOTAL: &str = "discord_session_start_limit_total";
pub const SESSION_START_LIMIT_REMAINING: &str = "discord_session_start_limit_remaining";

/// Translates gateway callbacks into registry and id set updates.
///
/// Each shard's event worker should keep the set returned by
/// [`on_shard_connected`](Self::on_shard_connected) and write to it directly; the
/// `on_entity_*` callbacks look the shard up in the registry on every call.
#[derive(Debug)]
pub struct GatewayMetrics {
    registry: Arc<ShardRegistry>,
    aggregator: Arc<CardinalityAggregator>,
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::with_aggregator(CardinalityAggregator::new(Arc::new(ShardRegistry::new())))
    }
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `aggregator` and the registry it reads from.
    pub fn with_aggregator(aggregator: CardinalityAggregator) -> Self {
        Self {
            registry: Arc::clone(aggregator.registry()),
            aggregator: Arc::new(aggregator),
        }
    }

    pub const fn registry(&self) -> &Arc<ShardRegistry> {
        &self.registry
    }

    pub fn aggregator(&self) -> Arc<CardinalityAggregator> {
        Arc::clone(&self.aggregator)
    }

    /// Distinct entities across all connected shards.
    pub fn unique_entities(&self) -> u64 {
        self.aggregator.compute_unique_count()
    }

    /// Starts tracking a shard that became ready.
    ///
    /// # Errors
    /// Returns [`MetricsError::DuplicateShard`] if the shard is already tracked, which means
    /// the gateway reported the connect twice without a disconnect in between.
    pub fn on_shard_connected(
        &self,
        shard_id: ShardId,
    ) -> Result<Arc<ShardLocalIdSet>, MetricsError> {
        self.registry.connect(shard_id).inspect_err(|e| {
            log::warn!("Refusing to track shard {shard_id} twice: {e}");
        })
    }

    /// Stops tracking a shard. Everything it has seen stops counting towards the total.
    pub fn on_shard_disconnected(&self, shard_id: ShardId) {
        if let Some(set) = self.registry.detach(shard_id) {
            log::debug!("Shard {shard_id} detached holding {} entities", set.len());
        }
    }

    pub fn on_entity_observed(&self, shard_id: ShardId, entity_id: EntityId) {
        match self.registry.get(shard_id) {
            Some(set) => {
                set.insert(entity_id);
            }
            None => log::trace!("Ignoring entity {entity_id} from unknown shard {shard_id}"),
        }
    }

    pub fn on_entity_removed(&self, shard_id: ShardId, entity_id: EntityId) {
        match self.registry.get(shard_id) {
            Some(set) => {
                set.remove(entity_id);
            }
            None => log::trace!("Ignoring removal of {entity_id} from unknown shard {shard_id}"),
        }
    }

    /// Counts the close code of a shard's websocket.
    pub fn on_websocket_closed(&self, shard_id: ShardId, code: u16) {
        log::debug!("Websocket of shard {shard_id} closed with code {code}");
        metrics::counter!(CLOSE_CODES, "code" => code.to_string()).increment(1);
    }

    /// Number of voice channels the client is connected to, across all shards.
    #[allow(clippy::cast_precision_loss)]
    pub fn set_voice_channels_connected(&self, count: u64) {
        metrics::gauge!(VOICE_CHANNELS_CONNECTED).set(count as f64);
    }

    /// Number of cached entities of `kind`, across all shards.
    #[allow(clippy::cast_precision_loss)]
    pub fn set_entity_count(&self, kind: EntityKind, count: u64) {
        metrics::gauge!(ENTITIES, "type" => kind.as_str()).set(count as f64);
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn set_unavailable_guilds(&self, count: u64) {
        metrics::gauge!(UNAVAILABLE_GUILDS).set(count as f64);
    }

    /// Session start limit as reported by the gateway when a shard identifies.
    #[allow(clippy::cast_precision_loss)]
    pub fn set_session_start_limit(&self, total: u64, remaining: u64) {
        metrics::gauge!(SESSION_START_LIMIT_TOTAL).set(total as f64);
        metrics::gauge!(SESSION_START_LIMIT_REMAINING).set(remaining as f64);
    }

    /// Counts `event` and applies it.
    ///
    /// # Errors
    /// Fails only for a [`GatewayEvent::ShardConnected`] of a shard that is already tracked.
    pub fn handle_event(&self, event: &GatewayEvent) -> Result<(), MetricsError> {
        metrics::counter!(EVENTS_RECEIVED, "class" => event.class().to_string()).increment(1);

        match *event {
            GatewayEvent::ShardConnected { shard_id } => {
                self.on_shard_connected(shard_id)?;
            }
            GatewayEvent::ShardDisconnected { shard_id } => self.on_shard_disconnected(shard_id),
            GatewayEvent::EntityObserved {
                shard_id,
                entity_id,
            } => self.on_entity_observed(shard_id, entity_id),
            GatewayEvent::EntityRemoved {
                shard_id,
                entity_id,
            } => self.on_entity_removed(shard_id, entity_id),
            GatewayEvent::WebsocketClosed { shard_id, code } => {
                self.on_websocket_closed(shard_id, code);
            }
            GatewayEvent::Other { .. } => {}
        }
        Ok(())
    }
}

impl Collector for GatewayMetrics {
    fn describe(&self) {
        describe_all(&[
            MetricMetadata::new(
                EVENTS_RECEIVED,
                MetricKind::Counter,
                "All events the gateway provides us with by class",
            ),
            MetricMetadata::new(
                CLOSE_CODES,
                MetricKind::Counter,
                "Close codes of the main websocket connections",
            ),
            MetricMetadata::new(
                VOICE_CHANNELS_CONNECTED,
                MetricKind::Gauge,
                "How many voice channels the client is connected to",
            ),
            MetricMetadata::new(ENTITIES, MetricKind::Gauge, "How many entities are present"),
            MetricMetadata::new(
                UNAVAILABLE_GUILDS,
                MetricKind::Gauge,
                "How many guilds are unavailable",
            ),
            MetricMetadata::new(
                SESSION_START_LIMIT_TOTAL,
                MetricKind::Gauge,
                "Maximum session start limit",
            ),
            MetricMetadata::new(
                SESSION_START_LIMIT_REMAINING,
                MetricKind::Gauge,
                "Remaining session starts",
            ),
        ]);
        self.aggregator.describe();
    }

    fn collect(&self) {
        self.aggregator.collect();
    }
}
