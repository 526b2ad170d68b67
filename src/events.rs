use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque snowflake identifier of an entity (e.g. a user) seen by a shard.
pub type EntityId = u64;

/// Identifier of one shard connection.
pub type ShardId = u32;

/// The kind of metric being described.
///
/// Used to distinguish between counters, gauges, and histograms.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

/// Metadata describing a metric.
///
/// Includes the metric name, kind, description, and optional unit.
///
#[derive(Debug, Clone)]
pub struct MetricMetadata {
    pub name: String,
    pub kind: MetricKind,
    pub description: &'static str,
    pub unit: Option<metrics::Unit>,
}

impl MetricMetadata {
    pub fn new(name: impl Into<String>, kind: MetricKind, description: &'static str) -> Self {
        Self {
            name: name.into(),
            kind,
            description,
            unit: None,
        }
    }

    #[must_use]
    pub fn unit(mut self, unit: metrics::Unit) -> Self {
        self.unit = Some(unit);
        self
    }
}

/// Events delivered by the gateway client, one stream per shard.
///
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// The shard finished its handshake and starts delivering entities.
    ShardConnected { shard_id: ShardId },
    /// The shard connection is gone, along with everything it has seen.
    ShardDisconnected { shard_id: ShardId },
    EntityObserved { shard_id: ShardId, entity_id: EntityId },
    EntityRemoved { shard_id: ShardId, entity_id: EntityId },
    /// The shard's websocket was closed by the remote end.
    WebsocketClosed { shard_id: ShardId, code: u16 },
    /// Any other gateway event. Only counted.
    Other { shard_id: ShardId, class: String },
}

impl GatewayEvent {
    /// Name used for the `class` label of the received events counter.
    pub fn class(&self) -> &str {
        match self {
            Self::ShardConnected { .. } => "ShardConnected",
            Self::ShardDisconnected { .. } => "ShardDisconnected",
            Self::EntityObserved { .. } => "EntityObserved",
            Self::EntityRemoved { .. } => "EntityRemoved",
            Self::WebsocketClosed { .. } => "WebsocketClosed",
            Self::Other { class, .. } => class.as_str(),
        }
    }

    pub const fn shard_id(&self) -> ShardId {
        match self {
            Self::ShardConnected { shard_id }
            | Self::ShardDisconnected { shard_id }
            | Self::EntityObserved { shard_id, .. }
            | Self::EntityRemoved { shard_id, .. }
            | Self::WebsocketClosed { shard_id, .. }
            | Self::Other { shard_id, .. } => *shard_id,
        }
    }
}

/// Cached entity types reported through `discord_entities_current`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Category,
    Emote,
    Guild,
    PrivateChannel,
    Role,
    TextChannel,
    User,
    VoiceChannel,
}

impl EntityKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Category => "Category",
            Self::Emote => "Emote",
            Self::Guild => "Guild",
            Self::PrivateChannel => "PrivateChannel",
            Self::Role => "Role",
            Self::TextChannel => "TextChannel",
            Self::User => "User",
            Self::VoiceChannel => "VoiceChannel",
        }
    }
}

/// Statement kind of an executed query.
///
/// Anything that can not be classified is recorded as [`StatementKind::Unknown`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Other,
    Unknown,
}

impl StatementKind {
    pub const ALL: [Self; 6] = [
        Self::Select,
        Self::Insert,
        Self::Update,
        Self::Delete,
        Self::Other,
        Self::Unknown,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Other => "other",
            Self::Unknown => "unknown",
        }
    }

    /// Classifies a statement by its leading keyword.
    ///
    /// Blank statements are `Unknown`, anything with an unrecognised keyword is `Other`.
    pub fn from_sql(sql: &str) -> Self {
        let Some(keyword) = sql
            .split(|c: char| c.is_whitespace() || c == '(')
            .find(|word| !word.is_empty())
        else {
            return Self::Unknown;
        };

        if keyword.eq_ignore_ascii_case("select") || keyword.eq_ignore_ascii_case("with") {
            Self::Select
        } else if keyword.eq_ignore_ascii_case("insert") {
            Self::Insert
        } else if keyword.eq_ignore_ascii_case("update") {
            Self::Update
        } else if keyword.eq_ignore_ascii_case("delete") {
            Self::Delete
        } else {
            Self::Other
        }
    }

    /// Parses a kind label as produced by [`StatementKind::as_str`], case-insensitively.
    pub fn from_label(label: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(label.trim()))
            .unwrap_or(Self::Unknown)
    }

    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a statement was handed to the driver. Counted per execution, independently of the
/// [`StatementKind`] of the queries it ran.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StatementType {
    Statement,
    Prepared,
    Callable,
}

impl StatementType {
    pub const ALL: [Self; 3] = [Self::Statement, Self::Prepared, Self::Callable];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Statement => "statement",
            Self::Prepared => "prepared",
            Self::Callable => "callable",
        }
    }

    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

/// Whether an executed query succeeded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Error,
}

impl Outcome {
    pub const ALL: [Self; 2] = [Self::Success, Self::Error];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

impl From<bool> for Outcome {
    fn from(success: bool) -> Self {
        if success { Self::Success } else { Self::Error }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_statements_by_leading_keyword() {
        assert_eq!(StatementKind::from_sql("SELECT * FROM users"), StatementKind::Select);
        assert_eq!(StatementKind::from_sql("  insert into t values (1)"), StatementKind::Insert);
        assert_eq!(StatementKind::from_sql("\nUpdate t set a = 1"), StatementKind::Update);
        assert_eq!(StatementKind::from_sql("delete from t"), StatementKind::Delete);
        assert_eq!(StatementKind::from_sql("(select 1)"), StatementKind::Select);
        assert_eq!(
            StatementKind::from_sql("WITH recent AS (SELECT id FROM users) SELECT * FROM recent"),
            StatementKind::Select
        );
        assert_eq!(
            StatementKind::from_sql("(with x as (select 1) select * from x)"),
            StatementKind::Select
        );
        assert_eq!(StatementKind::from_sql("VACUUM"), StatementKind::Other);
        assert_eq!(StatementKind::from_sql("   "), StatementKind::Unknown);
    }

    #[test]
    fn unknown_labels_map_to_unknown() {
        assert_eq!(StatementKind::from_label("SELECT"), StatementKind::Select);
        assert_eq!(StatementKind::from_label("merge"), StatementKind::Unknown);
        assert_eq!(StatementKind::from_label(""), StatementKind::Unknown);
    }

    #[test]
    fn gateway_event_class_and_shard() {
        let event = GatewayEvent::EntityObserved {
            shard_id: 3,
            entity_id: 42,
        };
        assert_eq!(event.class(), "EntityObserved");
        assert_eq!(event.shard_id(), 3);

        let other = GatewayEvent::Other {
            shard_id: 1,
            class: "MessageReceived".into(),
        };
        assert_eq!(other.class(), "MessageReceived");
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = GatewayEvent::EntityObserved {
            shard_id: 3,
            entity_id: 80_351_110_224_678_912,
        };
        let value = serde_json::to_value(&event).expect("event should serialize");
        assert_eq!(
            value,
            json!({
                "type": "entity_observed",
                "shard_id": 3,
                "entity_id": 80_351_110_224_678_912_u64,
            })
        );

        let parsed: GatewayEvent =
            serde_json::from_str(r#"{"type":"other","shard_id":1,"class":"MessageReceived"}"#)
                .expect("event should parse");
        assert_eq!(
            parsed,
            GatewayEvent::Other {
                shard_id: 1,
                class: "MessageReceived".into(),
            }
        );
        assert!(serde_json::from_str::<GatewayEvent>(r#"{"shard_id":1}"#).is_err());
    }

    #[test]
    fn labels_serialize_in_snake_case() {
        assert_eq!(serde_json::to_value(StatementKind::Select).ok(), Some(json!("select")));
        assert_eq!(serde_json::to_value(Outcome::Error).ok(), Some(json!("error")));
        assert_eq!(
            serde_json::from_str::<StatementKind>("\"unknown\"").ok(),
            Some(StatementKind::Unknown)
        );
        assert_eq!(serde_json::from_str::<Outcome>("\"success\"").ok(), Some(Outcome::Success));
    }
}
