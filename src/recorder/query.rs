use super::latency::QueryLatencyRecorder;
use crate::{
    collector::{Collector, describe_all},
    events::{MetricKind, MetricMetadata, Outcome, StatementKind, StatementType},
};
use serde::Serialize;
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

const SELECT_TOTAL: &str = "jdbc_query_select_total";
const INSERT_TOTAL: &str = "jdbc_query_insert_total";
const UPDATE_TOTAL: &str = "jdbc_query_update_total";
const DELETE_TOTAL: &str = "jdbc_query_delete_total";
const OTHER_TOTAL: &str = "jdbc_query_other_total";
const QUERY_TOTAL: &str = "jdbc_query_total";
const STATEMENT_TOTAL: &str = "jdbc_statement_total";
const PREPARED_TOTAL: &str = "jdbc_prepared_total";
const CALLABLE_TOTAL: &str = "jdbc_callable_total";
const SUCCESS_TOTAL: &str = "jdbc_success_total";
const FAILURE_TOTAL: &str = "jdbc_failure_total";
const TIME_TOTAL: &str = "jdbc_time_total_seconds";

/// Query counters of one datasource, mirrored into `metrics` counters when collected.
///
/// Every executed query is also recorded into the shared [`QueryLatencyRecorder`].
#[derive(Debug)]
pub struct QueryMetrics {
    datasource: String,
    by_kind: [AtomicU64; StatementKind::ALL.len()],
    by_type: [AtomicU64; StatementType::ALL.len()],
    success: AtomicU64,
    failure: AtomicU64,
    time_nanos: AtomicU64,
    latency: Arc<QueryLatencyRecorder>,
}

impl QueryMetrics {
    pub fn new(datasource: &str, latency: Arc<QueryLatencyRecorder>) -> Self {
        Self {
            datasource: datasource.to_string(),
            by_kind: Default::default(),
            by_type: Default::default(),
            success: AtomicU64::new(0),
            failure: AtomicU64::new(0),
            time_nanos: AtomicU64::new(0),
            latency,
        }
    }

    pub fn datasource(&self) -> &str {
        &self.datasource
    }

    pub const fn latency(&self) -> &Arc<QueryLatencyRecorder> {
        &self.latency
    }

    /// Called by the query proxy after every statement.
    pub fn on_query_executed(&self, kind: StatementKind, outcome: Outcome, duration_nanos: u64) {
        self.by_kind[kind.index()].fetch_add(1, Ordering::Relaxed);
        match outcome {
            Outcome::Success => self.success.fetch_add(1, Ordering::Relaxed),
            Outcome::Error => self.failure.fetch_add(1, Ordering::Relaxed),
        };
        self.time_nanos.fetch_add(duration_nanos, Ordering::Relaxed);
        self.latency.record_call(kind, outcome, duration_nanos);
    }

    /// Called by the query proxy once per statement execution. A batch counts once here
    /// while each of its queries goes through [`on_query_executed`](Self::on_query_executed).
    pub fn on_statement_executed(&self, statement: StatementType) {
        self.by_type[statement.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// Classifies `sql` by its leading keyword and records it.
    pub fn on_statement(&self, sql: &str, success: bool, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.on_query_executed(StatementKind::from_sql(sql), success.into(), nanos);
    }

    pub fn snapshot(&self) -> QueryCountSnapshot {
        let count = |kind: StatementKind| self.by_kind[kind.index()].load(Ordering::Relaxed);
        let executions = |ty: StatementType| self.by_type[ty.index()].load(Ordering::Relaxed);
        let select = count(StatementKind::Select);
        let insert = count(StatementKind::Insert);
        let update = count(StatementKind::Update);
        let delete = count(StatementKind::Delete);
        // Unclassifiable statements are reported with the other ones.
        let other = count(StatementKind::Other) + count(StatementKind::Unknown);

        QueryCountSnapshot {
            select,
            insert,
            update,
            delete,
            other,
            total: select + insert + update + delete + other,
            statement: executions(StatementType::Statement),
            prepared: executions(StatementType::Prepared),
            callable: executions(StatementType::Callable),
            success: self.success.load(Ordering::Relaxed),
            failure: self.failure.load(Ordering::Relaxed),
            time: Duration::from_nanos(self.time_nanos.load(Ordering::Relaxed)),
        }
    }
}

impl Collector for QueryMetrics {
    fn describe(&self) {
        let counter = |name: &str, description: &'static str| {
            MetricMetadata::new(name, MetricKind::Counter, description)
        };
        describe_all(&[
            counter(SELECT_TOTAL, "Total select queries"),
            counter(INSERT_TOTAL, "Total insert queries"),
            counter(UPDATE_TOTAL, "Total update queries"),
            counter(DELETE_TOTAL, "Total delete queries"),
            counter(OTHER_TOTAL, "Total other queries"),
            counter(QUERY_TOTAL, "Total queries"),
            counter(STATEMENT_TOTAL, "Total statements"),
            counter(PREPARED_TOTAL, "Total prepared statements"),
            counter(CALLABLE_TOTAL, "Total callable statements"),
            counter(SUCCESS_TOTAL, "Total successful queries"),
            counter(FAILURE_TOTAL, "Total failed queries"),
            counter(TIME_TOTAL, "Total query execution time").unit(metrics::Unit::Seconds),
        ]);
        self.latency.describe();
    }

    fn collect(&self) {
        let snapshot = self.snapshot();
        let values = [
            (SELECT_TOTAL, snapshot.select),
            (INSERT_TOTAL, snapshot.insert),
            (UPDATE_TOTAL, snapshot.update),
            (DELETE_TOTAL, snapshot.delete),
            (OTHER_TOTAL, snapshot.other),
            (QUERY_TOTAL, snapshot.total),
            (STATEMENT_TOTAL, snapshot.statement),
            (PREPARED_TOTAL, snapshot.prepared),
            (CALLABLE_TOTAL, snapshot.callable),
            (SUCCESS_TOTAL, snapshot.success),
            (FAILURE_TOTAL, snapshot.failure),
            // Counters are integral, so partial seconds are reported once they add up.
            (TIME_TOTAL, snapshot.time.as_secs()),
        ];
        for (name, value) in values {
            metrics::counter!(name, "datasource" => self.datasource.clone()).absolute(value);
        }
    }
}

/// Query counters of one datasource at the time they were read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryCountSnapshot {
    pub select: u64,
    pub insert: u64,
    pub update: u64,
    pub delete: u64,
    pub other: u64,
    pub total: u64,
    pub statement: u64,
    pub prepared: u64,
    pub callable: u64,
    pub success: u64,
    pub failure: u64,
    pub time: Duration,
}
