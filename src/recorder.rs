mod latency;
mod query;

pub use latency::{
    DEFAULT_BUCKETS, HistogramSnapshot, QUERY_DURATION_HISTOGRAM, QueryLatencyRecorder,
};
pub use query::{QueryCountSnapshot, QueryMetrics};
