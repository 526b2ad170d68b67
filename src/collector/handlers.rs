use crate::events::{MetricKind, MetricMetadata};

/// Registers the description (and unit, if any) of a metric with the installed recorder.
pub fn describe_metric(metadata: &MetricMetadata) {
    let name = metadata.name.clone();
    let description = metadata.description;

    match metadata.kind {
        MetricKind::Counter => {
            if let Some(unit) = metadata.unit {
                metrics::describe_counter!(name, unit, description);
            } else {
                metrics::describe_counter!(name, description);
            }
        }
        MetricKind::Gauge => {
            if let Some(unit) = metadata.unit {
                metrics::describe_gauge!(name, unit, description);
            } else {
                metrics::describe_gauge!(name, description);
            }
        }
        MetricKind::Histogram => {
            if let Some(unit) = metadata.unit {
                metrics::describe_histogram!(name, unit, description);
            } else {
                metrics::describe_histogram!(name, description);
            }
        }
    }
}

pub fn describe_all<'a>(metadata: impl IntoIterator<Item = &'a MetricMetadata>) {
    metadata.into_iter().for_each(describe_metric);
}
