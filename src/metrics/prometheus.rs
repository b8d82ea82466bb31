//! Prometheus text format export
//!
//! Converts [`MetricsStore`] contents to the Prometheus exposition
//! format.

use super::store::MetricsStore;
use super::types::SummaryData;
use std::fmt::Write;

/// Export all registered metrics in Prometheus text format.
///
/// Families are emitted in name order so scrapes are deterministic.
///
/// # Example Output
///
/// ```text
/// # HELP sql_queries_total Total number of sql queries.
/// # TYPE sql_queries_total counter
/// sql_queries_total{method="GET",path="/items",query="select * from t"} 42
///
/// # HELP sql_query_duration Duration for serving the sql queries in seconds.
/// # TYPE sql_query_duration summary
/// sql_query_duration{method="GET",path="/items",query="select * from t",quantile="0.5"} 0.012
/// sql_query_duration_sum{method="GET",path="/items",query="select * from t"} 1.93
/// sql_query_duration_count{method="GET",path="/items",query="select * from t"} 42
/// ```
pub fn export_prometheus(store: &MetricsStore) -> String {
    let mut output = String::with_capacity(4096);

    let mut counters = store.counters();
    counters.sort_by(|a, b| a.0.name.cmp(&b.0.name));
    for (meta, counter) in counters {
        write_counter(&mut output, &meta.name, &meta.help, counter.get_all());
    }

    let mut summaries = store.summaries();
    summaries.sort_by(|a, b| a.0.name.cmp(&b.0.name));
    for (meta, summary) in summaries {
        write_summary(&mut output, &meta.name, &meta.help, summary.get_all());
    }

    output
}

fn write_counter(output: &mut String, name: &str, help: &str, mut values: Vec<(String, u64)>) {
    if values.is_empty() {
        return;
    }
    values.sort();

    writeln!(output, "# HELP {name} {help}").unwrap();
    writeln!(output, "# TYPE {name} counter").unwrap();

    for (labels, value) in values {
        if labels.is_empty() {
            writeln!(output, "{name} {value}").unwrap();
        } else {
            writeln!(output, "{name}{{{labels}}} {value}").unwrap();
        }
    }
    writeln!(output).unwrap();
}

fn write_summary(output: &mut String, name: &str, help: &str, mut data: Vec<SummaryData>) {
    if data.is_empty() {
        return;
    }
    data.sort_by(|a, b| a.labels.cmp(&b.labels));

    writeln!(output, "# HELP {name} {help}").unwrap();
    writeln!(output, "# TYPE {name} summary").unwrap();

    for series in data {
        let labels = &series.labels;

        for (quantile, estimate) in &series.quantiles {
            if labels.is_empty() {
                writeln!(output, "{name}{{quantile=\"{quantile}\"}} {estimate}").unwrap();
            } else {
                writeln!(
                    output,
                    "{name}{{{labels},quantile=\"{quantile}\"}} {estimate}"
                )
                .unwrap();
            }
        }

        if labels.is_empty() {
            writeln!(output, "{name}_sum {}", series.sum).unwrap();
            writeln!(output, "{name}_count {}", series.count).unwrap();
        } else {
            writeln!(output, "{name}_sum{{{labels}}} {}", series.sum).unwrap();
            writeln!(output, "{name}_count{{{labels}}} {}", series.count).unwrap();
        }
    }
    writeln!(output).unwrap();
}

/// Extension trait for MetricsStore to add prometheus export.
pub trait PrometheusExport {
    /// Export all metrics in Prometheus text format.
    fn export_prometheus(&self) -> String;
}

impl PrometheusExport for MetricsStore {
    fn export_prometheus(&self) -> String {
        export_prometheus(self)
    }
}
