//! Core metric types: Counter and Summary
//!
//! Thread-safe metric primitives with label support. Handles are shared
//! across all concurrent intercepted calls, so increments and
//! observations must never lose updates: counters are atomics behind a
//! read-mostly series map, summaries lock per observation.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// A quantile target for a [`Summary`]: estimate `quantile` with up to
/// `error` tolerated rank error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantile {
    /// Target quantile in `(0, 1)`, e.g. `0.99`
    pub quantile: f64,
    /// Tolerated estimation error, e.g. `0.001`
    pub error: f64,
}

impl Quantile {
    /// Shorthand constructor.
    pub const fn new(quantile: f64, error: f64) -> Self {
        Self { quantile, error }
    }
}

/// Median, 90th, and 99th percentile with progressively tighter error
/// tolerances. The usual choice for call-duration summaries.
pub const DEFAULT_LATENCY_QUANTILES: &[Quantile] = &[
    Quantile::new(0.5, 0.05),
    Quantile::new(0.9, 0.01),
    Quantile::new(0.99, 0.001),
];

/// Render one series key from declared label names and runtime values,
/// e.g. `method="GET",path="/items"`.
///
/// Label values are free-form text (normalized SQL ends up here), so
/// backslashes, quotes, and newlines are escaped the way the exposition
/// format requires.
pub(crate) fn format_series(names: &[String], values: &[&str]) -> String {
    debug_assert_eq!(
        names.len(),
        values.len(),
        "label value count must match the declared label names"
    );
    names
        .iter()
        .zip(values.iter())
        .map(|(name, value)| format!("{name}=\"{}\"", escape_label_value(value)))
        .collect::<Vec<_>>()
        .join(",")
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

// ============================================================================
// Counter
// ============================================================================

/// Monotonically increasing counter with declared label names.
///
/// One `Counter` holds every series (label-value combination) recorded
/// under its name. Lookups take the read lock; only the first observation
/// of a new series takes the write lock.
#[derive(Debug)]
pub struct Counter {
    label_names: Vec<String>,
    series: RwLock<HashMap<String, AtomicU64>>,
}

impl Counter {
    pub(crate) fn new(label_names: &[&str]) -> Self {
        Self {
            label_names: label_names.iter().map(|s| s.to_string()).collect(),
            series: RwLock::new(HashMap::new()),
        }
    }

    /// Declared label names, in declaration order.
    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    /// Observation sink for one label-value combination.
    pub fn labels(&self, values: &[&str]) -> CounterSink<'_> {
        CounterSink {
            counter: self,
            key: format_series(&self.label_names, values),
        }
    }

    /// Current value for one label-value combination (0 if never seen).
    pub fn get(&self, values: &[&str]) -> u64 {
        let key = format_series(&self.label_names, values);
        self.series
            .read()
            .get(&key)
            .map(|v| v.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// All (series key, value) pairs.
    pub fn get_all(&self) -> Vec<(String, u64)> {
        self.series
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect()
    }

    fn add(&self, key: &str, value: u64) {
        // Fast path: series already exists
        {
            let series = self.series.read();
            if let Some(counter) = series.get(key) {
                counter.fetch_add(value, Ordering::Relaxed);
                return;
            }
        }

        // Slow path: first observation of this series
        self.series
            .write()
            .entry(key.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(value, Ordering::Relaxed);
    }
}

/// Increment handle for one counter series.
#[derive(Debug)]
pub struct CounterSink<'a> {
    counter: &'a Counter,
    key: String,
}

impl CounterSink<'_> {
    /// Increment by one.
    pub fn inc(&self) {
        self.counter.add(&self.key, 1);
    }

    /// Increment by `value`.
    pub fn inc_by(&self, value: u64) {
        self.counter.add(&self.key, value);
    }
}

// ============================================================================
// Summary
// ============================================================================

#[derive(Debug, Default)]
struct SummarySeries {
    sum: f64,
    count: u64,
    samples: Vec<f64>,
}

/// Quantile summary of observed values (durations in seconds, here) with
/// declared label names.
///
/// Observations are retained per series and quantile estimates are
/// computed rank-based at snapshot time. That trades memory for a simple,
/// contention-free record path, which is acceptable because the crate's
/// label normalization keeps the series space bounded.
#[derive(Debug)]
pub struct Summary {
    label_names: Vec<String>,
    quantiles: Vec<Quantile>,
    series: RwLock<HashMap<String, SummarySeries>>,
}

impl Summary {
    pub(crate) fn new(label_names: &[&str], quantiles: &[Quantile]) -> Self {
        Self {
            label_names: label_names.iter().map(|s| s.to_string()).collect(),
            quantiles: quantiles.to_vec(),
            series: RwLock::new(HashMap::new()),
        }
    }

    /// Declared label names, in declaration order.
    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    /// Declared quantile targets.
    pub fn quantiles(&self) -> &[Quantile] {
        &self.quantiles
    }

    /// Observation sink for one label-value combination.
    pub fn labels(&self, values: &[&str]) -> SummarySink<'_> {
        SummarySink {
            summary: self,
            key: format_series(&self.label_names, values),
        }
    }

    /// Snapshot of one label-value combination, or `None` if never
    /// observed.
    pub fn get(&self, values: &[&str]) -> Option<SummaryData> {
        let key = format_series(&self.label_names, values);
        let series = self.series.read();
        series.get(&key).map(|s| self.snapshot_series(&key, s))
    }

    /// Snapshot of every series.
    pub fn get_all(&self) -> Vec<SummaryData> {
        self.series
            .read()
            .iter()
            .map(|(key, s)| self.snapshot_series(key, s))
            .collect()
    }

    fn snapshot_series(&self, key: &str, series: &SummarySeries) -> SummaryData {
        SummaryData {
            labels: key.to_string(),
            sum: series.sum,
            count: series.count,
            quantiles: self
                .quantiles
                .iter()
                .map(|q| (q.quantile, rank_estimate(&series.samples, q.quantile)))
                .collect(),
        }
    }

    fn observe(&self, key: &str, value: f64) {
        let mut series = self.series.write();
        let entry = series.entry(key.to_string()).or_default();
        entry.sum += value;
        entry.count += 1;
        entry.samples.push(value);
    }
}

/// Observation handle for one summary series.
#[derive(Debug)]
pub struct SummarySink<'a> {
    summary: &'a Summary,
    key: String,
}

impl SummarySink<'_> {
    /// Record one observed value.
    pub fn observe(&self, value: f64) {
        self.summary.observe(&self.key, value);
    }
}

/// Summary snapshot for a single label combination.
#[derive(Debug, Clone)]
pub struct SummaryData {
    /// Series key (e.g. `method="GET",path="/items"`)
    pub labels: String,
    /// Sum of all observed values
    pub sum: f64,
    /// Number of observations
    pub count: u64,
    /// (quantile, estimate) pairs in declaration order
    pub quantiles: Vec<(f64, f64)>,
}

/// Nearest-rank quantile over the retained samples.
fn rank_estimate(samples: &[f64], quantile: f64) -> f64 {
    if samples.is_empty() {
        return f64::NAN;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let rank = ((sorted.len() as f64) * quantile).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_basic() {
        let counter = Counter::new(&["method"]);
        counter.labels(&["GET"]).inc();
        counter.labels(&["GET"]).inc();
        counter.labels(&["POST"]).inc();

        assert_eq!(counter.get(&["GET"]), 2);
        assert_eq!(counter.get(&["POST"]), 1);
        assert_eq!(counter.get(&["PUT"]), 0);
    }

    #[test]
    fn test_counter_inc_by() {
        let counter = Counter::new(&["status"]);
        let sink = counter.labels(&["200"]);
        sink.inc_by(10);
        sink.inc_by(5);
        assert_eq!(counter.get(&["200"]), 15);
    }

    #[test]
    fn test_counter_concurrent_increments_lose_nothing() {
        use std::sync::Arc;

        let counter = Arc::new(Counter::new(&["method"]));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = counter.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        counter.labels(&["GET"]).inc();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("counter thread panicked");
        }
        assert_eq!(counter.get(&["GET"]), 8000);
    }

    #[test]
    fn test_summary_sum_and_count() {
        let summary = Summary::new(&["query"], DEFAULT_LATENCY_QUANTILES);
        let sink = summary.labels(&["select 1"]);
        sink.observe(0.1);
        sink.observe(0.3);

        let data = summary.get(&["select 1"]).expect("series exists");
        assert_eq!(data.count, 2);
        assert!((data.sum - 0.4).abs() < 1e-9);
        assert!(summary.get(&["select 2"]).is_none());
    }

    #[test]
    fn test_summary_quantiles() {
        let summary = Summary::new(&[], DEFAULT_LATENCY_QUANTILES);
        let sink = summary.labels(&[]);
        for i in 1..=100 {
            sink.observe(i as f64);
        }

        let data = summary.get(&[]).expect("series exists");
        let estimates: std::collections::HashMap<_, _> = data
            .quantiles
            .iter()
            .map(|(q, v)| (format!("{q}"), *v))
            .collect();
        assert_eq!(estimates["0.5"], 50.0);
        assert_eq!(estimates["0.9"], 90.0);
        assert_eq!(estimates["0.99"], 99.0);
    }

    #[test]
    fn test_summary_single_observation() {
        let summary = Summary::new(&[], DEFAULT_LATENCY_QUANTILES);
        summary.labels(&[]).observe(0.25);

        let data = summary.get(&[]).expect("series exists");
        for (_, estimate) in data.quantiles {
            assert_eq!(estimate, 0.25);
        }
    }

    #[test]
    fn test_series_formatting() {
        let names = vec!["method".to_string(), "path".to_string()];
        assert_eq!(
            format_series(&names, &["GET", "/items"]),
            "method=\"GET\",path=\"/items\""
        );
        assert_eq!(format_series(&[], &[]), "");
    }

    #[test]
    fn test_series_escapes_free_form_values() {
        let names = vec!["query".to_string()];
        assert_eq!(
            format_series(&names, &["select \"a\\b\"\nfrom t"]),
            "query=\"select \\\"a\\\\b\\\"\\nfrom t\""
        );
    }
}
