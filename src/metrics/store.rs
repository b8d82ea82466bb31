//! MetricsStore - idempotent, shared metric registration
//!
//! Instrumentation hooks may be instantiated once per intercepted target
//! type, yet every instance must report into one shared metric. The store
//! is the keyed factory that makes that safe: the first caller for a
//! given metric name constructs the metric, every later caller with an
//! identical definition receives the identical handle, and a later caller
//! with a *different* definition under the same name is a configuration
//! error that fails fast at startup.
//!
//! # Example
//!
//! ```
//! use tollgate::{CounterDef, MetricsStore};
//!
//! const REQUESTS: CounterDef = CounterDef::new(
//!     "requests_total",
//!     "Total requests.",
//!     &["method"],
//! );
//!
//! let store = MetricsStore::new();
//! let a = store.create_or_get_counter(&REQUESTS).unwrap();
//! let b = store.create_or_get_counter(&REQUESTS).unwrap();
//!
//! a.labels(&["GET"]).inc();
//! assert_eq!(b.get(&["GET"]), 1); // same underlying metric
//! ```

use super::types::{Counter, Quantile, Summary};
use crate::error::{ConfigError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Declaration of a counter metric. Identity is the name.
#[derive(Debug, Clone)]
pub struct CounterDef {
    /// Metric name (e.g. `sql_queries_total`)
    pub name: &'static str,
    /// Help text for the exposition format
    pub help: &'static str,
    /// Label names
    pub labels: &'static [&'static str],
}

impl CounterDef {
    /// Const constructor so definitions can live next to the hook that
    /// records into them.
    pub const fn new(
        name: &'static str,
        help: &'static str,
        labels: &'static [&'static str],
    ) -> Self {
        Self { name, help, labels }
    }

    fn shape(&self) -> String {
        format!("counter{{{}}}", self.labels.join(","))
    }
}

/// Declaration of a quantile-summary metric. Identity is the name.
#[derive(Debug, Clone)]
pub struct SummaryDef {
    /// Metric name (e.g. `sql_query_duration`)
    pub name: &'static str,
    /// Help text for the exposition format
    pub help: &'static str,
    /// Label names
    pub labels: &'static [&'static str],
    /// Quantile targets with tolerated errors
    pub quantiles: &'static [Quantile],
}

impl SummaryDef {
    /// Const constructor so definitions can live next to the hook that
    /// records into them.
    pub const fn new(
        name: &'static str,
        help: &'static str,
        labels: &'static [&'static str],
        quantiles: &'static [Quantile],
    ) -> Self {
        Self {
            name,
            help,
            labels,
            quantiles,
        }
    }

    fn shape(&self) -> String {
        let quantiles = self
            .quantiles
            .iter()
            .map(|q| format!("{}±{}", q.quantile, q.error))
            .collect::<Vec<_>>()
            .join(",");
        format!("summary{{{}}} quantiles=[{quantiles}]", self.labels.join(","))
    }
}

/// Metric name and help text, as registered.
#[derive(Debug, Clone)]
pub struct MetricMeta {
    /// Metric name
    pub name: String,
    /// Help text
    pub help: String,
}

#[derive(Debug)]
enum Handle {
    Counter(Arc<Counter>),
    Summary(Arc<Summary>),
}

#[derive(Debug)]
struct Entry {
    help: String,
    shape: String,
    handle: Handle,
}

/// Keyed, idempotent factory for shared metric instances.
///
/// Safe to call from many concurrent intercepted calls; reads take the
/// read lock, only a first-time registration takes the write lock.
#[derive(Debug, Default)]
pub struct MetricsStore {
    metrics: RwLock<HashMap<String, Entry>>,
}

impl MetricsStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the shared counter registered under `def.name`, creating
    /// it on first use.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MetricShapeMismatch`] if the name is already
    /// registered with a different label set or as a different metric
    /// kind.
    pub fn create_or_get_counter(&self, def: &CounterDef) -> Result<Arc<Counter>> {
        let shape = def.shape();

        {
            let metrics = self.metrics.read();
            if let Some(entry) = metrics.get(def.name) {
                return existing_counter(def.name, entry, &shape);
            }
        }

        let mut metrics = self.metrics.write();
        // Double-checked: a racing registration may have won the lock.
        if let Some(entry) = metrics.get(def.name) {
            return existing_counter(def.name, entry, &shape);
        }

        let counter = Arc::new(Counter::new(def.labels));
        metrics.insert(
            def.name.to_string(),
            Entry {
                help: def.help.to_string(),
                shape,
                handle: Handle::Counter(counter.clone()),
            },
        );
        Ok(counter)
    }

    /// Return the shared summary registered under `def.name`, creating
    /// it on first use.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MetricShapeMismatch`] if the name is already
    /// registered with a different label set, different quantile spec,
    /// or as a different metric kind.
    pub fn create_or_get_summary(&self, def: &SummaryDef) -> Result<Arc<Summary>> {
        let shape = def.shape();

        {
            let metrics = self.metrics.read();
            if let Some(entry) = metrics.get(def.name) {
                return existing_summary(def.name, entry, &shape);
            }
        }

        let mut metrics = self.metrics.write();
        if let Some(entry) = metrics.get(def.name) {
            return existing_summary(def.name, entry, &shape);
        }

        let summary = Arc::new(Summary::new(def.labels, def.quantiles));
        metrics.insert(
            def.name.to_string(),
            Entry {
                help: def.help.to_string(),
                shape,
                handle: Handle::Summary(summary.clone()),
            },
        );
        Ok(summary)
    }

    /// Whether a counter is registered under `name`.
    pub fn has_counter(&self, name: &str) -> bool {
        matches!(
            self.metrics.read().get(name).map(|e| &e.handle),
            Some(Handle::Counter(_))
        )
    }

    /// Whether a summary is registered under `name`.
    pub fn has_summary(&self, name: &str) -> bool {
        matches!(
            self.metrics.read().get(name).map(|e| &e.handle),
            Some(Handle::Summary(_))
        )
    }

    /// All registered counters with their metadata.
    pub fn counters(&self) -> Vec<(MetricMeta, Arc<Counter>)> {
        self.metrics
            .read()
            .iter()
            .filter_map(|(name, entry)| match &entry.handle {
                Handle::Counter(counter) => Some((
                    MetricMeta {
                        name: name.clone(),
                        help: entry.help.clone(),
                    },
                    counter.clone(),
                )),
                Handle::Summary(_) => None,
            })
            .collect()
    }

    /// All registered summaries with their metadata.
    pub fn summaries(&self) -> Vec<(MetricMeta, Arc<Summary>)> {
        self.metrics
            .read()
            .iter()
            .filter_map(|(name, entry)| match &entry.handle {
                Handle::Summary(summary) => Some((
                    MetricMeta {
                        name: name.clone(),
                        help: entry.help.clone(),
                    },
                    summary.clone(),
                )),
                Handle::Counter(_) => None,
            })
            .collect()
    }
}

fn existing_counter(name: &str, entry: &Entry, requested_shape: &str) -> Result<Arc<Counter>> {
    match &entry.handle {
        Handle::Counter(counter) if entry.shape == requested_shape => Ok(counter.clone()),
        _ => Err(ConfigError::MetricShapeMismatch {
            name: name.to_string(),
            existing: entry.shape.clone(),
            requested: requested_shape.to_string(),
        }),
    }
}

fn existing_summary(name: &str, entry: &Entry, requested_shape: &str) -> Result<Arc<Summary>> {
    match &entry.handle {
        Handle::Summary(summary) if entry.shape == requested_shape => Ok(summary.clone()),
        _ => Err(ConfigError::MetricShapeMismatch {
            name: name.to_string(),
            existing: entry.shape.clone(),
            requested: requested_shape.to_string(),
        }),
    }
}
