//! Shared Metrics Infrastructure
//!
//! The metric-correlation half of the crate:
//! - [`MetricsStore`]: a keyed, idempotent factory. Many hook instances
//!   (one per intercepted type) all resolve to one shared metric per name
//! - [`Counter`] and [`Summary`]: thread-safe primitives recorded into
//!   from concurrently intercepted calls
//! - Prometheus text exposition via [`export_prometheus`] /
//!   [`PrometheusExport`]
//!
//! # Quick Start
//!
//! ```
//! use tollgate::{CounterDef, MetricsStore, PrometheusExport};
//!
//! const QUERIES: CounterDef = CounterDef::new(
//!     "sql_queries_total",
//!     "Total number of sql queries.",
//!     &["method", "path", "query"],
//! );
//!
//! let store = MetricsStore::new();
//! let queries = store.create_or_get_counter(&QUERIES).unwrap();
//! queries.labels(&["GET", "/items", "select * from t"]).inc();
//!
//! let exposition = store.export_prometheus();
//! assert!(exposition.contains("sql_queries_total"));
//! ```

mod prometheus;
mod store;
mod types;

// Core types
pub use store::{CounterDef, MetricMeta, MetricsStore, SummaryDef};
pub use types::{Counter, CounterSink, Quantile, Summary, SummaryData, SummarySink};

// Quantile constants
pub use types::DEFAULT_LATENCY_QUANTILES;

// Prometheus export
pub use prometheus::{export_prometheus, PrometheusExport};
