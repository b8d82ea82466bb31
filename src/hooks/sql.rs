//! SQL statement instrumentation
//!
//! Counts and times every statement execution and preparation made
//! through the wrapped data-access layer, labeled by the inbound request
//! that triggered it and by the normalized query text:
//!
//! - `sql_queries_total{method, path, query}`: counter
//! - `sql_query_duration{method, path, query}`: quantile summary,
//!   in seconds
//!
//! The `method` and `path` labels come from the ambient
//! [`HttpContext`]; calls outside any tracked request land in the
//! `"no http context"` series. The `query` label is the statement text
//! with `values (...)` literal lists collapsed, keeping cardinality
//! bounded.
//!
//! Failed statements are recorded the same as successful ones: the
//! counter and the duration summary reflect every attempt, so error
//! storms stay visible in the rate and latency series.

use crate::advice::{CallArg, CallInvocation, CallOutcome, CallShape, CallState, Hook, ParamKind};
use crate::context::{ContextKey, HttpContext};
use crate::metrics::{
    Counter, CounterDef, MetricsStore, Summary, SummaryDef, DEFAULT_LATENCY_QUANTILES,
};
use crate::normalize::strip_values;
use std::sync::Arc;
use std::time::Instant;

const SQL_QUERIES_TOTAL: CounterDef = CounterDef::new(
    "sql_queries_total",
    "Total number of sql queries.",
    &["method", "path", "query"],
);

const SQL_QUERY_DURATION: SummaryDef = SummaryDef::new(
    "sql_query_duration",
    "Duration for serving the sql queries in seconds.",
    &["method", "path", "query"],
    DEFAULT_LATENCY_QUANTILES,
);

static TARGETS: &[&str] = &["Statement", "Connection"];

use ParamKind::{Int, IntList, Str, StrList};

/// Every instrumented overload. All of them lead with the SQL text; the
/// trailing arguments (generated-key flags, column indexes/names,
/// result-set options) carry nothing instrumentation-relevant.
static SHAPES: &[CallShape] = &[
    CallShape::new("execute", &[Str]),
    CallShape::new("executeQuery", &[Str]),
    CallShape::new("executeUpdate", &[Str]),
    CallShape::new("executeLargeUpdate", &[Str]),
    CallShape::new("prepareStatement", &[Str]),
    CallShape::new("prepareCall", &[Str]),
    // generated-keys flag
    CallShape::new("execute", &[Str, Int]),
    CallShape::new("executeUpdate", &[Str, Int]),
    CallShape::new("executeLargeUpdate", &[Str, Int]),
    CallShape::new("prepareStatement", &[Str, Int]),
    // column indexes
    CallShape::new("execute", &[Str, IntList]),
    CallShape::new("executeUpdate", &[Str, IntList]),
    CallShape::new("executeLargeUpdate", &[Str, IntList]),
    CallShape::new("prepareStatement", &[Str, IntList]),
    // column names
    CallShape::new("execute", &[Str, StrList]),
    CallShape::new("executeUpdate", &[Str, StrList]),
    CallShape::new("executeLargeUpdate", &[Str, StrList]),
    CallShape::new("prepareStatement", &[Str, StrList]),
    // result-set type and concurrency
    CallShape::new("prepareStatement", &[Str, Int, Int]),
    CallShape::new("prepareCall", &[Str, Int, Int]),
    // result-set type, concurrency, and holdability
    CallShape::new("prepareStatement", &[Str, Int, Int, Int]),
    CallShape::new("prepareCall", &[Str, Int, Int, Int]),
];

/// Hook instrumenting statement execution and preparation on the
/// `Statement` and `Connection` target types.
///
/// Instances are immutable and safe to share across concurrent calls;
/// the start timestamp travels as per-call state from `before` to
/// `after`, never through the hook itself. Many instances may exist (one
/// per intercepted type); they all resolve to the same two metrics
/// through the store.
pub struct SqlHook {
    queries_total: Arc<Counter>,
    query_duration: Arc<Summary>,
}

impl SqlHook {
    /// Resolve the hook's metrics against `store`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MetricShapeMismatch`](crate::ConfigError) if
    /// another component already claimed one of the metric names with a
    /// different shape.
    pub fn new(store: &MetricsStore) -> crate::error::Result<Self> {
        Ok(Self {
            queries_total: store.create_or_get_counter(&SQL_QUERIES_TOTAL)?,
            query_duration: store.create_or_get_summary(&SQL_QUERY_DURATION)?,
        })
    }
}

impl Hook for SqlHook {
    fn targets(&self) -> &'static [&'static str] {
        TARGETS
    }

    fn shapes(&self) -> &'static [CallShape] {
        SHAPES
    }

    fn before(&self, _call: &CallInvocation<'_>) -> Option<CallState> {
        Some(Box::new(Instant::now()))
    }

    fn after(
        &self,
        call: &CallInvocation<'_>,
        state: Option<CallState>,
        _outcome: &CallOutcome<'_>,
    ) {
        let Some(sql) = call.args.first().and_then(CallArg::as_str) else {
            return;
        };

        let method = HttpContext::get_or_absent(ContextKey::HttpMethod);
        let path = HttpContext::get_or_absent(ContextKey::HttpPath);
        let query = strip_values(sql);
        let labels = [method.as_str(), path.as_str(), query.as_ref()];

        self.queries_total.labels(&labels).inc();
        if let Some(started) = state.and_then(|s| s.downcast::<Instant>().ok()) {
            self.query_duration
                .labels(&labels)
                .observe(started.elapsed().as_secs_f64());
        }
    }
}
