//! # Tollgate
//!
//! Call-level instrumentation for Axum applications: every statement the
//! application sends through its data-access layer is counted and timed,
//! without the application being aware of the instrumentation.
//!
//! The crate provides the interception/advice core that every such hook
//! relies on:
//!
//! - **Advice dispatch**: hooks declare target types and method-overload
//!   shapes as a static table; the [`Dispatcher`] runs their before/after
//!   advice around each intercepted call, threading per-call state so
//!   shared hook instances stay race-free
//! - **Idempotent metric store**: [`MetricsStore`] hands every caller of
//!   a metric name the same shared instance, and fails fast on
//!   conflicting definitions
//! - **Ambient request context**: [`HttpContext`] carries the inbound
//!   request's method and path to instrumentation running many call
//!   frames deeper, scoped per request, isolated between concurrent ones
//! - **Label normalization**: [`strip_values`] collapses `values (...)`
//!   literal lists so metric label cardinality stays bounded
//! - **SQL hook**: [`SqlHook`] instruments statement execution and
//!   preparation, emitting `sql_queries_total` and `sql_query_duration`
//!   labeled by `{method, path, query}`
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use tollgate::{
//!     CallArg, CallInvocation, Dispatcher, HttpContext, MetricsStore,
//!     PrometheusExport, SqlHook, ContextKey,
//! };
//!
//! // Shared store; hooks resolve their metrics through it.
//! let store = Arc::new(MetricsStore::new());
//! let dispatcher = Dispatcher::builder()
//!     .register(Arc::new(SqlHook::new(&store).unwrap()))
//!     .build()
//!     .unwrap();
//!
//! // The host's interception point reports each call through `around`.
//! HttpContext::sync_scope(|| {
//!     HttpContext::set(ContextKey::HttpMethod, "GET");
//!     HttpContext::set(ContextKey::HttpPath, "/items");
//!
//!     let args = [CallArg::Str("select * from items")];
//!     let call = CallInvocation::new("Statement", "executeQuery", &args);
//!     let _rows: Result<u32, std::io::Error> =
//!         dispatcher.around(&call, || Ok(42));
//! });
//!
//! assert!(store.export_prometheus().contains("sql_queries_total"));
//! ```
//!
//! For axum applications, [`InstrumentedRouter`] establishes the request
//! context per inbound request and serves the `/metrics` exposition.

mod advice;
mod context;
mod error;
mod hooks;
mod layer;
pub mod metrics;
mod normalize;
pub mod telemetry;

// Re-exports
pub use advice::{
    CallArg, CallInvocation, CallOutcome, CallShape, CallState, Dispatcher, DispatcherBuilder,
    Hook, ParamKind,
};
pub use context::{ContextKey, HttpContext, NO_HTTP_CONTEXT};
pub use error::{ConfigError, Result};
pub use hooks::SqlHook;
pub use layer::{http_context_middleware, metrics_handler, InstrumentedRouter};
pub use metrics::{
    Counter, CounterDef, MetricsStore, PrometheusExport, Quantile, Summary, SummaryDef,
};
pub use normalize::strip_values;
pub use telemetry::{LogFormat, TelemetryConfig};
