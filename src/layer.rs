//! Axum integration
//!
//! The instrumentation core never learns about HTTP by itself: the
//! serving layer has to establish the ambient request context that
//! data-access hooks later read. This module is that glue for axum
//! applications:
//!
//! - [`http_context_middleware`] opens an [`HttpContext`] scope per
//!   request, seeded with the request method and path. Everything the
//!   handler calls (including instrumented data-access code on the same
//!   task) sees those values; the scope dies with the request.
//! - [`metrics_handler`] serves the Prometheus exposition of a
//!   [`MetricsStore`].
//! - [`InstrumentedRouter`] wires both onto any `axum::Router` in one
//!   call each.
//!
//! # Example
//!
//! ```ignore
//! use axum::{routing::get, Router};
//! use std::sync::Arc;
//! use tollgate::{InstrumentedRouter, MetricsStore};
//!
//! let store = Arc::new(MetricsStore::new());
//! let app = Router::new()
//!     .route("/items", get(list_items))
//!     .with_http_context()
//!     .with_metrics_endpoint(store.clone())
//!     .with_request_tracing();
//! ```

use crate::context::{ContextKey, HttpContext};
use crate::metrics::{MetricsStore, PrometheusExport};
use axum::{
    extract::Request,
    http::StatusCode,
    middleware,
    middleware::Next,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Middleware that scopes the ambient [`HttpContext`] to one request.
///
/// The request's method and path are set before the inner service runs,
/// so any instrumentation reached from the handler can label its metrics
/// with them. Each request gets an isolated scope; concurrent requests
/// never observe each other's values, and the scope is torn down when
/// the response (or an error) leaves this layer.
pub async fn http_context_middleware(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    HttpContext::scope(async move {
        HttpContext::set(ContextKey::HttpMethod, method);
        HttpContext::set(ContextKey::HttpPath, path);
        next.run(request).await
    })
    .await
}

/// Handler for the metrics endpoint, exporting Prometheus text format.
pub async fn metrics_handler(store: Arc<MetricsStore>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        store.export_prometheus(),
    )
}

/// Extension trait wiring the instrumentation glue onto an axum Router.
pub trait InstrumentedRouter {
    /// Establish the ambient [`HttpContext`] for every request.
    fn with_http_context(self) -> Self;

    /// Serve the Prometheus exposition of `store` at `/metrics`.
    fn with_metrics_endpoint(self, store: Arc<MetricsStore>) -> Self;

    /// Serve the Prometheus exposition of `store` at a custom path.
    fn with_metrics_endpoint_at(self, store: Arc<MetricsStore>, path: &str) -> Self;

    /// Basic HTTP request tracing via tower-http.
    fn with_request_tracing(self) -> Self;
}

impl<S> InstrumentedRouter for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_http_context(self) -> Self {
        self.layer(middleware::from_fn(http_context_middleware))
    }

    fn with_metrics_endpoint(self, store: Arc<MetricsStore>) -> Self {
        self.with_metrics_endpoint_at(store, "/metrics")
    }

    fn with_metrics_endpoint_at(self, store: Arc<MetricsStore>, path: &str) -> Self {
        self.route(path, get(move || metrics_handler(store.clone())))
    }

    fn with_request_tracing(self) -> Self {
        self.layer(TraceLayer::new_for_http())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NO_HTTP_CONTEXT;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use tower::ServiceExt;

    async fn context_echo() -> String {
        format!(
            "{} {}",
            HttpContext::get_or_absent(ContextKey::HttpMethod),
            HttpContext::get_or_absent(ContextKey::HttpPath),
        )
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_handler_sees_request_context() {
        let app = Router::new()
            .route("/echo", get(context_echo))
            .with_http_context();

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/echo")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "GET /echo");
    }

    #[tokio::test]
    async fn test_without_middleware_context_is_absent() {
        let app = Router::new().route("/echo", get(context_echo));

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/echo")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            body_string(response).await,
            format!("{NO_HTTP_CONTEXT} {NO_HTTP_CONTEXT}")
        );
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        use crate::metrics::CounterDef;

        const QUERIES: CounterDef = CounterDef::new(
            "sql_queries_total",
            "Total number of sql queries.",
            &["method", "path", "query"],
        );

        let store = Arc::new(MetricsStore::new());
        let counter = store.create_or_get_counter(&QUERIES).unwrap();
        counter.labels(&["GET", "/items", "select 1"]).inc();

        let app = Router::new().with_metrics_endpoint(store.clone());

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert_eq!(content_type, "text/plain; charset=utf-8");

        let body = body_string(response).await;
        assert!(body.contains("# TYPE sql_queries_total counter"));
        assert!(body.contains(
            "sql_queries_total{method=\"GET\",path=\"/items\",query=\"select 1\"} 1"
        ));
    }

    #[tokio::test]
    async fn test_request_to_exposition_round_trip() {
        use crate::advice::{CallArg, CallInvocation, Dispatcher};
        use crate::hooks::SqlHook;

        let store = Arc::new(MetricsStore::new());
        let dispatcher = Arc::new(
            Dispatcher::builder()
                .register(Arc::new(SqlHook::new(&store).unwrap()))
                .build()
                .unwrap(),
        );

        // Handler that reaches the instrumented data-access layer.
        let list_items = {
            let dispatcher = dispatcher.clone();
            move || async move {
                let args = [CallArg::Str("select * from items")];
                let call = CallInvocation::new("Statement", "executeQuery", &args);
                let rows: Result<u32, std::io::Error> = dispatcher.around(&call, || Ok(3));
                format!("{} rows", rows.unwrap())
            }
        };

        let app = Router::new()
            .route("/items", get(list_items))
            .with_http_context()
            .with_metrics_endpoint(store.clone());

        let response = app
            .clone()
            .oneshot(
                HttpRequest::builder()
                    .uri("/items")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_string(response).await, "3 rows");

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_string(response).await;
        assert!(body.contains(
            "sql_queries_total{method=\"GET\",path=\"/items\",query=\"select * from items\"} 1"
        ));
        assert!(body.contains("sql_query_duration_count"));
    }

    #[tokio::test]
    async fn test_metrics_endpoint_custom_path() {
        let store = Arc::new(MetricsStore::new());
        let app = Router::new().with_metrics_endpoint_at(store, "/internal/metrics");

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/internal/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
