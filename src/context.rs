//! Ambient request context
//!
//! Instrumentation that runs deep inside a data-access call needs to know
//! which inbound request it belongs to, without that information being
//! threaded through every intermediate call signature. This module is the
//! crate's context propagator: a task-scoped key/value store that the
//! request-handling layer populates once and any nested code can read.
//!
//! The store is **not** global mutable state. Each logical unit of work
//! (one inbound request, one test body) runs inside its own
//! [`HttpContext::scope`] / [`HttpContext::sync_scope`], backed by a
//! `tokio::task_local!`. Concurrent units never observe each other's
//! values, and the context is torn down deterministically when the scope
//! exits, on error and panic paths included.
//!
//! # Usage
//!
//! ```
//! use tollgate::{ContextKey, HttpContext};
//!
//! let path = HttpContext::sync_scope(|| {
//!     HttpContext::set(ContextKey::HttpPath, "/items");
//!     HttpContext::get(ContextKey::HttpPath)
//! });
//! assert_eq!(path.as_deref(), Some("/items"));
//!
//! // Outside any scope: absent, never a stale value.
//! assert_eq!(HttpContext::get(ContextKey::HttpPath), None);
//! ```
//!
//! For axum applications, [`http_context_middleware`](crate::layer) opens
//! the scope per request and seeds the method and path.

use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;

tokio::task_local! {
    static CURRENT: RefCell<HashMap<ContextKey, String>>;
}

/// Label value recorded when a call happens outside any tracked request.
///
/// Metrics stay well-formed for such calls; they simply land in this
/// sentinel series instead of being dropped.
pub const NO_HTTP_CONTEXT: &str = "no http context";

/// Well-known ambient context keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKey {
    /// HTTP method of the inbound request (e.g. `GET`)
    HttpMethod,
    /// HTTP path of the inbound request (e.g. `/items`)
    HttpPath,
}

/// Ambient per-request key/value store.
///
/// All methods are associated functions: the context travels with the
/// current task, not with any value the caller holds.
pub struct HttpContext;

impl HttpContext {
    /// Run `fut` inside a fresh, isolated context scope.
    ///
    /// Values set while the future runs are visible to everything it
    /// awaits or calls on the same task, and are dropped when the future
    /// completes (or is itself dropped).
    pub async fn scope<F>(fut: F) -> F::Output
    where
        F: Future,
    {
        CURRENT.scope(RefCell::new(HashMap::new()), fut).await
    }

    /// Synchronous variant of [`scope`](Self::scope) for plain call
    /// stacks and tests.
    pub fn sync_scope<R>(f: impl FnOnce() -> R) -> R {
        CURRENT.sync_scope(RefCell::new(HashMap::new()), f)
    }

    /// Set `key` for the remainder of the current unit of work.
    ///
    /// Outside any scope this is a no-op: instrumentation must never
    /// fail the host call path, and reads outside a scope already
    /// resolve to absent.
    pub fn set(key: ContextKey, value: impl Into<String>) {
        let value = value.into();
        let _ = CURRENT.try_with(|ctx| {
            ctx.borrow_mut().insert(key, value);
        });
    }

    /// Read `key` from the current unit of work.
    ///
    /// Returns `None` when the key was never set or when no scope is
    /// active, never a value from an unrelated unit of work.
    pub fn get(key: ContextKey) -> Option<String> {
        CURRENT
            .try_with(|ctx| ctx.borrow().get(&key).cloned())
            .ok()
            .flatten()
    }

    /// Read `key`, rendering absence as the [`NO_HTTP_CONTEXT`] sentinel.
    pub fn get_or_absent(key: ContextKey) -> String {
        Self::get(key).unwrap_or_else(|| NO_HTTP_CONTEXT.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_outside_scope_is_absent() {
        assert_eq!(HttpContext::get(ContextKey::HttpMethod), None);
        assert_eq!(
            HttpContext::get_or_absent(ContextKey::HttpMethod),
            NO_HTTP_CONTEXT
        );
    }

    #[test]
    fn test_set_outside_scope_is_noop() {
        HttpContext::set(ContextKey::HttpMethod, "GET");
        assert_eq!(HttpContext::get(ContextKey::HttpMethod), None);
    }

    #[test]
    fn test_set_and_get_within_scope() {
        HttpContext::sync_scope(|| {
            HttpContext::set(ContextKey::HttpMethod, "POST");
            HttpContext::set(ContextKey::HttpPath, "/items");
            assert_eq!(
                HttpContext::get(ContextKey::HttpMethod).as_deref(),
                Some("POST")
            );
            assert_eq!(
                HttpContext::get(ContextKey::HttpPath).as_deref(),
                Some("/items")
            );
        });
    }

    #[test]
    fn test_scope_teardown_is_deterministic() {
        HttpContext::sync_scope(|| {
            HttpContext::set(ContextKey::HttpPath, "/a");
        });
        // No stale value survives the scope.
        assert_eq!(HttpContext::get(ContextKey::HttpPath), None);
    }

    #[test]
    fn test_nested_calls_see_outer_scope() {
        fn deep_in_the_call_stack() -> String {
            HttpContext::get_or_absent(ContextKey::HttpPath)
        }

        let seen = HttpContext::sync_scope(|| {
            HttpContext::set(ContextKey::HttpPath, "/deep");
            deep_in_the_call_stack()
        });
        assert_eq!(seen, "/deep");
    }

    #[test]
    fn test_concurrent_scopes_are_isolated() {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                std::thread::spawn(move || {
                    HttpContext::sync_scope(|| {
                        let path = format!("/unit/{i}");
                        HttpContext::set(ContextKey::HttpPath, path.clone());
                        std::thread::sleep(std::time::Duration::from_millis(5));
                        assert_eq!(HttpContext::get(ContextKey::HttpPath), Some(path));
                    })
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("context thread panicked");
        }
    }

    #[tokio::test]
    async fn test_concurrent_tasks_are_isolated() {
        let tasks: Vec<_> = (0..8)
            .map(|i| {
                tokio::spawn(HttpContext::scope(async move {
                    let method = format!("M{i}");
                    HttpContext::set(ContextKey::HttpMethod, method.clone());
                    tokio::task::yield_now().await;
                    assert_eq!(HttpContext::get(ContextKey::HttpMethod), Some(method));
                }))
            })
            .collect();
        for task in tasks {
            task.await.expect("context task panicked");
        }
    }

    #[tokio::test]
    async fn test_value_survives_await_points() {
        HttpContext::scope(async {
            HttpContext::set(ContextKey::HttpMethod, "GET");
            tokio::task::yield_now().await;
            assert_eq!(
                HttpContext::get(ContextKey::HttpMethod).as_deref(),
                Some("GET")
            );
        })
        .await;
    }
}
