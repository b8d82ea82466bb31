//! Instrumentation configuration errors
//!
//! Everything in this crate that can fail does so at startup, while hooks
//! and metrics are being declared. Once a [`Dispatcher`](crate::Dispatcher)
//! is built and its metric handles exist, recording is infallible: an
//! observation is a single cheap local operation and must never abort the
//! host application's call path.
//!
//! Misconfiguration is therefore surfaced eagerly as a [`ConfigError`]
//! instead of being silently reconciled:
//! - two metric definitions sharing a name but disagreeing on label set,
//!   metric kind, or quantile spec would otherwise hand one call site a
//!   handle with the wrong shape;
//! - two identical advice bindings in one hook would otherwise run the
//!   same canonical handler twice per call.

use thiserror::Error;

/// Errors raised while declaring hooks and metrics.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A metric name was registered twice with structurally different
    /// definitions (label names, metric kind, or quantile spec).
    #[error("metric `{name}` already registered as {existing}, requested {requested}")]
    MetricShapeMismatch {
        /// The contested metric name
        name: String,
        /// Shape of the definition that won the registration
        existing: String,
        /// Shape of the rejected definition
        requested: String,
    },

    /// One hook declared the same (target, method, parameter shape)
    /// binding more than once.
    #[error("ambiguous advice binding: `{target}.{method}({shape})` declared twice by one hook")]
    AmbiguousBinding {
        /// Target type of the duplicate binding
        target: String,
        /// Method name of the duplicate binding
        method: String,
        /// Rendered parameter shape of the duplicate binding
        shape: String,
    },
}

/// Result type alias for startup configuration.
pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_display() {
        let err = ConfigError::MetricShapeMismatch {
            name: "sql_queries_total".to_string(),
            existing: "counter{method,path,query}".to_string(),
            requested: "counter{method,path}".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("sql_queries_total"));
        assert!(msg.contains("counter{method,path,query}"));
        assert!(msg.contains("counter{method,path}"));
    }

    #[test]
    fn test_ambiguous_binding_display() {
        let err = ConfigError::AmbiguousBinding {
            target: "Statement".to_string(),
            method: "execute".to_string(),
            shape: "str".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "ambiguous advice binding: `Statement.execute(str)` declared twice by one hook"
        );
    }
}
