//! Logging initialization
//!
//! The crate's own code logs through the standard `tracing` macros and
//! does not know how the subscriber was configured. Applications call
//! [`init`] once at startup; everything after that is provider-agnostic.
//!
//! # Usage
//!
//! ```ignore
//! use tollgate::telemetry::{self, TelemetryConfig};
//!
//! // From environment variables (LOG_FORMAT, RUST_LOG)
//! telemetry::init(TelemetryConfig::from_env())?;
//!
//! // Or programmatically
//! let config = TelemetryConfig::builder()
//!     .log_format(LogFormat::Json)
//!     .log_filter("info,tollgate=debug")
//!     .build();
//! telemetry::init(config)?;
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format
#[derive(Debug, Clone, Default)]
pub enum LogFormat {
    /// Human-readable format for development
    #[default]
    Pretty,
    /// JSON format for production/log aggregation
    Json,
    /// Compact single-line format
    Compact,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Log output format
    pub log_format: LogFormat,
    /// Log level filter (e.g. "info", "info,tollgate=debug")
    pub log_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            log_filter: "info".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `LOG_FORMAT`: "pretty", "json", or "compact" (default: "pretty")
    /// - `RUST_LOG`: log filter directive (default: "info")
    pub fn from_env() -> Self {
        let log_format = match std::env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("compact") => LogFormat::Compact,
            _ => LogFormat::Pretty,
        };

        let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Self {
            log_format,
            log_filter,
        }
    }

    /// Create a new configuration builder
    pub fn builder() -> TelemetryConfigBuilder {
        TelemetryConfigBuilder::default()
    }
}

/// Builder for TelemetryConfig
#[derive(Default)]
pub struct TelemetryConfigBuilder {
    config: TelemetryConfig,
}

impl TelemetryConfigBuilder {
    /// Set the log format
    pub fn log_format(mut self, format: LogFormat) -> Self {
        self.config.log_format = format;
        self
    }

    /// Set the log filter
    pub fn log_filter(mut self, filter: impl Into<String>) -> Self {
        self.config.log_filter = filter.into();
        self
    }

    /// Build the configuration
    pub fn build(self) -> TelemetryConfig {
        self.config
    }
}

/// Telemetry initialization errors
#[derive(Debug)]
pub enum TelemetryError {
    /// Invalid configuration
    Config(String),
    /// Subscriber installation failed
    Subscriber(String),
}

impl std::fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "Telemetry config error: {}", msg),
            Self::Subscriber(msg) => write!(f, "Subscriber error: {}", msg),
        }
    }
}

impl std::error::Error for TelemetryError {}

/// Initialize the tracing subscriber.
///
/// Must be called once at application startup, before any logging
/// occurs. `RUST_LOG` in the process environment wins over the
/// configured filter.
///
/// # Errors
///
/// Returns an error if the filter directive is invalid or a global
/// subscriber is already installed.
pub fn init(config: TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .map_err(|e| TelemetryError::Config(format!("Invalid log filter: {}", e)))?;

    let subscriber = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Pretty => {
            subscriber
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .try_init()
                .map_err(|e| {
                    TelemetryError::Subscriber(format!("Failed to init tracing: {}", e))
                })?;
        }
        LogFormat::Json => {
            subscriber
                .with(fmt::layer().json().with_target(true))
                .try_init()
                .map_err(|e| {
                    TelemetryError::Subscriber(format!("Failed to init tracing: {}", e))
                })?;
        }
        LogFormat::Compact => {
            subscriber
                .with(fmt::layer().compact().with_target(true))
                .try_init()
                .map_err(|e| {
                    TelemetryError::Subscriber(format!("Failed to init tracing: {}", e))
                })?;
        }
    }

    tracing::info!(
        log_format = ?config.log_format,
        log_filter = %config.log_filter,
        "Telemetry initialized"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert!(matches!(config.log_format, LogFormat::Pretty));
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_builder() {
        let config = TelemetryConfig::builder()
            .log_format(LogFormat::Json)
            .log_filter("debug")
            .build();

        assert!(matches!(config.log_format, LogFormat::Json));
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn test_error_display() {
        let err = TelemetryError::Config("bad directive".to_string());
        assert_eq!(err.to_string(), "Telemetry config error: bad directive");
    }
}
