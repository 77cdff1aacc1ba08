//! Prometheus metrics and structured logging for the SCADA monitor.
//!
//! - Structured logging with tracing, format and filter from `SCADA_LOG_FORMAT`
//!   and `SCADA_LOG`
//! - Prometheus metrics for the push channel, request retries, polling,
//!   store updates, alerts and the diagram frame loop

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, init_logging_with, LogFormat, LogSettings};
pub use metrics::Metrics;
