//! Structured logging initialization.
//!
//! Output format and filter come from the environment because logging starts
//! before the config file is read:
//! - `SCADA_LOG_FORMAT`: `pretty`, `compact` or `json`
//! - `SCADA_LOG`, then `RUST_LOG`: `EnvFilter` directives
//!
//! Without `SCADA_LOG_FORMAT`, `RUST_ENV=production` selects JSON.

use std::str::FromStr;

use crate::error::{TelemetryError, TelemetryResult};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither `SCADA_LOG` nor `RUST_LOG` is set.
pub const DEFAULT_FILTER: &str =
    "info,scada_monitor=debug,scada_dashboard=debug,scada_transport=debug";

pub const FORMAT_VAR: &str = "SCADA_LOG_FORMAT";
pub const FILTER_VAR: &str = "SCADA_LOG";

/// Log line layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Multi-line, for a terminal.
    #[default]
    Pretty,
    /// One line per event.
    Compact,
    /// One JSON object per event, for log shipping.
    Json,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(TelemetryError::LoggingInit(format!(
                "unknown log format '{other}' (expected pretty, compact or json)"
            ))),
        }
    }
}

/// Resolved logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub format: LogFormat,
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: DEFAULT_FILTER.to_string(),
        }
    }
}

impl LogSettings {
    /// Read settings from the process environment.
    pub fn from_env() -> TelemetryResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> TelemetryResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let format = match lookup(FORMAT_VAR).filter(|v| !v.trim().is_empty()) {
            Some(raw) => raw.parse()?,
            None if lookup("RUST_ENV").as_deref() == Some("production") => LogFormat::Json,
            None => LogFormat::default(),
        };

        let filter = [FILTER_VAR, "RUST_LOG"]
            .into_iter()
            .find_map(|key| lookup(key).filter(|v| !v.trim().is_empty()))
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());

        Ok(Self { format, filter })
    }

    /// Parse the filter directives. Invalid directives are an error rather than
    /// being silently dropped.
    pub fn env_filter(&self) -> TelemetryResult<EnvFilter> {
        EnvFilter::try_new(&self.filter).map_err(|e| {
            TelemetryError::LoggingInit(format!("invalid filter '{}': {e}", self.filter))
        })
    }
}

/// Install the global subscriber from environment settings.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging() -> TelemetryResult<LogSettings> {
    let settings = LogSettings::from_env()?;
    init_logging_with(&settings)?;
    Ok(settings)
}

/// Install the global subscriber with explicit settings.
pub fn init_logging_with(settings: &LogSettings) -> TelemetryResult<()> {
    let env_filter = settings.env_filter()?;
    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match settings.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_target(true))
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_names(true),
            )
            .try_init(),
    };

    result.map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}
