//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(#[from] scada_transport::TransportError),

    #[error("Dashboard error: {0}")]
    Dashboard(#[from] scada_dashboard::DashboardError),

    #[error("Diagram error: {0}")]
    Diagram(#[from] scada_diagram::DiagramError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] scada_telemetry::TelemetryError),

    #[error("Session rejected by server")]
    Unauthorized,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
