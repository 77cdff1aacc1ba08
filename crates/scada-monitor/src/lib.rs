//! Headless SCADA monitor.
//!
//! Wires the dashboard pipeline together:
//! - Initial status fetch, then push channel plus status polling
//! - Update multiplexer merging both into the dashboard store
//! - Log-backed view and alert sinks
//! - Animated diagram frame loop with optional SVG export

pub mod app;
pub mod config;
pub mod error;

pub use app::{Application, NotifyingCredentials};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
