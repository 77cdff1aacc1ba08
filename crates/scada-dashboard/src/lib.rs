//! Dashboard state for the SCADA monitor.
//!
//! Provides:
//! - `DashboardStore`: the current snapshot plus recent events, replaced
//!   atomically on every change
//! - `UpdateMultiplexer`: the single consumer that merges push and poll
//!   updates in arrival order
//! - Alert and view collaborator traits with log-backed implementations

pub mod alerts;
pub mod config;
pub mod error;
pub mod multiplexer;
pub mod store;
pub mod types;
pub mod view;

pub use alerts::{Alert, AlertKind, AlertLevel, AlertSink, AlertWindow, LogAlertSink};
pub use config::DashboardConfig;
pub use error::{DashboardError, DashboardResult};
pub use multiplexer::{ApplyOutcome, RefreshHook, UpdateMultiplexer, UpdateSender};
pub use store::{DashboardStore, DEFAULT_RECENT_LIMIT};
pub use types::{DashboardUpdate, MergePolicy, ReceivedUpdate, UpdateSource};
pub use view::{LogView, ViewAdapter, ViewSync};
