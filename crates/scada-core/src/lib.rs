//! Core process-state types for the SCADA monitor client.
//!
//! This crate provides the data model shared by every other crate:
//! - `Snapshot`: full dashboard status (lines, counters, uptime)
//! - `ProcessLine`, `SensorReading`: monitored equipment and readings
//! - `AlarmEvent`, `IncidentEvent`, `SensorUpdate`: push-channel payloads
//! - Display helpers used by view collaborators (uptime, badges, icons)
//!
//! Decoding is lenient: missing or malformed fields become zero/empty and
//! unknown status strings map to an `Unknown` variant instead of failing.

pub mod decode;
pub mod display;
pub mod error;
pub mod event;
pub mod types;

pub use display::{format_uptime, sensor_icon};
pub use error::{CoreError, Result};
pub use event::{AlarmEvent, IncidentEvent, SensorUpdate, Severity};
pub use types::{LineMetrics, LineStatus, ProcessLine, SensorReading, SensorStatus, Snapshot};
