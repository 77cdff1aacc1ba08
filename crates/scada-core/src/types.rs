//! Process-state snapshot types.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::decode::{self, value_to_string};
use crate::error::{CoreError, Result};

// ============================================================================
// Status enums
// ============================================================================

/// Operating status of a production line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStatus {
    Running,
    Stopped,
    Warning,
    Alarm,
    /// Any value outside the known set. Rendered gray.
    #[default]
    Unknown,
}

impl LineStatus {
    /// Parse a status string (case-insensitive). Unknown values never fail.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "running" => Self::Running,
            "stopped" => Self::Stopped,
            "warning" => Self::Warning,
            "alarm" => Self::Alarm,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Warning => "warning",
            Self::Alarm => "alarm",
            Self::Unknown => "unknown",
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Badge colour name used by line cards.
    pub fn badge_color(&self) -> &'static str {
        match self {
            Self::Running => "green",
            Self::Warning => "yellow",
            Self::Alarm => "red",
            Self::Stopped | Self::Unknown => "gray",
        }
    }
}

impl<'de> Deserialize<'de> for LineStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(value_to_string(&value)
            .map(|s| Self::parse(&s))
            .unwrap_or_default())
    }
}

impl std::fmt::Display for LineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorStatus {
    Normal,
    High,
    Critical,
    Fault,
    #[default]
    Unknown,
}

impl SensorStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "normal" => Self::Normal,
            "high" => Self::High,
            "critical" => Self::Critical,
            "fault" => Self::Fault,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
            Self::Fault => "fault",
            Self::Unknown => "unknown",
        }
    }
}

impl<'de> Deserialize<'de> for SensorStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(value_to_string(&value)
            .map(|s| Self::parse(&s))
            .unwrap_or_default())
    }
}

impl std::fmt::Display for SensorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Snapshot entities
// ============================================================================

/// One sensor reading attached to a production line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Stable sensor id (patch key for pushed updates).
    #[serde(default, deserialize_with = "decode::string_or_empty")]
    pub id: String,
    /// Sensor type (e.g., "temperature", "pressure").
    #[serde(rename = "type", default, deserialize_with = "decode::string_or_empty")]
    pub sensor_type: String,
    #[serde(default, deserialize_with = "decode::f64_or_zero")]
    pub value: f64,
    #[serde(default, deserialize_with = "decode::string_or_empty")]
    pub unit: String,
    #[serde(default)]
    pub status: SensorStatus,
}

impl SensorReading {
    /// Value with unit suffix, as shown next to the sensor glyph.
    pub fn label(&self) -> String {
        format!("{}{}", format_value(self.value), self.unit)
    }
}

/// Production metrics in percent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LineMetrics {
    #[serde(default, deserialize_with = "decode::f64_or_zero")]
    pub output: f64,
    #[serde(default, deserialize_with = "decode::f64_or_zero")]
    pub efficiency: f64,
}

/// One monitored production line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessLine {
    #[serde(default, deserialize_with = "decode::string_or_empty")]
    pub id: String,
    #[serde(default, deserialize_with = "decode::string_or_empty")]
    pub name: String,
    #[serde(default)]
    pub status: LineStatus,
    #[serde(default, deserialize_with = "decode::or_default")]
    pub metrics: LineMetrics,
    /// Ordered readings; order is preserved across patches.
    #[serde(default, deserialize_with = "decode::vec_skip_invalid")]
    pub sensors: Vec<SensorReading>,
}

impl ProcessLine {
    /// First sensor, which the diagram shows on the sensor glyph.
    pub fn primary_sensor(&self) -> Option<&SensorReading> {
        self.sensors.first()
    }
}

/// Full dashboard status at one point in time.
///
/// Mirrors `GET /api/dashboard/status`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default, deserialize_with = "decode::vec_skip_invalid")]
    pub lines: Vec<ProcessLine>,
    #[serde(default, deserialize_with = "decode::u32_or_zero")]
    pub active_alarms: u32,
    #[serde(default, deserialize_with = "decode::u32_or_zero")]
    pub active_incidents: u32,
    #[serde(default, deserialize_with = "decode::u64_or_zero")]
    pub uptime_sec: u64,
    /// Server-side monotonic version, when the server provides one.
    #[serde(
        default,
        deserialize_with = "decode::opt_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<u64>,
}

impl Snapshot {
    /// Decode a snapshot from an already-parsed JSON value.
    ///
    /// Only a non-object payload is rejected; everything inside is lenient.
    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(CoreError::InvalidSnapshot(format!(
                "expected object, got {}",
                json_kind(&value)
            )));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Decode a snapshot from raw JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Look up a line by id.
    pub fn line(&self, id: &str) -> Option<&ProcessLine> {
        self.lines.iter().find(|l| l.id == id)
    }

    /// Whether any line carries a sensor with this id.
    pub fn has_sensor(&self, sensor_id: &str) -> bool {
        self.lines
            .iter()
            .any(|l| l.sensors.iter().any(|s| s.id == sensor_id))
    }

    pub fn running_lines(&self) -> usize {
        self.lines.iter().filter(|l| l.status.is_running()).count()
    }
}

/// Format a reading without a trailing `.0` for whole numbers.
fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
