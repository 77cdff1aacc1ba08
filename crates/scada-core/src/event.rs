//! Push-channel event payloads.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::decode::{self, value_to_string};
use crate::types::SensorStatus;

/// Alarm/incident severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
    #[default]
    Unknown,
}

impl Severity {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "LOW" => Self::Low,
            "MEDIUM" => Self::Medium,
            "HIGH" => Self::High,
            "CRITICAL" => Self::Critical,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
            Self::Unknown => "UNKNOWN",
        }
    }

    #[must_use]
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Critical)
    }

    /// Badge colour name used by incident lists.
    pub fn badge_color(&self) -> &'static str {
        match self {
            Self::Low => "blue",
            Self::Medium => "yellow",
            Self::High => "orange",
            Self::Critical => "red",
            Self::Unknown => "gray",
        }
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(value_to_string(&value)
            .map(|s| Self::parse(&s))
            .unwrap_or_default())
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One alarm from an `alarms` push batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmEvent {
    #[serde(default, deserialize_with = "decode::opt_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default, deserialize_with = "decode::string_or_empty")]
    pub message: String,
    /// Line id the alarm was raised on.
    #[serde(default, deserialize_with = "decode::string_or_empty")]
    pub line: String,
    #[serde(default, deserialize_with = "decode::opt_u64")]
    pub timestamp: Option<u64>,
}

impl AlarmEvent {
    /// Identity used to fire alert side effects at most once.
    ///
    /// Uses the server id when present, otherwise a content fingerprint.
    pub fn identity(&self) -> String {
        match &self.id {
            Some(id) => format!("alarm:{id}"),
            None => format!(
                "alarm:{}:{}:{}:{}",
                self.line,
                self.severity,
                self.message,
                self.timestamp.map(|t| t.to_string()).unwrap_or_default()
            ),
        }
    }
}

/// An incident created on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentEvent {
    #[serde(default, deserialize_with = "decode::opt_string")]
    pub id: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "decode::string_or_empty")]
    pub incident_type: String,
    #[serde(default, deserialize_with = "decode::string_or_empty")]
    pub line: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default, deserialize_with = "decode::opt_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "decode::opt_string")]
    pub equipment: Option<String>,
}

impl IncidentEvent {
    pub fn identity(&self) -> String {
        match &self.id {
            Some(id) => format!("incident:{id}"),
            None => format!(
                "incident:{}:{}:{}",
                self.line,
                self.incident_type,
                self.description.as_deref().unwrap_or_default()
            ),
        }
    }
}

/// A pushed sensor reading, keyed by sensor id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorUpdate {
    #[serde(default, deserialize_with = "decode::string_or_empty")]
    pub id: String,
    #[serde(default, deserialize_with = "decode::f64_or_zero")]
    pub value: f64,
    /// Unit, if the push carries one; otherwise the stored unit is kept.
    #[serde(default, deserialize_with = "decode::opt_string")]
    pub unit: Option<String>,
    #[serde(default)]
    pub status: Option<SensorStatus>,
}
