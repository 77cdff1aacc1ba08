//! Push-channel message types.
//!
//! Frames are JSON objects shaped `{ "type": <kind>, ...payload }`:
//!
//! | type        | payload field | contents                 |
//! |-------------|---------------|--------------------------|
//! | `sensors`   | `data`        | list of sensor readings  |
//! | `alarms`    | `data`        | latest alarm batch       |
//! | `incident`  | `incident`    | one created incident     |
//! | `emergency` | `message`     | broadcast text           |

use scada_core::decode;
use scada_core::{AlarmEvent, IncidentEvent, SensorUpdate};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{TransportError, TransportResult};

/// Message kind, used as the handler registry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Sensors,
    Alarms,
    Incident,
    Emergency,
    /// A kind outside the fixed taxonomy; still routable by name.
    Other(String),
}

impl MessageKind {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "sensors" => Self::Sensors,
            "alarms" => Self::Alarms,
            "incident" => Self::Incident,
            "emergency" => Self::Emergency,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Sensors => "sensors",
            Self::Alarms => "alarms",
            Self::Incident => "incident",
            Self::Emergency => "emergency",
            Self::Other(name) => name,
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed push message.
#[derive(Debug, Clone, PartialEq)]
pub enum PushMessage {
    Sensors(Vec<SensorUpdate>),
    Alarms(Vec<AlarmEvent>),
    Incident(IncidentEvent),
    Emergency(String),
    /// Unrecognised or untyped frame, passed through untouched.
    Other { kind: Option<String>, payload: Value },
}

#[derive(Deserialize)]
struct SensorsFrame {
    #[serde(default, deserialize_with = "decode::vec_skip_invalid")]
    data: Vec<SensorUpdate>,
}

#[derive(Deserialize)]
struct AlarmsFrame {
    #[serde(default, deserialize_with = "decode::vec_skip_invalid")]
    data: Vec<AlarmEvent>,
}

#[derive(Deserialize)]
struct IncidentFrame {
    #[serde(default)]
    incident: Option<IncidentEvent>,
}

#[derive(Deserialize)]
struct EmergencyFrame {
    #[serde(default, deserialize_with = "decode::string_or_empty")]
    message: String,
}

impl PushMessage {
    /// Parse one text frame.
    ///
    /// Returns `MalformedMessage` for invalid JSON, non-object frames and
    /// known kinds whose required payload is missing.
    pub fn parse(text: &str) -> TransportResult<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| TransportError::MalformedMessage(format!("invalid JSON: {e}")))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> TransportResult<Self> {
        if !value.is_object() {
            return Err(TransportError::MalformedMessage(
                "frame is not a JSON object".to_string(),
            ));
        }

        let kind = value
            .get("type")
            .and_then(|t| t.as_str())
            .map(MessageKind::parse);

        let malformed = |e: serde_json::Error| TransportError::MalformedMessage(e.to_string());

        match kind {
            Some(MessageKind::Sensors) => {
                let frame: SensorsFrame = serde_json::from_value(value).map_err(malformed)?;
                Ok(Self::Sensors(frame.data))
            }
            Some(MessageKind::Alarms) => {
                let frame: AlarmsFrame = serde_json::from_value(value).map_err(malformed)?;
                Ok(Self::Alarms(frame.data))
            }
            Some(MessageKind::Incident) => {
                let frame: IncidentFrame = serde_json::from_value(value).map_err(malformed)?;
                frame.incident.map(Self::Incident).ok_or_else(|| {
                    TransportError::MalformedMessage("incident frame without payload".to_string())
                })
            }
            Some(MessageKind::Emergency) => {
                let frame: EmergencyFrame = serde_json::from_value(value).map_err(malformed)?;
                Ok(Self::Emergency(frame.message))
            }
            Some(MessageKind::Other(name)) => Ok(Self::Other {
                kind: Some(name),
                payload: value,
            }),
            None => Ok(Self::Other {
                kind: None,
                payload: value,
            }),
        }
    }

    /// Kind used for handler dispatch. Untyped frames have none.
    pub fn kind(&self) -> Option<MessageKind> {
        match self {
            Self::Sensors(_) => Some(MessageKind::Sensors),
            Self::Alarms(_) => Some(MessageKind::Alarms),
            Self::Incident(_) => Some(MessageKind::Incident),
            Self::Emergency(_) => Some(MessageKind::Emergency),
            Self::Other { kind, .. } => kind.as_deref().map(MessageKind::parse),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scada_core::Severity;

    #[test]
    fn test_parse_sensors_frame() {
        let msg = PushMessage::parse(
            r#"{"type":"sensors","data":[{"id":"L1-T","value":74.1,"unit":"C","status":"high"}]}"#,
        )
        .unwrap();

        match msg {
            PushMessage::Sensors(readings) => {
                assert_eq!(readings.len(), 1);
                assert_eq!(readings[0].id, "L1-T");
                assert_eq!(readings[0].value, 74.1);
            }
            other => panic!("Expected sensors, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_alarms_frame() {
        let msg = PushMessage::parse(
            r#"{"type":"alarms","data":[{"severity":"LOW","message":"a","line":"L1"},{"severity":"CRITICAL","message":"b","line":"L2"}]}"#,
        )
        .unwrap();

        let PushMessage::Alarms(alarms) = msg else {
            panic!("Expected alarms");
        };
        assert_eq!(alarms.len(), 2);
        assert_eq!(alarms[1].severity, Severity::Critical);
    }

    #[test]
    fn test_parse_incident_and_emergency() {
        let msg = PushMessage::parse(
            r#"{"type":"incident","incident":{"id":"I1","type":"leak","line":"L4"}}"#,
        )
        .unwrap();
        assert_eq!(msg.kind(), Some(MessageKind::Incident));

        let msg = PushMessage::parse(r#"{"type":"emergency","message":"EVACUATE"}"#).unwrap();
        assert_eq!(msg, PushMessage::Emergency("EVACUATE".to_string()));
    }

    #[test]
    fn test_incident_without_payload_is_malformed() {
        let err = PushMessage::parse(r#"{"type":"incident"}"#).unwrap_err();
        assert!(matches!(err, TransportError::MalformedMessage(_)));
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let err = PushMessage::parse("{not json").unwrap_err();
        assert!(matches!(err, TransportError::MalformedMessage(_)));

        let err = PushMessage::parse("[1,2]").unwrap_err();
        assert!(matches!(err, TransportError::MalformedMessage(_)));
    }

    #[test]
    fn test_unknown_and_untyped_frames_pass_through() {
        let msg = PushMessage::parse(r#"{"type":"leaderboard","rows":[]}"#).unwrap();
        assert_eq!(
            msg.kind(),
            Some(MessageKind::Other("leaderboard".to_string()))
        );

        let msg = PushMessage::parse(r#"{"hello":"world"}"#).unwrap();
        assert_eq!(msg.kind(), None);
    }
}
