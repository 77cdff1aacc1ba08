//! Update envelope types shared by the multiplexer and its producers.

use chrono::{DateTime, Utc};
use scada_core::{AlarmEvent, IncidentEvent, SensorUpdate, Snapshot};
use scada_transport::PushMessage;
use serde::{Deserialize, Serialize};

/// Which channel delivered an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateSource {
    Push,
    Poll,
}

impl UpdateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Poll => "poll",
        }
    }
}

/// How full snapshots from different channels are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Last applied wins, in queue arrival order.
    #[default]
    ArrivalOrder,
    /// Reject a snapshot whose version is older than the stored one.
    /// Snapshots without a version are always accepted.
    Versioned,
}

/// One state change for the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardUpdate {
    Snapshot(Snapshot),
    Sensors(Vec<SensorUpdate>),
    Alarms(Vec<AlarmEvent>),
    Incident(IncidentEvent),
    Emergency(String),
}

impl DashboardUpdate {
    /// Map a push message onto an update. Unrecognised kinds have none.
    pub fn from_push(message: &PushMessage) -> Option<Self> {
        match message {
            PushMessage::Sensors(updates) => Some(Self::Sensors(updates.clone())),
            PushMessage::Alarms(alarms) => Some(Self::Alarms(alarms.clone())),
            PushMessage::Incident(incident) => Some(Self::Incident(incident.clone())),
            PushMessage::Emergency(text) => Some(Self::Emergency(text.clone())),
            PushMessage::Other { .. } => None,
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Snapshot(_) => "snapshot",
            Self::Sensors(_) => "sensors",
            Self::Alarms(_) => "alarms",
            Self::Incident(_) => "incident",
            Self::Emergency(_) => "emergency",
        }
    }
}

/// An update as it sits in the multiplexer queue.
#[derive(Debug, Clone)]
pub struct ReceivedUpdate {
    pub source: UpdateSource,
    pub received_at: DateTime<Utc>,
    pub update: DashboardUpdate,
}

impl ReceivedUpdate {
    /// Stamp an update with the current time.
    pub fn now(source: UpdateSource, update: DashboardUpdate) -> Self {
        Self {
            source,
            received_at: Utc::now(),
            update,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_push_maps_known_kinds() {
        let msg = PushMessage::Emergency("shutdown".to_string());
        assert_eq!(
            DashboardUpdate::from_push(&msg),
            Some(DashboardUpdate::Emergency("shutdown".to_string()))
        );

        let other = PushMessage::Other {
            kind: Some("chat".to_string()),
            payload: serde_json::json!({}),
        };
        assert_eq!(DashboardUpdate::from_push(&other), None);
    }

    #[test]
    fn test_merge_policy_serde() {
        let policy: MergePolicy = serde_json::from_str("\"versioned\"").unwrap();
        assert_eq!(policy, MergePolicy::Versioned);
        assert_eq!(MergePolicy::default(), MergePolicy::ArrivalOrder);
    }
}
