//! User-facing alerts raised by dashboard updates.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use scada_core::{AlarmEvent, IncidentEvent};
use tracing::{error, info, warn};

/// Alert severity as shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Info,
    Warning,
    Error,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// How long a view should keep the alert visible.
    pub fn display_duration_ms(&self) -> u64 {
        match self {
            Self::Info => 4000,
            Self::Warning => 5000,
            Self::Error => 6000,
        }
    }
}

/// What raised the alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    CriticalAlarm,
    Incident,
    Emergency,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CriticalAlarm => "critical_alarm",
            Self::Incident => "incident",
            Self::Emergency => "emergency",
        }
    }
}

/// A one-shot notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub kind: AlertKind,
    pub level: AlertLevel,
    pub message: String,
    /// Event identity used for de-duplication.
    pub identity: String,
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    pub fn critical_alarm(alarm: &AlarmEvent) -> Self {
        Self {
            kind: AlertKind::CriticalAlarm,
            level: AlertLevel::Error,
            message: format!("ALARM: {} (Line {})", alarm.message, alarm.line),
            identity: alarm.identity(),
            raised_at: Utc::now(),
        }
    }

    pub fn incident(incident: &IncidentEvent) -> Self {
        Self {
            kind: AlertKind::Incident,
            level: AlertLevel::Warning,
            message: format!(
                "Incident: {} on Line {}",
                incident.incident_type, incident.line
            ),
            identity: incident.identity(),
            raised_at: Utc::now(),
        }
    }

    /// Emergency broadcasts carry no id and always alert; the identity is
    /// informational only.
    pub fn emergency(message: &str) -> Self {
        Self {
            kind: AlertKind::Emergency,
            level: AlertLevel::Error,
            message: message.to_string(),
            identity: format!("emergency:{message}"),
            raised_at: Utc::now(),
        }
    }
}

/// Receiver of alerts (the notification area of a view).
#[cfg_attr(test, mockall::automock)]
pub trait AlertSink: Send + Sync {
    fn notify(&self, alert: &Alert);
}

/// Alert sink that writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn notify(&self, alert: &Alert) {
        let kind = alert.kind.as_str();
        match alert.level {
            AlertLevel::Error => error!(kind, message = %alert.message, "ALERT"),
            AlertLevel::Warning => warn!(kind, message = %alert.message, "ALERT"),
            AlertLevel::Info => info!(kind, message = %alert.message, "ALERT"),
        }
    }
}

/// Bounded memory of event identities that already raised an alert.
#[derive(Debug)]
pub struct AlertWindow {
    capacity: usize,
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl AlertWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
        }
    }

    /// Record `identity`; returns `true` the first time it is seen within
    /// the window.
    pub fn first_seen(&mut self, identity: &str) -> bool {
        if self.seen.contains(identity) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.order.push_back(identity.to_string());
        self.seen.insert(identity.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
