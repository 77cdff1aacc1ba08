//! Dashboard configuration.

use serde::{Deserialize, Serialize};

use crate::types::MergePolicy;

/// Dashboard pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Full-status poll interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// How snapshots from push and poll are reconciled.
    #[serde(default)]
    pub merge_policy: MergePolicy,
    /// Event identities remembered for alert de-duplication.
    #[serde(default = "default_alert_window")]
    pub alert_window: usize,
    /// Alarms and incidents kept for the recent-events views.
    #[serde(default = "default_recent_events")]
    pub recent_events: usize,
}

fn default_poll_interval_ms() -> u64 {
    3000
}

fn default_alert_window() -> usize {
    256
}

fn default_recent_events() -> usize {
    50
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            merge_policy: MergePolicy::default(),
            alert_window: default_alert_window(),
            recent_events: default_recent_events(),
        }
    }
}
