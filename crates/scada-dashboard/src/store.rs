//! Dashboard state store.
//!
//! Holds the current snapshot plus the latest alarm batch and recent events.
//! Every mutation runs under one short write lock and swaps in a new
//! `Arc<Snapshot>`, so readers see either the old or the new state, never a
//! partial merge. Each change bumps a revision published on a watch channel.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;
use scada_core::{AlarmEvent, IncidentEvent, SensorUpdate, Snapshot};
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::types::MergePolicy;

/// Default cap for recent alarm/incident lists.
pub const DEFAULT_RECENT_LIMIT: usize = 50;

#[derive(Default)]
struct StoreState {
    snapshot: Option<Arc<Snapshot>>,
    latest_alarms: Vec<AlarmEvent>,
    recent_alarms: VecDeque<AlarmEvent>,
    recent_incidents: VecDeque<IncidentEvent>,
}

struct StoreInner {
    state: RwLock<StoreState>,
    revision: watch::Sender<u64>,
    recent_limit: usize,
}

/// Shared dashboard state. Cheap to clone.
#[derive(Clone)]
pub struct DashboardStore {
    inner: Arc<StoreInner>,
}

impl Default for DashboardStore {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_LIMIT)
    }
}

impl DashboardStore {
    pub fn new(recent_limit: usize) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(StoreState::default()),
                revision,
                recent_limit: recent_limit.max(1),
            }),
        }
    }

    /// Replace the snapshot wholesale (arrival-order merge).
    pub fn replace(&self, snapshot: Snapshot) {
        self.apply_snapshot(snapshot, MergePolicy::ArrivalOrder);
    }

    /// Replace the snapshot subject to `policy`.
    ///
    /// Returns `false` when the versioned policy rejects an older snapshot.
    pub fn apply_snapshot(&self, snapshot: Snapshot, policy: MergePolicy) -> bool {
        let mut state = self.inner.state.write();

        if policy == MergePolicy::Versioned {
            let stored = state.snapshot.as_ref().and_then(|s| s.version);
            if let (Some(incoming), Some(stored)) = (snapshot.version, stored) {
                if incoming < stored {
                    debug!(incoming, stored, "Rejecting stale snapshot");
                    return false;
                }
            }
        }

        trace!(lines = snapshot.lines.len(), "Snapshot replaced");
        state.snapshot = Some(Arc::new(snapshot));
        drop(state);
        self.bump();
        true
    }

    /// Apply pushed sensor readings by sensor id.
    ///
    /// Unknown ids are ignored; sensors are never added and keep their order.
    /// Returns `true` if any sensor changed. No-op before the first snapshot.
    pub fn patch_sensors(&self, updates: &[SensorUpdate]) -> bool {
        if updates.is_empty() {
            return false;
        }

        let mut state = self.inner.state.write();
        let Some(current) = state.snapshot.as_mut() else {
            trace!("Sensor patch before first snapshot ignored");
            return false;
        };

        // Later entries for the same id win.
        let by_id: HashMap<&str, &SensorUpdate> =
            updates.iter().map(|u| (u.id.as_str(), u)).collect();

        if !current
            .lines
            .iter()
            .flat_map(|l| l.sensors.iter())
            .any(|s| by_id.contains_key(s.id.as_str()))
        {
            trace!(count = updates.len(), "Sensor patch matched no known sensor");
            return false;
        }

        // Copy-on-write: readers holding the old Arc keep the old snapshot.
        let snapshot = Arc::make_mut(current);
        for sensor in snapshot.lines.iter_mut().flat_map(|l| l.sensors.iter_mut()) {
            if let Some(update) = by_id.get(sensor.id.as_str()) {
                sensor.value = update.value;
                if let Some(unit) = &update.unit {
                    sensor.unit = unit.clone();
                }
                if let Some(status) = update.status {
                    sensor.status = status;
                }
            }
        }

        drop(state);
        self.bump();
        true
    }

    /// Store the latest alarm batch.
    ///
    /// The batch replaces the previous one and sets `active_alarms` to its
    /// length. Returns the batch's last alarm if it is critical.
    pub fn patch_alarms(&self, alarms: Vec<AlarmEvent>) -> Option<AlarmEvent> {
        let latest_critical = alarms.last().filter(|a| a.severity.is_critical()).cloned();
        let limit = self.inner.recent_limit;

        let mut state = self.inner.state.write();
        for alarm in &alarms {
            push_bounded(&mut state.recent_alarms, alarm.clone(), limit);
        }
        if let Some(current) = state.snapshot.as_mut() {
            Arc::make_mut(current).active_alarms = alarms.len() as u32;
        }
        state.latest_alarms = alarms;
        drop(state);

        self.bump();
        latest_critical
    }

    /// Remember an incident for the recent-incidents view.
    pub fn record_incident(&self, incident: IncidentEvent) {
        let limit = self.inner.recent_limit;
        push_bounded(&mut self.inner.state.write().recent_incidents, incident, limit);
        self.bump();
    }

    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.inner.state.read().snapshot.clone()
    }

    /// The most recent alarm batch.
    pub fn latest_alarms(&self) -> Vec<AlarmEvent> {
        self.inner.state.read().latest_alarms.clone()
    }

    /// Recent alarms, oldest first.
    pub fn recent_alarms(&self) -> Vec<AlarmEvent> {
        self.inner.state.read().recent_alarms.iter().cloned().collect()
    }

    /// Recent incidents, oldest first.
    pub fn recent_incidents(&self) -> Vec<IncidentEvent> {
        self.inner
            .state
            .read()
            .recent_incidents
            .iter()
            .cloned()
            .collect()
    }

    pub fn revision(&self) -> u64 {
        *self.inner.revision.borrow()
    }

    /// Receiver notified on every revision bump.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    /// Drop all state (dashboard teardown).
    pub fn clear(&self) {
        *self.inner.state.write() = StoreState::default();
        self.bump();
    }

    fn bump(&self) {
        self.inner.revision.send_modify(|r| *r += 1);
    }
}

impl std::fmt::Debug for DashboardStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("DashboardStore")
            .field("revision", &self.revision())
            .field("has_snapshot", &state.snapshot.is_some())
            .field("latest_alarms", &state.latest_alarms.len())
            .finish()
    }
}

fn push_bounded<T>(queue: &mut VecDeque<T>, item: T, limit: usize) {
    queue.push_back(item);
    while queue.len() > limit {
        queue.pop_front();
    }
}
