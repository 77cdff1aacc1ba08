//! Update multiplexer.
//!
//! Push and poll both enqueue `ReceivedUpdate`s on one channel. A single
//! consumer applies them to the store in arrival order, raises one-shot
//! alerts, and asks for a full refresh when an incident arrives.

use std::sync::Arc;

use scada_telemetry::Metrics;
use scada_transport::PushMessage;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::alerts::{Alert, AlertSink, AlertWindow};
use crate::config::DashboardConfig;
use crate::error::{DashboardError, DashboardResult};
use crate::store::DashboardStore;
use crate::types::{DashboardUpdate, MergePolicy, ReceivedUpdate, UpdateSource};

/// Called when an update asks for a full status refresh.
pub type RefreshHook = Arc<dyn Fn() + Send + Sync>;

/// Producer side of the update queue. Cheap to clone; sends never block.
#[derive(Clone)]
pub struct UpdateSender {
    tx: mpsc::UnboundedSender<ReceivedUpdate>,
}

impl UpdateSender {
    pub fn send(&self, source: UpdateSource, update: DashboardUpdate) -> DashboardResult<()> {
        self.tx
            .send(ReceivedUpdate::now(source, update))
            .map_err(|_| DashboardError::QueueClosed)
    }

    /// Enqueue a push message. Returns `false` for kinds the dashboard
    /// does not consume.
    pub fn push_message(&self, message: &PushMessage) -> DashboardResult<bool> {
        match DashboardUpdate::from_push(message) {
            Some(update) => self.send(UpdateSource::Push, update).map(|()| true),
            None => Ok(false),
        }
    }

    /// Enqueue a polled full snapshot.
    pub fn poll_snapshot(&self, snapshot: scada_core::Snapshot) -> DashboardResult<()> {
        self.send(UpdateSource::Poll, DashboardUpdate::Snapshot(snapshot))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// What applying one update did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyOutcome {
    /// The store changed.
    pub applied: bool,
    /// Alert raised by this update, if it was the first sighting.
    pub alert: Option<Alert>,
    pub refresh_requested: bool,
}

/// Single consumer of the update queue.
pub struct UpdateMultiplexer {
    rx: mpsc::UnboundedReceiver<ReceivedUpdate>,
    store: DashboardStore,
    alerts: Arc<dyn AlertSink>,
    window: AlertWindow,
    policy: MergePolicy,
    refresh: Option<RefreshHook>,
}

impl UpdateMultiplexer {
    pub fn new(
        store: DashboardStore,
        alerts: Arc<dyn AlertSink>,
        config: &DashboardConfig,
    ) -> (Self, UpdateSender) {
        let (tx, rx) = mpsc::unbounded_channel();
        let multiplexer = Self {
            rx,
            store,
            alerts,
            window: AlertWindow::new(config.alert_window),
            policy: config.merge_policy,
            refresh: None,
        };
        (multiplexer, UpdateSender { tx })
    }

    /// Install the hook that fulfils refresh requests.
    pub fn with_refresh_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.refresh = Some(Arc::new(hook));
        self
    }

    pub fn store(&self) -> &DashboardStore {
        &self.store
    }

    /// Consume the queue until cancelled or every sender is dropped.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(policy = ?self.policy, "Update multiplexer started");

        loop {
            tokio::select! {
                biased;

                () = shutdown.cancelled() => break,

                next = self.rx.recv() => match next {
                    Some(update) => {
                        self.apply(update);
                    }
                    None => {
                        debug!("All update senders dropped");
                        break;
                    }
                },
            }
        }

        info!("Update multiplexer stopped");
    }

    /// Apply one update synchronously.
    pub fn apply(&mut self, received: ReceivedUpdate) -> ApplyOutcome {
        let ReceivedUpdate {
            source,
            received_at,
            update,
        } = received;
        let kind = update.kind();
        trace!(kind, source = source.as_str(), %received_at, "Applying update");

        let mut outcome = ApplyOutcome::default();

        match update {
            DashboardUpdate::Snapshot(snapshot) => {
                outcome.applied = self.store.apply_snapshot(snapshot, self.policy);
                if !outcome.applied {
                    Metrics::store_rejected();
                }
            }
            DashboardUpdate::Sensors(updates) => {
                outcome.applied = self.store.patch_sensors(&updates);
            }
            DashboardUpdate::Alarms(alarms) => {
                let latest_critical = self.store.patch_alarms(alarms);
                outcome.applied = true;
                if let Some(alarm) = latest_critical {
                    outcome.alert = self.raise(Alert::critical_alarm(&alarm));
                }
            }
            DashboardUpdate::Incident(incident) => {
                let alert = Alert::incident(&incident);
                self.store.record_incident(incident);
                outcome.applied = true;
                outcome.alert = self.raise(alert);
                if outcome.alert.is_some() {
                    outcome.refresh_requested = true;
                    self.request_refresh();
                }
            }
            DashboardUpdate::Emergency(message) => {
                // Every broadcast is its own event; never de-duplicated.
                outcome.alert = Some(self.notify(Alert::emergency(&message)));
            }
        }

        if outcome.applied {
            Metrics::store_update(kind, source.as_str());
        }
        outcome
    }

    fn raise(&mut self, alert: Alert) -> Option<Alert> {
        if !self.window.first_seen(&alert.identity) {
            debug!(identity = %alert.identity, "Duplicate alert suppressed");
            return None;
        }
        Some(self.notify(alert))
    }

    fn notify(&self, alert: Alert) -> Alert {
        Metrics::alert(alert.kind.as_str());
        self.alerts.notify(&alert);
        alert
    }

    fn request_refresh(&self) {
        match &self.refresh {
            Some(hook) => hook(),
            None => trace!("Refresh requested but no hook installed"),
        }
    }
}
