//! View collaborator.
//!
//! The view-rendering layer is external; the dashboard only tells it what
//! changed. `ViewSync` forwards every store revision to a `ViewAdapter`.

use std::sync::Arc;

use scada_core::{format_uptime, sensor_icon, AlarmEvent, Snapshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::store::DashboardStore;

/// Receiver of dashboard state for display.
#[cfg_attr(test, mockall::automock)]
pub trait ViewAdapter: Send + Sync {
    /// Full status after any change.
    fn show_snapshot(&self, snapshot: &Snapshot);

    /// Latest alarm batch.
    fn show_alarms(&self, alarms: &[AlarmEvent]);
}

/// Headless view that summarises state in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogView;

impl ViewAdapter for LogView {
    fn show_snapshot(&self, snapshot: &Snapshot) {
        info!(
            lines = snapshot.lines.len(),
            running = snapshot.running_lines(),
            active_alarms = snapshot.active_alarms,
            active_incidents = snapshot.active_incidents,
            uptime = %format_uptime(snapshot.uptime_sec),
            "Dashboard status"
        );

        for line in &snapshot.lines {
            let sensors: Vec<String> = line
                .sensors
                .iter()
                .map(|s| format!("{} {}", sensor_icon(&s.sensor_type), s.label()))
                .collect();
            debug!(
                line = %line.id,
                name = %line.name,
                status = %line.status,
                badge = line.status.badge_color(),
                output = line.metrics.output,
                efficiency = line.metrics.efficiency,
                sensors = ?sensors,
                "Line"
            );
        }
    }

    fn show_alarms(&self, alarms: &[AlarmEvent]) {
        debug!(count = alarms.len(), "Alarm count");
    }
}

/// Forwards store revisions to a view.
pub struct ViewSync;

impl ViewSync {
    /// Spawn the forwarding task. Each revision produces one refresh of the
    /// view; bursts of revisions coalesce.
    pub fn spawn(
        store: DashboardStore,
        view: Arc<dyn ViewAdapter>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let mut revisions = store.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    changed = revisions.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }

                let revision = *revisions.borrow_and_update();
                if let Some(snapshot) = store.current() {
                    view.show_snapshot(&snapshot);
                }
                view.show_alarms(&store.latest_alarms());
                debug!(revision, "View refreshed");
            }
        })
    }
}
