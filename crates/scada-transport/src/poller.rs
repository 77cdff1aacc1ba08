//! Pull-polling fallback.
//!
//! Fetches the full status on a fixed interval. Every tick spawns its own
//! fetch, so a slow request never delays the next tick. Failed fetches are
//! logged and dropped with no backoff.

use std::sync::Arc;
use std::time::Duration;

use scada_core::Snapshot;
use scada_telemetry::Metrics;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::http::ApiClient;

/// Default poll interval.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;

/// Periodic status poller.
pub struct Poller;

impl Poller {
    /// Start polling. The first fetch happens one interval after start.
    pub fn start<F>(client: ApiClient, on_snapshot: F, interval_ms: u64) -> PollHandle
    where
        F: Fn(Snapshot) + Send + Sync + 'static,
    {
        let token = CancellationToken::new();
        let on_snapshot = Arc::new(on_snapshot);
        let period = Duration::from_millis(interval_ms.max(1));

        let loop_token = token.clone();
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_ms, "Status poller started");

            loop {
                tokio::select! {
                    () = loop_token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                trace!("Poll tick");
                let client = client.clone();
                let on_snapshot = on_snapshot.clone();
                let token = loop_token.clone();
                tokio::spawn(async move {
                    let result = tokio::select! {
                        () = token.cancelled() => return,
                        result = client.fetch_status() => result,
                    };
                    match result {
                        Ok(snapshot) if !token.is_cancelled() => on_snapshot(snapshot),
                        Ok(_) => {}
                        Err(e) => {
                            debug!(error = %e, "Status poll failed");
                            Metrics::poll_failed();
                        }
                    }
                });
            }

            info!("Status poller stopped");
        });

        PollHandle {
            token,
            task: Some(task),
        }
    }
}

/// Handle to a running poller.
pub struct PollHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    /// Stop ticking and drop results of fetches still in flight.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Stop and wait for the timer task to exit.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
