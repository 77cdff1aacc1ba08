//! Dashboard lifecycle.
//!
//! Start order:
//! 1. Initial full-status fetch (fatal only on an auth rejection)
//! 2. Update multiplexer, view sync and frame loop
//! 3. Push channel and status poller, both feeding the multiplexer
//!
//! Stop cancels the poller, frame loop and multiplexer, closes the push
//! channel explicitly so its reconnect loop ends with the dashboard, and
//! clears the dashboard state once every producer has stopped.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use scada_dashboard::{
    AlertSink, DashboardStore, LogAlertSink, LogView, UpdateMultiplexer, UpdateSender, ViewSync,
};
use scada_diagram::{DiagramRenderer, FrameLoop, FrameLoopHandle, SvgCanvas, SystemClock};
use scada_transport::{
    ApiClient, CredentialProvider, HandlerRegistry, MessageKind, PollHandle, Poller, PushChannel,
    PushHandle, PushMessage, SessionCredentials,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

/// Heartbeat log interval.
const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Credentials that report every server rejection to the lifecycle.
///
/// A 401 on any request (poll, refresh or write) invalidates the session;
/// the monitor treats that as fatal and stops.
pub struct NotifyingCredentials {
    inner: SessionCredentials,
    rejected: mpsc::UnboundedSender<()>,
}

impl NotifyingCredentials {
    pub fn new(inner: SessionCredentials) -> (Self, mpsc::UnboundedReceiver<()>) {
        let (rejected, rx) = mpsc::unbounded_channel();
        (Self { inner, rejected }, rx)
    }
}

impl CredentialProvider for NotifyingCredentials {
    fn token(&self) -> Option<String> {
        self.inner.token()
    }

    fn session_id(&self) -> Option<String> {
        self.inner.session_id()
    }

    fn invalidate(&self) {
        self.inner.invalidate();
        let _ = self.rejected.send(());
    }
}

/// Running frame loop plus the live canvas it draws into.
struct DiagramOutput {
    frames: FrameLoopHandle,
    canvas: Arc<Mutex<SvgCanvas>>,
    path: PathBuf,
}

impl DiagramOutput {
    /// Stop the loop and write the last drawn frame.
    async fn finish(self) {
        self.frames.shutdown().await;
        let last = self.canvas.lock().clone();
        match last.write_to(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "Final diagram frame written"),
            Err(e) => warn!(error = %e, path = %self.path.display(), "Final diagram write failed"),
        }
    }
}

/// Main application.
pub struct Application {
    config: AppConfig,
    client: ApiClient,
    store: DashboardStore,
    rejected: mpsc::UnboundedReceiver<()>,
    shutdown: CancellationToken,
}

impl Application {
    /// Create a new application. No I/O happens until `run()`.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let session = SessionCredentials::new(
            config.session.token.clone(),
            config.session.session_id.clone(),
        );
        let (credentials, rejected) = NotifyingCredentials::new(session);
        let client = ApiClient::new(config.client_config(), Arc::new(credentials))?;
        let store = DashboardStore::new(config.dashboard.recent_events);

        Ok(Self {
            config,
            client,
            store,
            rejected,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Handle to the dashboard state.
    pub fn store(&self) -> DashboardStore {
        self.store.clone()
    }

    /// Cancelling this token stops `run()` as if Ctrl-C was pressed.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run until Ctrl-C, `shutdown_token()` cancellation, or the server
    /// rejects the session.
    pub async fn run(mut self) -> AppResult<()> {
        info!(
            base_url = %self.config.server.base_url,
            poll_interval_ms = self.config.dashboard.poll_interval_ms,
            merge_policy = ?self.config.dashboard.merge_policy,
            "Starting dashboard"
        );

        let tasks = CancellationToken::new();
        let alerts: Arc<dyn AlertSink> = Arc::new(LogAlertSink);
        let (multiplexer, updates) =
            UpdateMultiplexer::new(self.store.clone(), alerts, &self.config.dashboard);
        let multiplexer =
            multiplexer.with_refresh_hook(refresh_hook(self.client.clone(), updates.clone()));

        match self.client.fetch_status().await {
            Ok(snapshot) => {
                info!(lines = snapshot.lines.len(), "Initial status loaded");
                updates.poll_snapshot(snapshot)?;
            }
            Err(e) if e.is_fatal() => {
                error!(error = %e, "Initial status rejected");
                return Err(e.into());
            }
            Err(e) => warn!(error = %e, "Initial status fetch failed, waiting for push/poll"),
        }

        let multiplexer_task = tokio::spawn(multiplexer.run(tasks.clone()));
        let view_task = ViewSync::spawn(self.store.clone(), Arc::new(LogView), tasks.clone());
        let diagram = self.start_frame_loop();
        let push = self.start_push(&updates)?;
        let poller = self.start_poller(&updates);

        let mut status_interval = tokio::time::interval(STATUS_LOG_INTERVAL);
        status_interval.tick().await;

        info!("Entering main loop");
        let outcome = loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break Ok(());
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break Ok(());
                }

                Some(()) = self.rejected.recv() => {
                    error!("Session rejected by server, stopping dashboard");
                    break Err(AppError::Unauthorized);
                }

                _ = status_interval.tick() => {
                    info!(
                        push = push.as_ref().map_or("disabled", |p| p.state().as_str()),
                        reconnects = push.as_ref().map_or(0, PushHandle::reconnect_count),
                        revision = self.store.revision(),
                        frames = diagram.as_ref().map_or(0, |d| d.frames.frames_drawn()),
                        "Dashboard heartbeat"
                    );
                }
            }
        };

        tasks.cancel();
        poller.shutdown().await;
        if let Some(push) = push {
            if let Err(e) = push.close().await {
                warn!(error = %e, "Push channel ended with error");
            }
        }
        if let Some(diagram) = diagram {
            diagram.finish().await;
        }
        let _ = multiplexer_task.await;
        let _ = view_task.await;

        // Nothing writes to the store any more.
        self.store.clear();

        info!("Dashboard stopped");
        outcome
    }

    fn start_push(&self, updates: &UpdateSender) -> AppResult<Option<PushHandle>> {
        if !self.config.push.enabled {
            info!("Push channel disabled, polling only");
            return Ok(None);
        }

        let url = self.client.push_url()?;
        info!(%url, "Connecting push channel");

        let registry = dashboard_registry(updates);
        let channel = PushChannel::new(self.config.push_config(url), registry.clone());
        let handle = channel.connect(move |message| match message.kind() {
            Some(kind) if registry.is_registered(&kind) => {}
            kind => debug!(?kind, "Push message not used by the dashboard"),
        });
        Ok(Some(handle))
    }

    fn start_poller(&self, updates: &UpdateSender) -> PollHandle {
        let updates = updates.clone();
        Poller::start(
            self.client.clone(),
            move |snapshot| {
                if let Err(e) = updates.poll_snapshot(snapshot) {
                    debug!(error = %e, "Dropping polled status");
                }
            },
            self.config.dashboard.poll_interval_ms,
        )
    }

    /// The diagram only has a consumer when it is exported to a file.
    fn start_frame_loop(&self) -> Option<DiagramOutput> {
        let render = &self.config.render;
        if !render.enabled {
            return None;
        }
        let Some(path) = render.svg_path.clone() else {
            info!("No diagram output configured, frame loop not started");
            return None;
        };

        let canvas = Arc::new(Mutex::new(SvgCanvas::new()));
        let frames = FrameLoop::spawn(
            DiagramRenderer::new(render.width),
            self.store.clone(),
            canvas.clone(),
            Arc::new(SystemClock),
            render.frame_loop_config(),
        );
        Some(DiagramOutput {
            frames,
            canvas,
            path,
        })
    }
}

/// Push handlers for every kind the dashboard consumes.
///
/// Each handler forwards into the multiplexer queue; kinds left unregistered
/// are ignored by the channel.
fn dashboard_registry(updates: &UpdateSender) -> HandlerRegistry {
    let registry = HandlerRegistry::new();
    for kind in [
        MessageKind::Sensors,
        MessageKind::Alarms,
        MessageKind::Incident,
        MessageKind::Emergency,
    ] {
        let updates = updates.clone();
        registry.register(kind, move |message: &PushMessage| {
            if let Err(e) = updates.push_message(message) {
                debug!(error = %e, "Dropping push message");
            }
        });
    }
    registry
}

/// Full status reload requested by the multiplexer (e.g. after an incident).
fn refresh_hook(client: ApiClient, updates: UpdateSender) -> impl Fn() + Send + Sync + 'static {
    move || {
        let client = client.clone();
        let updates = updates.clone();
        tokio::spawn(async move {
            match client.fetch_status().await {
                Ok(snapshot) => {
                    if let Err(e) = updates.poll_snapshot(snapshot) {
                        debug!(error = %e, "Dropping refreshed status");
                    }
                }
                Err(e) => warn!(error = %e, "Status refresh failed"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notifying_credentials_reports_invalidation() {
        let session = SessionCredentials::new(Some("tok".to_string()), Some("s-1".to_string()));
        let (credentials, mut rejected) = NotifyingCredentials::new(session);

        assert_eq!(credentials.token().as_deref(), Some("tok"));
        assert_eq!(credentials.session_id().as_deref(), Some("s-1"));
        assert!(rejected.try_recv().is_err());

        credentials.invalidate();
        assert!(credentials.token().is_none());
        assert!(credentials.session_id().is_none());
        assert!(rejected.try_recv().is_ok());
    }

    #[test]
    fn test_new_rejects_non_http_base_url() {
        let mut config = AppConfig::default();
        config.server.base_url = "ftp://plant".to_string();
        assert!(matches!(
            Application::new(config),
            Err(AppError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_dashboard_registry_forwards_consumed_kinds() {
        let store = DashboardStore::default();
        let (multiplexer, updates) = UpdateMultiplexer::new(
            store.clone(),
            Arc::new(LogAlertSink),
            &scada_dashboard::DashboardConfig::default(),
        );
        let registry = dashboard_registry(&updates);

        for kind in [
            MessageKind::Sensors,
            MessageKind::Alarms,
            MessageKind::Incident,
            MessageKind::Emergency,
        ] {
            assert!(registry.is_registered(&kind), "{kind}");
        }

        let alarms = PushMessage::parse(
            r#"{"type":"alarms","data":[{"id":"A1","severity":"LOW","message":"Filter dirty","line":"L1"}]}"#,
        )
        .unwrap();
        let other = PushMessage::parse(r#"{"type":"maintenance","window":"02:00"}"#).unwrap();
        assert!(registry.dispatch(&alarms));
        assert!(!registry.dispatch(&other));

        let tasks = CancellationToken::new();
        let run = tokio::spawn(multiplexer.run(tasks.clone()));
        let delivered = tokio::time::timeout(Duration::from_secs(5), async {
            while store.latest_alarms().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(delivered.is_ok());
        assert_eq!(store.latest_alarms()[0].message, "Filter dirty");

        tasks.cancel();
        run.await.unwrap();
    }

    #[tokio::test]
    async fn test_frame_loop_needs_svg_output() {
        let mut config = AppConfig::default();
        config.render.svg_path = None;
        let app = Application::new(config.clone()).unwrap();
        assert!(app.start_frame_loop().is_none());

        let path = std::env::temp_dir().join(format!("scada-monitor-final-{}.svg", std::process::id()));
        let _ = std::fs::remove_file(&path);
        config.render.svg_path = Some(path.clone());
        config.render.svg_interval_ms = 60_000;
        let app = Application::new(config).unwrap();

        let diagram = app.start_frame_loop().unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(diagram.frames.frames_drawn() > 0);
        diagram.finish().await;

        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.starts_with("<svg"));
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_when_server_unreachable() {
        let mut config = AppConfig::default();
        config.server.base_url = "http://127.0.0.1:1".to_string();
        config.retry.max_retries = 0;
        config.push.enabled = false;
        config.render.enabled = false;

        let app = Application::new(config).unwrap();
        let shutdown = app.shutdown_token();
        let run = tokio::spawn(app.run());

        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
