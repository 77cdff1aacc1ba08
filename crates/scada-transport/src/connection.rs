//! Push channel connection.
//!
//! One long-lived WebSocket with a flat reconnect delay. Every close, read
//! error or failed connect moves the channel to `ClosedPendingReconnect`,
//! waits `reconnect_delay_ms`, and connects again until shut down.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use scada_telemetry::Metrics;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{TransportError, TransportResult};
use crate::handler::HandlerRegistry;
use crate::message::PushMessage;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Push channel configuration.
#[derive(Debug, Clone)]
pub struct PushConfig {
    /// WebSocket URL, e.g. `ws://10.0.0.5/ws`.
    pub url: String,
    /// Flat wait between a close and the next connect.
    pub reconnect_delay_ms: u64,
    /// Consecutive failed connects before giving up (0 = never give up).
    pub max_reconnect_attempts: u32,
}

impl PushConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            reconnect_delay_ms: 5000,
            max_reconnect_attempts: 0,
        }
    }
}

/// Push channel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    ClosedPendingReconnect,
    /// Terminal: shut down, or the reconnect cap was reached.
    Stopped,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::ClosedPendingReconnect => "closed_pending_reconnect",
            Self::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callback for every parsed push message, before handler dispatch.
pub type OnMessage = Arc<dyn Fn(&PushMessage) + Send + Sync>;

struct Shared {
    state: watch::Sender<ConnectionState>,
    reconnects: AtomicU32,
    shutdown_token: CancellationToken,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
        Metrics::push_state_set(state.as_str());
    }
}

/// Push channel ready to connect.
pub struct PushChannel {
    config: PushConfig,
    registry: HandlerRegistry,
}

impl PushChannel {
    pub fn new(config: PushConfig, registry: HandlerRegistry) -> Self {
        Self { config, registry }
    }

    /// Handlers consulted after `on_message` for each frame.
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Spawn the connection task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect<F>(self, on_message: F) -> PushHandle
    where
        F: Fn(&PushMessage) + Send + Sync + 'static,
    {
        let (state_tx, _) = watch::channel(ConnectionState::Connecting);
        let shared = Arc::new(Shared {
            state: state_tx,
            reconnects: AtomicU32::new(0),
            shutdown_token: CancellationToken::new(),
        });

        let connection = PushConnection {
            config: self.config,
            registry: self.registry,
            on_message: Arc::new(on_message),
            shared: shared.clone(),
        };

        let task = tokio::spawn(async move { connection.run().await });

        PushHandle { shared, task }
    }
}

/// Handle to a running push channel.
pub struct PushHandle {
    shared: Arc<Shared>,
    task: JoinHandle<TransportResult<()>>,
}

impl PushHandle {
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Receiver that observes every state transition.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Reconnect attempts made so far (not counting the first connect).
    pub fn reconnect_count(&self) -> u32 {
        self.shared.reconnects.load(Ordering::Relaxed)
    }

    /// Signal shutdown. Interrupts the socket read or the reconnect wait.
    pub fn shutdown(&self) {
        info!("Push channel shutdown requested");
        self.shared.shutdown_token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.shutdown_token.is_cancelled()
    }

    /// Wait for the connection task to finish.
    ///
    /// Returns an error only when the reconnect cap was reached.
    pub async fn join(self) -> TransportResult<()> {
        self.task
            .await
            .map_err(|e| TransportError::Network(format!("push task failed: {e}")))?
    }

    /// Shut down and wait for the task to exit.
    pub async fn close(self) -> TransportResult<()> {
        self.shutdown();
        self.join().await
    }
}

struct PushConnection {
    config: PushConfig,
    registry: HandlerRegistry,
    on_message: OnMessage,
    shared: Arc<Shared>,
}

impl PushConnection {
    fn is_shutdown(&self) -> bool {
        self.shared.shutdown_token.is_cancelled()
    }

    fn stop(&self) {
        self.shared.set_state(ConnectionState::Stopped);
    }

    async fn run(self) -> TransportResult<()> {
        let delay = Duration::from_millis(self.config.reconnect_delay_ms);
        let mut failures = 0u32;

        loop {
            if self.is_shutdown() {
                info!("Shutdown requested, exiting push loop");
                self.stop();
                return Ok(());
            }

            self.shared.set_state(ConnectionState::Connecting);
            info!(url = %self.config.url, "Connecting push channel");

            let connected = tokio::select! {
                result = connect_async(self.config.url.as_str()) => result,
                () = self.shared.shutdown_token.cancelled() => {
                    info!("Shutdown requested while connecting");
                    self.stop();
                    return Ok(());
                }
            };

            let reason = match connected {
                Ok((stream, _response)) => {
                    failures = 0;
                    self.shared.set_state(ConnectionState::Open);
                    info!("Push channel open");

                    match self.run_session(stream).await {
                        Ok(()) if self.is_shutdown() => {
                            self.stop();
                            return Ok(());
                        }
                        Ok(()) => {
                            info!("Push channel stream ended");
                            "closed"
                        }
                        Err(e) => {
                            warn!(error = %e, "Push channel closed");
                            e.kind()
                        }
                    }
                }
                Err(e) => {
                    failures += 1;
                    warn!(error = %e, failures, "Push channel connect failed");
                    "connect_failed"
                }
            };

            if self.is_shutdown() {
                info!("Shutdown requested after disconnect, not reconnecting");
                self.stop();
                return Ok(());
            }

            if self.config.max_reconnect_attempts > 0
                && failures >= self.config.max_reconnect_attempts
            {
                error!(failures, "Max push reconnect attempts reached");
                self.stop();
                return Err(TransportError::ChannelClosed {
                    code: 1006,
                    reason: "max reconnect attempts reached".to_string(),
                });
            }

            let attempt = self.shared.reconnects.fetch_add(1, Ordering::Relaxed) + 1;
            self.shared.set_state(ConnectionState::ClosedPendingReconnect);
            Metrics::push_reconnect(reason);
            warn!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting push channel");

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shared.shutdown_token.cancelled() => {
                    info!("Shutdown requested during reconnect wait");
                    self.stop();
                    return Ok(());
                }
            }
        }
    }

    /// Read frames until the socket closes or shutdown is requested.
    async fn run_session(&self, stream: WsStream) -> TransportResult<()> {
        let (mut write, mut read) = stream.split();

        loop {
            tokio::select! {
                biased;

                () = self.shared.shutdown_token.cancelled() => {
                    if let Err(e) = write.send(Message::Close(None)).await {
                        debug!(error = %e, "Failed to send Close frame during shutdown");
                    }
                    return Ok(());
                }

                frame = read.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => self.handle_text(&text),
                        Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                            Ok(text) => self.handle_text(text),
                            Err(_) => {
                                warn!(len = data.len(), "Dropping non-UTF-8 binary frame");
                                Metrics::push_malformed();
                            }
                        },
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1005, "No status".to_string()));
                            return Err(TransportError::ChannelClosed { code, reason });
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!(error = %e, "Push channel read error");
                            return Err(e.into());
                        }
                        None => return Ok(()),
                    }
                }
            }
        }
    }

    fn handle_text(&self, text: &str) {
        match PushMessage::parse(text) {
            Ok(message) => {
                let kind = message
                    .kind()
                    .map(|k| k.to_string())
                    .unwrap_or_else(|| "untyped".to_string());
                debug!(%kind, "Push message received");
                Metrics::push_message(&kind);

                (self.on_message)(&message);
                self.registry.dispatch(&message);
            }
            Err(e) => {
                warn!(error = %e, "Dropping malformed push frame");
                Metrics::push_malformed();
            }
        }
    }
}
