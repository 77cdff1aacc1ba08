//! Mock push server for integration tests.
//!
//! Each accepted connection receives the scripted frames in order. The
//! server then either closes the socket or keeps it open until the client
//! disconnects.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// What the server does with each connection.
#[derive(Debug, Clone)]
pub struct Script {
    pub frames: Vec<String>,
    pub close_after_frames: bool,
}

/// A mock push server.
pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    accepted_at: Arc<Mutex<Vec<Instant>>>,
}

impl MockWsServer {
    /// Start a server on an available port.
    pub async fn start(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted_at: Arc<Mutex<Vec<Instant>>> = Arc::new(Mutex::new(Vec::new()));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let accepted_clone = accepted_at.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        accepted_clone.lock().await.push(Instant::now());
                        tokio::spawn(handle_connection(stream, script.clone()));
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            accepted_at,
        }
    }

    /// Push channel URL.
    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub async fn connection_count(&self) -> usize {
        self.accepted_at.lock().await.len()
    }

    /// Accept instants, in order.
    pub async fn accepted_at(&self) -> Vec<Instant> {
        self.accepted_at.lock().await.clone()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn handle_connection(stream: TcpStream, script: Script) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();

    for frame in &script.frames {
        if write.send(Message::Text(frame.clone())).await.is_err() {
            return;
        }
    }

    if script.close_after_frames {
        let close = CloseFrame {
            code: CloseCode::Away,
            reason: "server restart".into(),
        };
        let _ = write.send(Message::Close(Some(close))).await;
    }

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Ping(data)) => {
                let _ = write.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) | Err(_) => break,
            _ => {}
        }
    }
}
