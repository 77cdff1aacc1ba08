//! Mock SCADA backend for lifecycle tests.
//!
//! Serves `GET /api/dashboard/status` and the `/ws` push channel from one
//! axum router. The status body and code can be changed while running.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;

#[derive(Clone)]
struct PlantState {
    status_body: Arc<Mutex<Value>>,
    status_code: Arc<AtomicU16>,
    status_hits: Arc<AtomicUsize>,
    authorization: Arc<Mutex<Vec<String>>>,
    push_frames: Arc<Vec<String>>,
}

/// A running mock backend.
pub struct MockPlant {
    addr: SocketAddr,
    state: PlantState,
    server: tokio::task::JoinHandle<()>,
}

impl MockPlant {
    /// Start on an available port. Every push connection receives
    /// `push_frames` in order and is then held open.
    pub async fn start(status_body: Value, push_frames: Vec<String>) -> Self {
        let state = PlantState {
            status_body: Arc::new(Mutex::new(status_body)),
            status_code: Arc::new(AtomicU16::new(200)),
            status_hits: Arc::new(AtomicUsize::new(0)),
            authorization: Arc::new(Mutex::new(Vec::new())),
            push_frames: Arc::new(push_frames),
        };

        let app = Router::new()
            .route("/api/dashboard/status", get(status))
            .route("/ws", get(push))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            state,
            server,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn set_status_body(&self, body: Value) {
        *self.state.status_body.lock() = body;
    }

    pub fn set_status_code(&self, code: u16) {
        self.state.status_code.store(code, Ordering::SeqCst);
    }

    pub fn status_hits(&self) -> usize {
        self.state.status_hits.load(Ordering::SeqCst)
    }

    /// `Authorization` headers seen on status requests.
    pub fn authorization_headers(&self) -> Vec<String> {
        self.state.authorization.lock().clone()
    }

    pub fn shutdown(self) {
        self.server.abort();
    }
}

async fn status(State(state): State<PlantState>, headers: HeaderMap) -> Response {
    state.status_hits.fetch_add(1, Ordering::SeqCst);
    if let Some(auth) = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
    {
        state.authorization.lock().push(auth.to_string());
    }

    let code = state.status_code.load(Ordering::SeqCst);
    if code != 200 {
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, Json(json!({ "error": "rejected by mock" }))).into_response();
    }

    let body = state.status_body.lock().clone();
    Json(body).into_response()
}

async fn push(ws: WebSocketUpgrade, State(state): State<PlantState>) -> Response {
    ws.on_upgrade(move |socket| push_session(socket, state))
}

async fn push_session(mut socket: WebSocket, state: PlantState) {
    for frame in state.push_frames.iter() {
        if socket.send(Message::Text(frame.clone().into())).await.is_err() {
            return;
        }
    }
    while let Some(Ok(_)) = socket.recv().await {}
}
