//! Transport client for the SCADA monitor.
//!
//! Two channels feed the dashboard:
//! - Request/response over HTTP with bounded retry (`ApiClient`)
//! - A push WebSocket with a flat reconnect delay (`PushChannel`)
//!
//! plus a `Poller` that refreshes the full status on a fixed interval as a
//! fallback for missed push frames.

pub mod connection;
pub mod error;
pub mod handler;
pub mod http;
pub mod message;
pub mod poller;
pub mod session;

pub use connection::{ConnectionState, OnMessage, PushChannel, PushConfig, PushHandle};
pub use error::{TransportError, TransportResult};
pub use handler::{HandlerRegistry, HandlerSubscription, MessageHandler};
pub use http::{
    endpoints, ApiClient, BoxFuture, ClientConfig, HttpBackend, HttpRequest, HttpResponse,
    PendingRetry, ReqwestBackend, RetryPolicy,
};
pub use message::{MessageKind, PushMessage};
pub use poller::{PollHandle, Poller, DEFAULT_POLL_INTERVAL_MS};
pub use session::{CredentialProvider, SessionCredentials};

/// Re-exported so callers can build requests without depending on reqwest.
pub use reqwest::Method;

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any `https`/`wss` connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
