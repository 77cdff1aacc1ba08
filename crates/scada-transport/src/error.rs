//! Transport error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    /// Transient I/O failure; retried per the backoff policy.
    #[error("Network error: {0}")]
    Network(String),

    /// Server reported the session unauthorized. Never retried.
    #[error("Unauthorized: {0}")]
    Auth(String),

    /// Server asked us to slow down.
    #[error("Rate limited")]
    RateLimited,

    /// Non-2xx response other than 401/429.
    #[error("Request failed: status={status}, message={message}")]
    Server { status: u16, message: String },

    /// Response body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Push channel closed: code={code}, reason={reason}")]
    ChannelClosed { code: u16, reason: String },

    #[error("Malformed push message: {0}")]
    MalformedMessage(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl TransportError {
    /// Whether the failure ends the session.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Auth(_) => "auth",
            Self::RateLimited => "rate_limited",
            Self::Server { .. } => "server",
            Self::Decode(_) => "decode",
            Self::ChannelClosed { .. } => "channel_closed",
            Self::MalformedMessage(_) => "malformed",
            Self::InvalidUrl(_) => "invalid_url",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsErr;
        match err {
            WsErr::ConnectionClosed | WsErr::AlreadyClosed => Self::ChannelClosed {
                code: 1006,
                reason: err.to_string(),
            },
            _ => Self::Network(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<url::ParseError> for TransportError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

pub type TransportResult<T> = Result<T, TransportError>;
