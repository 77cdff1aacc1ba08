//! Session credentials supplied by the identity collaborator.
//!
//! Login and credential persistence live outside this crate. The client only
//! reads the current token/session id for request headers and invalidates
//! them when the server answers 401.

use parking_lot::RwLock;
use tracing::info;

/// Source of request credentials.
#[cfg_attr(test, mockall::automock)]
pub trait CredentialProvider: Send + Sync {
    /// Bearer token for the `Authorization` header.
    fn token(&self) -> Option<String>;

    /// Session id for the `X-Session` header.
    fn session_id(&self) -> Option<String>;

    /// Called once per request that the server rejected as unauthorized.
    fn invalidate(&self);
}

/// In-memory credentials.
#[derive(Debug, Default)]
pub struct SessionCredentials {
    token: RwLock<Option<String>>,
    session_id: RwLock<Option<String>>,
}

impl SessionCredentials {
    pub fn new(token: Option<String>, session_id: Option<String>) -> Self {
        Self {
            token: RwLock::new(token),
            session_id: RwLock::new(session_id),
        }
    }

    /// Credentials that never add auth headers.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn set(&self, token: Option<String>, session_id: Option<String>) {
        *self.token.write() = token;
        *self.session_id.write() = session_id;
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.read().is_some() || self.session_id.read().is_some()
    }
}

impl CredentialProvider for SessionCredentials {
    fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    fn invalidate(&self) {
        let had_session = self.is_authenticated();
        *self.token.write() = None;
        *self.session_id.write() = None;
        if had_session {
            info!("Session invalidated after unauthorized response");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalidate_clears_credentials() {
        let creds = SessionCredentials::new(Some("tok".to_string()), Some("sess".to_string()));
        assert!(creds.is_authenticated());
        assert_eq!(creds.token().as_deref(), Some("tok"));

        creds.invalidate();

        assert!(!creds.is_authenticated());
        assert_eq!(creds.token(), None);
        assert_eq!(creds.session_id(), None);
    }

    #[test]
    fn test_anonymous_has_no_headers() {
        let creds = SessionCredentials::anonymous();
        assert_eq!(creds.token(), None);
        assert_eq!(creds.session_id(), None);
    }
}
