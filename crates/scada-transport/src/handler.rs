//! Per-kind push message handlers.
//!
//! At most one handler per message kind. Registering again replaces the
//! previous handler (last writer wins). Each registration returns a
//! `HandlerSubscription` that removes it again, unless it has already been
//! replaced by a newer registration.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::message::{MessageKind, PushMessage};

/// Callback invoked for a message of the registered kind.
pub type MessageHandler = Arc<dyn Fn(&PushMessage) + Send + Sync>;

struct Registration {
    id: u64,
    handler: MessageHandler,
}

#[derive(Default)]
struct RegistryInner {
    handlers: DashMap<MessageKind, Registration>,
    next_id: AtomicU64,
}

/// Kind → handler mapping shared between the push channel and its users.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    inner: Arc<RegistryInner>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`, replacing any existing handler.
    pub fn register<F>(&self, kind: MessageKind, handler: F) -> HandlerSubscription
    where
        F: Fn(&PushMessage) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let replaced = self
            .inner
            .handlers
            .insert(
                kind.clone(),
                Registration {
                    id,
                    handler: Arc::new(handler),
                },
            )
            .is_some();

        debug!(%kind, id, replaced, "Registered push handler");

        HandlerSubscription {
            registry: Arc::downgrade(&self.inner),
            kind,
            id,
        }
    }

    /// Invoke the handler registered for the message's kind.
    ///
    /// Returns `true` if a handler ran. The handler is cloned out of the map
    /// before it is called, so handlers may register or unsubscribe.
    pub fn dispatch(&self, message: &PushMessage) -> bool {
        let Some(kind) = message.kind() else {
            return false;
        };

        let handler = self
            .inner
            .handlers
            .get(&kind)
            .map(|entry| entry.handler.clone());

        match handler {
            Some(handler) => {
                handler(message);
                true
            }
            None => {
                trace!(%kind, "No handler registered");
                false
            }
        }
    }

    pub fn is_registered(&self, kind: &MessageKind) -> bool {
        self.inner.handlers.contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.inner.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.handlers.is_empty()
    }

    /// Drop every registration.
    pub fn clear(&self) {
        self.inner.handlers.clear();
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<String> = self
            .inner
            .handlers
            .iter()
            .map(|e| e.key().to_string())
            .collect();
        f.debug_struct("HandlerRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}

/// Disposer for one handler registration.
///
/// Dropping it leaves the handler registered; call `unsubscribe` to remove it.
#[derive(Debug)]
pub struct HandlerSubscription {
    registry: Weak<RegistryInner>,
    kind: MessageKind,
    id: u64,
}

impl HandlerSubscription {
    pub fn kind(&self) -> &MessageKind {
        &self.kind
    }

    /// Remove this registration.
    ///
    /// Returns `false` if it was already replaced or the registry is gone.
    pub fn unsubscribe(self) -> bool {
        let Some(inner) = self.registry.upgrade() else {
            return false;
        };
        let removed = inner
            .handlers
            .remove_if(&self.kind, |_, reg| reg.id == self.id)
            .is_some();
        debug!(kind = %self.kind, id = self.id, removed, "Unsubscribed push handler");
        removed
    }
}
