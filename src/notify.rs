//! Per-session and broadcast notification push.
//!
//! The sender keeps weak references to sessions keyed by id: it can look a
//! session up but never extends its lifetime — the transport owns sessions
//! outright. Sends are non-blocking with a drop policy; a client that
//! cannot keep up loses notifications rather than stalling producers.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::NotifyError;
use crate::protocol::JsonRpcNotification;
use crate::transport::session::{QueueError, Session};

/// Pushes notifications onto session notification channels.
pub struct NotificationSender {
    sessions: RwLock<HashMap<String, Weak<Session>>>,
    cancel: CancellationToken,
}

impl NotificationSender {
    /// Creates a sender tied to the given cancellation token (normally the
    /// transport's lifetime token).
    #[must_use]
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            cancel,
        }
    }

    /// Registers a session for notification delivery.
    pub fn register_session(&self, session: &Arc<Session>) {
        let mut sessions = self.sessions.write().expect("session map lock poisoned");
        sessions.insert(session.id().to_string(), Arc::downgrade(session));
        debug!(session_id = %session.id(), "session registered for notifications");
    }

    /// Unregisters a session, closing its notification channel.
    ///
    /// The channel close is idempotent, so racing with session teardown is
    /// harmless.
    pub fn unregister_session(&self, session_id: &str) {
        let removed = self
            .sessions
            .write()
            .expect("session map lock poisoned")
            .remove(session_id);

        if let Some(weak) = removed {
            if let Some(session) = weak.upgrade() {
                session.close_notifications();
            }
            debug!(session_id = %session_id, "session unregistered");
        }
    }

    /// The number of registered sessions whose owner is still alive.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions
            .read()
            .expect("session map lock poisoned")
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Sends a notification to one session.
    ///
    /// # Errors
    ///
    /// Three mutually exclusive outcomes, checked in priority order:
    /// cancellation ([`NotifyError::Cancelled`]), acceptance (`Ok`), and a
    /// full or closed channel ([`NotifyError::ChannelFullOrClosed`]).
    /// An unknown session id yields [`NotifyError::SessionNotFound`].
    pub async fn send_notification(
        &self,
        session_id: &str,
        notification: JsonRpcNotification,
    ) -> Result<(), NotifyError> {
        if self.cancel.is_cancelled() {
            return Err(NotifyError::Cancelled);
        }

        let session = {
            let sessions = self.sessions.read().expect("session map lock poisoned");
            sessions.get(session_id).and_then(Weak::upgrade)
        };

        let Some(session) = session else {
            return Err(NotifyError::SessionNotFound {
                session_id: session_id.to_string(),
            });
        };

        match session.try_notify(notification) {
            Ok(()) => Ok(()),
            Err(QueueError::Full | QueueError::Closed) => {
                warn!(session_id = %session_id, "notification channel full or closed");
                Err(NotifyError::ChannelFullOrClosed {
                    session_id: session_id.to_string(),
                })
            }
        }
    }

    /// Sends a notification to every registered session in parallel.
    ///
    /// # Errors
    ///
    /// Per-session failures accumulate; the first failure is surfaced
    /// after every send has been attempted. Cancellation before any send
    /// yields [`NotifyError::Cancelled`].
    pub async fn broadcast_notification(
        &self,
        notification: JsonRpcNotification,
    ) -> Result<(), NotifyError> {
        if self.cancel.is_cancelled() {
            return Err(NotifyError::Cancelled);
        }

        let ids: Vec<String> = {
            let sessions = self.sessions.read().expect("session map lock poisoned");
            sessions.keys().cloned().collect()
        };

        let sends = ids
            .iter()
            .map(|id| self.send_notification(id, notification.clone()));
        let results = join_all(sends).await;

        results.into_iter().find_map(Result::err).map_or(Ok(()), Err)
    }
}
