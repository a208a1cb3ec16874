//! HTTP sessions and the connection pool.
//!
//! A session is one open SSE stream. The transport exclusively owns it:
//! created on the SSE `GET`, destroyed when the request context ends or the
//! server shuts down. Each session carries two bounded channels — the event
//! queue drained by the SSE writer and the notification channel drained by
//! the notification pump — and a cancellation token derived from the
//! transport lifetime. Channel closure happens exactly once, on session
//! close.
//!
//! Enqueueing never blocks: a full or closed queue rejects the event and
//! the caller decides whether that is worth more than a warning.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::protocol::JsonRpcNotification;

/// One frame bound for a session's SSE stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// SSE event name (`connected`, `endpoint`, `message`, ...).
    pub event: String,
    /// Single-line payload.
    pub data: String,
}

impl SseEvent {
    /// Creates an event.
    #[must_use]
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }
}

/// Why an enqueue was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The bounded queue is at capacity.
    Full,
    /// The session has been closed.
    Closed,
}

/// A logical client connection on the HTTP transport.
pub struct Session {
    id: String,
    user_agent: Option<String>,
    cancel: CancellationToken,
    event_tx: StdMutex<Option<mpsc::Sender<SseEvent>>>,
    notify_tx: StdMutex<Option<mpsc::Sender<JsonRpcNotification>>>,
    closed: AtomicBool,
    notify_closed: AtomicBool,
}

impl Session {
    /// Creates a session with bounded channels, returning the receivers
    /// for the writer loop and the notification pump.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        user_agent: Option<String>,
        parent: &CancellationToken,
        event_queue_size: usize,
        notification_queue_size: usize,
    ) -> (
        Arc<Self>,
        mpsc::Receiver<SseEvent>,
        mpsc::Receiver<JsonRpcNotification>,
    ) {
        let (event_tx, event_rx) = mpsc::channel(event_queue_size);
        let (notify_tx, notify_rx) = mpsc::channel(notification_queue_size);

        let session = Arc::new(Self {
            id: id.into(),
            user_agent,
            cancel: parent.child_token(),
            event_tx: StdMutex::new(Some(event_tx)),
            notify_tx: StdMutex::new(Some(notify_tx)),
            closed: AtomicBool::new(false),
            notify_closed: AtomicBool::new(false),
        });

        (session, event_rx, notify_rx)
    }

    /// The session id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The client's user agent, if it sent one.
    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// This session's cancellation token, a child of the transport token.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether the session has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Enqueues a frame on the event queue without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Full`] at capacity and [`QueueError::Closed`]
    /// once the session is closed.
    pub fn try_enqueue(&self, event: SseEvent) -> Result<(), QueueError> {
        let sender = {
            let guard = self.event_tx.lock().expect("event sender lock poisoned");
            guard.clone()
        };
        let Some(sender) = sender else {
            return Err(QueueError::Closed);
        };
        sender.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => QueueError::Full,
            TrySendError::Closed(_) => QueueError::Closed,
        })
    }

    /// Enqueues a notification on the notification channel without
    /// blocking.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Full`] at capacity and [`QueueError::Closed`]
    /// once the channel is closed.
    pub fn try_notify(&self, notification: JsonRpcNotification) -> Result<(), QueueError> {
        let sender = {
            let guard = self.notify_tx.lock().expect("notify sender lock poisoned");
            guard.clone()
        };
        let Some(sender) = sender else {
            return Err(QueueError::Closed);
        };
        sender.try_send(notification).map_err(|e| match e {
            TrySendError::Full(_) => QueueError::Full,
            TrySendError::Closed(_) => QueueError::Closed,
        })
    }

    /// Closes the notification channel. Idempotent: only the first call
    /// releases the sender.
    pub fn close_notifications(&self) {
        if self.notify_closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.notify_tx
            .lock()
            .expect("notify sender lock poisoned")
            .take();
    }

    /// Closes the session: cancels its token, then closes the event queue
    /// and the notification channel, in that order, each exactly once.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        // Cancelling first stops the producers (pump, endpoint) before
        // their channels disappear.
        self.cancel.cancel();
        self.event_tx
            .lock()
            .expect("event sender lock poisoned")
            .take();
        self.close_notifications();
        debug!(session_id = %self.id, "session closed");
    }
}

/// A thread-safe map of live sessions keyed by id.
///
/// Reads (lookup, broadcast) dominate; writes are session add/remove, so
/// the map sits behind a read-write lock.
#[derive(Default)]
pub struct SessionPool {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session to the pool.
    pub async fn add(&self, session: Arc<Session>) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id().to_string(), session);
    }

    /// Removes and closes a session. Returns the session if it was
    /// present.
    pub async fn remove(&self, id: &str) -> Option<Arc<Session>> {
        let session = self.sessions.write().await.remove(id);
        if let Some(session) = &session {
            session.close();
        }
        session
    }

    /// Removes `session` only if the pooled entry under its id is the same
    /// instance. A reconnect may have replaced the id in the meantime, and
    /// the stale connection must not evict its successor.
    pub async fn remove_if_same(&self, session: &Arc<Session>) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get(session.id()) {
            Some(current) if Arc::ptr_eq(current, session) => {
                sessions.remove(session.id());
                session.close();
                true
            }
            _ => false,
        }
    }

    /// Looks up a session by id.
    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// The number of live sessions.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Enqueues an event on every session without blocking.
    ///
    /// Full or closed queues are skipped with a warning; one slow client
    /// never stalls the rest.
    pub async fn broadcast(&self, event: &SseEvent) {
        let sessions = self.sessions.read().await;
        for session in sessions.values() {
            match session.try_enqueue(event.clone()) {
                Ok(()) => {}
                Err(QueueError::Full) => {
                    warn!(
                        session_id = %session.id(),
                        event = %event.event,
                        "event queue full, dropping broadcast event"
                    );
                }
                Err(QueueError::Closed) => {
                    debug!(session_id = %session.id(), "skipping closed session");
                }
            }
        }
    }

    /// Closes every session and empties the pool.
    pub async fn close_all(&self) {
        let sessions: Vec<Arc<Session>> = {
            let mut map = self.sessions.write().await;
            map.drain().map(|(_, s)| s).collect()
        };
        for session in sessions {
            session.close();
        }
    }
}
