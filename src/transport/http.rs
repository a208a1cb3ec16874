//! HTTP + Server-Sent-Events transport.
//!
//! Two endpoints, both under the configured base path:
//!
//! - `GET /sse` opens a stream. The transport allocates a session, emits a
//!   `connected` event carrying the session id and an `endpoint` event
//!   carrying the absolute message URL, then drains the session's event
//!   queue into SSE frames for as long as the request lives.
//! - `POST /message?sessionId=<id>` submits one JSON-RPC message. Requests
//!   produce a response that is enqueued on the session's SSE stream *and*
//!   returned as the HTTP body; notifications are accepted with 202.
//!
//! Every session runs independently: a notification pump task moves values
//! from the session's notification channel onto its event queue, and the
//! writer loop runs in the request's own task. Queues are bounded and
//! never block producers; overflow drops the event with a warning. A
//! background ticker broadcasts `system/heartbeat` so intermediaries keep
//! idle streams open.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::HttpConfig;
use crate::error::{ConfigError, TransportError};
use crate::notify::NotificationSender;
use crate::protocol::{
    classify_value, error_codes, JsonRpcMessage, JsonRpcNotification, JsonRpcResponse,
};
use crate::transport::session::{QueueError, Session, SessionPool, SseEvent};
use crate::transport::{MessageHandler, Transport};

/// Query parameters accepted by both endpoints.
#[derive(Debug, Deserialize)]
struct SessionQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

/// Shared state handed to the axum handlers.
#[derive(Clone)]
struct HttpState {
    config: Arc<HttpConfig>,
    pool: Arc<SessionPool>,
    notifier: Arc<NotificationSender>,
    handler: MessageHandler,
    lifetime: CancellationToken,
    /// The address the listener actually bound (relevant with port 0).
    advertised: SocketAddr,
}

/// Removes the session from the pool when the SSE stream is dropped,
/// whether by client disconnect or server shutdown.
struct SessionGuard {
    session: Arc<Session>,
    pool: Arc<SessionPool>,
    notifier: Arc<NotificationSender>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.session.close();

        let pool = Arc::clone(&self.pool);
        let notifier = Arc::clone(&self.notifier);
        let session = Arc::clone(&self.session);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                // A reconnect with the same id replaces both the pool entry
                // and the notifier registration; only the current holder
                // may evict them.
                if pool.remove_if_same(&session).await {
                    notifier.unregister_session(session.id());
                }
            });
        }
    }
}

/// The HTTP + SSE transport.
pub struct HttpSseTransport {
    config: Arc<HttpConfig>,
    pool: Arc<SessionPool>,
    notifier: Arc<NotificationSender>,
    /// Cancelled by `close`, by external cancellation, and by listener
    /// failure; every session token is a child of it.
    lifetime: CancellationToken,
    started: AtomicBool,
    closed: AtomicBool,
    local_addr: StdMutex<Option<SocketAddr>>,
}

impl HttpSseTransport {
    /// Creates a transport from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails validation.
    pub fn new(config: HttpConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let lifetime = CancellationToken::new();
        Ok(Self {
            config: Arc::new(config),
            pool: Arc::new(SessionPool::new()),
            notifier: Arc::new(NotificationSender::new(lifetime.clone())),
            lifetime,
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            local_addr: StdMutex::new(None),
        })
    }

    /// The session pool, for host-level introspection.
    #[must_use]
    pub fn pool(&self) -> Arc<SessionPool> {
        Arc::clone(&self.pool)
    }

    /// The notification sender bound to this transport's sessions.
    #[must_use]
    pub fn notifier(&self) -> Arc<NotificationSender> {
        Arc::clone(&self.notifier)
    }

    /// The address the listener bound, available once `start` returned.
    ///
    /// # Panics
    ///
    /// Panics if the address lock is poisoned, which cannot happen because
    /// no code path panics while holding it.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().expect("address lock poisoned")
    }

    /// A token cancelled once the transport has closed.
    #[must_use]
    pub fn closed_token(&self) -> CancellationToken {
        self.lifetime.clone()
    }

    /// Builds the axum router for this transport.
    fn router(&self, state: HttpState) -> Router {
        let base = &self.config.base_path;
        Router::new()
            .route(&format!("{base}/sse"), get(handle_sse))
            .route(&format!("{base}/message"), post(handle_message))
            .route(&format!("{base}/health"), get(handle_health))
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Spawns the heartbeat ticker, if enabled.
    fn spawn_heartbeat(&self) {
        let Some(interval) = self.config.heartbeat_interval() else {
            return;
        };

        let pool = Arc::clone(&self.pool);
        let cancel = self.lifetime.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick completes immediately; a heartbeat at t=0
            // would be noise.
            ticker.tick().await;

            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let timestamp = SystemTime::now()
                            .duration_since(UNIX_EPOCH)
                            .map_or(0, |d| d.as_secs());
                        let notification = JsonRpcNotification::new(
                            "system/heartbeat",
                            Some(json!({ "timestamp": timestamp })),
                        );
                        match serde_json::to_string(&notification) {
                            Ok(data) => {
                                pool.broadcast(&SseEvent::new("system/heartbeat", data)).await;
                            }
                            Err(e) => error!(error = %e, "failed to encode heartbeat"),
                        }
                    }
                }
            }
        });
    }
}

#[async_trait]
impl Transport for HttpSseTransport {
    async fn start(
        &self,
        cancel: CancellationToken,
        handler: MessageHandler,
    ) -> Result<(), TransportError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(TransportError::AlreadyStarted);
        }

        let addr = self
            .config
            .socket_addr()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
        let listener = TcpListener::bind(addr).await?;
        let advertised = listener.local_addr()?;
        *self.local_addr.lock().expect("address lock poisoned") = Some(advertised);

        info!(addr = %advertised, "HTTP transport listening");

        // External cancellation folds into the transport lifetime.
        {
            let lifetime = self.lifetime.clone();
            tokio::spawn(async move {
                tokio::select! {
                    () = cancel.cancelled() => lifetime.cancel(),
                    () = lifetime.cancelled() => {}
                }
            });
        }

        let state = HttpState {
            config: Arc::clone(&self.config),
            pool: Arc::clone(&self.pool),
            notifier: Arc::clone(&self.notifier),
            handler,
            lifetime: self.lifetime.clone(),
            advertised,
        };
        let router = self.router(state);

        let lifetime = self.lifetime.clone();
        let shutdown_timeout = self.config.shutdown_timeout();
        tokio::spawn(async move {
            let shutdown = {
                let lifetime = lifetime.clone();
                async move { lifetime.cancelled().await }
            };
            let serve = axum::serve(listener, router).with_graceful_shutdown(shutdown);

            let deadline = {
                let lifetime = lifetime.clone();
                async move {
                    lifetime.cancelled().await;
                    tokio::time::sleep(shutdown_timeout).await;
                }
            };

            tokio::select! {
                result = serve => {
                    if let Err(e) = result {
                        error!(error = %e, "HTTP server error");
                    }
                    lifetime.cancel();
                }
                () = deadline => {
                    warn!("graceful shutdown timed out, abandoning open connections");
                }
            }
        });

        self.spawn_heartbeat();
        Ok(())
    }

    async fn send(&self, message: &JsonRpcMessage) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) || self.lifetime.is_cancelled() {
            return Err(TransportError::Closed);
        }

        // Forwarded requests are named after their method; forwarded
        // responses use the dedicated `response` event name.
        let event = match message {
            JsonRpcMessage::Request(req) => req.method.clone(),
            JsonRpcMessage::Response(_) => "response".to_string(),
            JsonRpcMessage::Notification(_) => "message".to_string(),
        };
        let data = message.to_json().map_err(TransportError::Encode)?;
        self.pool.broadcast(&SseEvent::new(event, data)).await;
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        // Cancelling stops the producers (heartbeat, pumps) before the
        // pool closes their channels.
        self.lifetime.cancel();
        self.pool.close_all().await;
        debug!("HTTP transport closed");
        Ok(())
    }
}

/// `GET /sse`: open a stream and pin a session to it.
async fn handle_sse(
    State(state): State<HttpState>,
    headers: HeaderMap,
    Query(query): Query<SessionQuery>,
) -> Response {
    if state.lifetime.is_cancelled() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let session_id = query
        .session_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let (session, event_rx, notify_rx) = Session::new(
        session_id.clone(),
        user_agent,
        &state.lifetime,
        state.config.event_queue_size,
        state.config.notification_queue_size,
    );

    state.pool.add(Arc::clone(&session)).await;
    state.notifier.register_session(&session);
    info!(session_id = %session_id, "SSE session opened");

    spawn_notification_pump(Arc::clone(&session), notify_rx);

    let endpoint_url = format!(
        "http://{}{}/message?sessionId={}",
        state.advertised, state.config.base_path, session_id
    );
    let connected = json!({ "sessionId": session_id }).to_string();
    let initial = vec![
        Event::default().event("connected").data(connected),
        Event::default().event("endpoint").data(endpoint_url),
    ];

    let guard = SessionGuard {
        session,
        pool: Arc::clone(&state.pool),
        notifier: Arc::clone(&state.notifier),
    };

    // The guard lives inside the stream; dropping the stream (client
    // disconnect or shutdown) tears the session down.
    let frames = stream::iter(initial)
        .chain(
            ReceiverStream::new(event_rx)
                .map(|frame: SseEvent| Event::default().event(frame.event).data(frame.data)),
        )
        .map(move |event| {
            let _held = &guard;
            Ok::<Event, Infallible>(event)
        });

    (
        [
            ("Cache-Control", "no-cache"),
            ("Connection", "keep-alive"),
        ],
        Sse::new(frames),
    )
        .into_response()
}

/// Moves values from the notification channel onto the event queue as
/// `message` frames. Exits when the session is cancelled or either channel
/// closes; never blocks on a full queue.
fn spawn_notification_pump(
    session: Arc<Session>,
    mut notify_rx: tokio::sync::mpsc::Receiver<JsonRpcNotification>,
) {
    let cancel = session.cancel_token();
    tokio::spawn(async move {
        loop {
            let notification = tokio::select! {
                () = cancel.cancelled() => break,
                maybe = notify_rx.recv() => match maybe {
                    Some(n) => n,
                    None => break,
                },
            };

            let data = match serde_json::to_string(&notification) {
                Ok(data) => data,
                Err(e) => {
                    error!(error = %e, "failed to encode notification");
                    continue;
                }
            };

            match session.try_enqueue(SseEvent::new("message", data)) {
                Ok(()) => {}
                Err(QueueError::Full) => {
                    warn!(
                        session_id = %session.id(),
                        "event queue full, dropping notification"
                    );
                }
                Err(QueueError::Closed) => break,
            }
        }
        debug!(session_id = %session.id(), "notification pump stopped");
    });
}

/// `POST /message?sessionId=<id>`: submit one JSON-RPC message.
async fn handle_message(
    State(state): State<HttpState>,
    Query(query): Query<SessionQuery>,
    body: Bytes,
) -> Response {
    if state.lifetime.is_cancelled() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let Some(session) = (match &query.session_id {
        Some(id) => state.pool.get(id).await,
        None => None,
    }) else {
        let response = JsonRpcResponse::error(
            None,
            error_codes::INVALID_PARAMS,
            "Invalid session ID",
        );
        return (StatusCode::BAD_REQUEST, Json(response)).into_response();
    };

    let value: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            let response = JsonRpcResponse::error(
                None,
                error_codes::PARSE_ERROR,
                format!("parse error: {e}"),
            );
            return (StatusCode::BAD_REQUEST, Json(response)).into_response();
        }
    };

    let message = match classify_value(value) {
        Ok(message) => message,
        Err(e) => {
            let response = e.into_response();
            return (StatusCode::BAD_REQUEST, Json(response)).into_response();
        }
    };

    debug!(
        session_id = %session.id(),
        method = message.method().unwrap_or("<response>"),
        "message received"
    );

    let dispatched =
        tokio::time::timeout(state.config.dispatch_timeout(), (state.handler)(message)).await;

    let produced = match dispatched {
        Ok(produced) => produced,
        Err(_) => {
            warn!(session_id = %session.id(), "dispatch timed out");
            let response = JsonRpcResponse::error(
                None,
                error_codes::INTERNAL_ERROR,
                "dispatch timed out",
            );
            return (StatusCode::SERVICE_UNAVAILABLE, Json(response)).into_response();
        }
    };

    match produced {
        Some(response) => {
            let data = match response.to_json() {
                Ok(data) => data,
                Err(e) => {
                    error!(error = %e, "failed to encode response");
                    let response = JsonRpcResponse::error(
                        None,
                        error_codes::INTERNAL_ERROR,
                        "failed to encode response",
                    );
                    return (StatusCode::SERVICE_UNAVAILABLE, Json(response)).into_response();
                }
            };

            // The SSE copy is enqueued before the HTTP body goes out, so a
            // client watching both never sees the body first.
            match session.try_enqueue(SseEvent::new("message", data.clone())) {
                Ok(()) => {}
                Err(QueueError::Full) => {
                    warn!(
                        session_id = %session.id(),
                        "event queue full, dropping response copy"
                    );
                }
                Err(QueueError::Closed) => {
                    debug!(session_id = %session.id(), "session closed before response copy");
                }
            }

            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                data,
            )
                .into_response()
        }
        // Notifications (and stray responses) are accepted without a body.
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// `GET /health`: liveness probe.
async fn handle_health() -> Response {
    Json(json!({ "status": "ok" })).into_response()
}
