//! Transport abstraction.
//!
//! A transport moves [`JsonRpcMessage`]s between the engine and one or more
//! clients. Two implementations share the contract: a newline-delimited
//! standard-stream transport and an HTTP + Server-Sent-Events transport
//! with per-session fan-out. Both present identical semantics to the
//! engine:
//!
//! - `start` begins producing decoded messages, delivering each exactly
//!   once to the supplied handler, and returns once setup is complete;
//!   delivery proceeds concurrently. Starting twice fails.
//! - `send` encodes and delivers one message toward the client(s); after
//!   `close` it returns an error without partial writes.
//! - `close` is idempotent, releases every resource, and unwinds pending
//!   `start` work.
//!
//! Send ordering is preserved per transport-client pair; nothing is
//! guaranteed across sessions.

pub mod http;
pub mod session;
pub mod stdio;

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;
use crate::protocol::JsonRpcMessage;

pub use http::HttpSseTransport;
pub use session::{Session, SessionPool, SseEvent};
pub use stdio::StdioTransport;

/// The engine-side callback a transport delivers decoded messages to.
///
/// The handler owns dispatch: it returns the response to write back for
/// requests and `None` for notifications. Parameterising `start` with this
/// function value keeps transports free of engine back-pointers.
pub type MessageHandler =
    Arc<dyn Fn(JsonRpcMessage) -> BoxFuture<'static, Option<JsonRpcMessage>> + Send + Sync>;

/// Uniform `start` / `send` / `close` contract consumed by the engine.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Begins producing decoded messages.
    ///
    /// Returns once setup (binding, task spawning) is complete; message
    /// delivery continues concurrently until `cancel` fires or the
    /// transport is closed.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::AlreadyStarted`] on a second call and
    /// propagates setup failures such as a failed bind.
    async fn start(
        &self,
        cancel: CancellationToken,
        handler: MessageHandler,
    ) -> Result<(), TransportError>;

    /// Encodes and delivers one message toward the client(s).
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] after `close`, and propagates
    /// encoding and I/O failures.
    async fn send(&self, message: &JsonRpcMessage) -> Result<(), TransportError>;

    /// Releases all resources and closes all session channels.
    ///
    /// Idempotent: closing twice succeeds.
    ///
    /// # Errors
    ///
    /// Propagates resource release failures; a second call returns `Ok`.
    async fn close(&self) -> Result<(), TransportError>;
}
