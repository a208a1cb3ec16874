//! Standard-stream transport: one JSON value per line.
//!
//! Framing is a single `\n` terminator; CR bytes in input are tolerated.
//! The read loop keeps a byte buffer, extracts complete lines, silently
//! drops lines that do not decode, and hands every decoded message to the
//! message handler in arrival order. Responses returned by the handler are
//! written back as compact JSON followed by `\n` and flushed.
//!
//! Reads are chunked so cancellation terminates the loop within a bounded
//! delay; EOF closes the transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use crate::config::StdioConfig;
use crate::error::TransportError;
use crate::protocol::{parse_message, JsonRpcMessage, ProtocolError};
use crate::transport::{MessageHandler, Transport};

/// Shared state between the transport handle and its read task.
struct Inner<W> {
    writer: Mutex<Option<W>>,
    closed: AtomicBool,
    /// Cancelled by `close` and by EOF; ends the read loop.
    lifetime: CancellationToken,
}

impl<W> Inner<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Writes one encoded message followed by `\n` and flushes.
    async fn write_message(&self, message: &JsonRpcMessage) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }

        let mut line = message.to_json().map_err(TransportError::Encode)?;
        line.push('\n');

        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(TransportError::Closed);
        };
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Marks the transport closed and releases the writer. Idempotent.
    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.lifetime.cancel();
        self.writer.lock().await.take();
    }
}

/// Newline-delimited JSON transport over an arbitrary stream pair.
///
/// [`StdioTransport::stdio`] wires it to the process standard streams;
/// tests supply in-memory duplex pairs.
pub struct StdioTransport<R, W> {
    config: StdioConfig,
    reader: StdMutex<Option<R>>,
    inner: Arc<Inner<W>>,
    started: AtomicBool,
}

impl StdioTransport<tokio::io::Stdin, tokio::io::Stdout> {
    /// Creates a transport over the process standard streams.
    #[must_use]
    pub fn stdio(config: StdioConfig) -> Self {
        Self::new(config, tokio::io::stdin(), tokio::io::stdout())
    }
}

impl<R, W> StdioTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Creates a transport over the given stream pair.
    #[must_use]
    pub fn new(config: StdioConfig, reader: R, writer: W) -> Self {
        Self {
            config,
            reader: StdMutex::new(Some(reader)),
            inner: Arc::new(Inner {
                writer: Mutex::new(Some(writer)),
                closed: AtomicBool::new(false),
                lifetime: CancellationToken::new(),
            }),
            started: AtomicBool::new(false),
        }
    }

    /// A token cancelled once the transport has closed (EOF, `close`, or
    /// external cancellation). Hosts wait on this to learn the connection
    /// ended.
    #[must_use]
    pub fn closed_token(&self) -> CancellationToken {
        self.inner.lifetime.clone()
    }

    /// The read loop: chunked reads, line extraction, dispatch.
    async fn read_loop(
        inner: Arc<Inner<W>>,
        mut reader: R,
        cancel: CancellationToken,
        handler: MessageHandler,
        config: StdioConfig,
    ) {
        let mut buffer: Vec<u8> = Vec::new();
        let mut chunk = vec![0u8; config.read_chunk_size.max(1)];

        loop {
            let read = tokio::select! {
                () = cancel.cancelled() => break,
                () = inner.lifetime.cancelled() => break,
                read = reader.read(&mut chunk) => read,
            };

            match read {
                Ok(0) => {
                    debug!("input stream reached EOF");
                    break;
                }
                Ok(n) => {
                    buffer.extend_from_slice(&chunk[..n]);
                    while let Some(line) = extract_line(&mut buffer) {
                        Self::dispatch_line(&inner, &handler, &line).await;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {
                    tokio::time::sleep(config.retry_backoff()).await;
                }
                Err(e) => {
                    error!(error = %e, "read failed, closing transport");
                    break;
                }
            }
        }

        inner.close().await;
    }

    /// Decodes one line and hands it to the handler; writes back any
    /// response the handler produces.
    ///
    /// Invalid lines are dropped without response; a write failure is
    /// logged and does not terminate the loop.
    async fn dispatch_line(inner: &Inner<W>, handler: &MessageHandler, line: &str) {
        let message = match parse_message(line) {
            Ok(message) => message,
            Err(ProtocolError::Parse(e)) => {
                trace!(error = %e, "dropping malformed line");
                return;
            }
            Err(ProtocolError::InvalidRequest(reason)) => {
                debug!(%reason, "dropping invalid message");
                return;
            }
        };

        if let Some(response) = handler(message).await {
            if let Err(e) = inner.write_message(&response).await {
                error!(error = %e, "failed to write response");
            }
        }
    }
}

#[async_trait]
impl<R, W> Transport for StdioTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn start(
        &self,
        cancel: CancellationToken,
        handler: MessageHandler,
    ) -> Result<(), TransportError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(TransportError::AlreadyStarted);
        }

        let reader = self
            .reader
            .lock()
            .expect("reader lock poisoned")
            .take()
            .ok_or(TransportError::AlreadyStarted)?;

        let inner = Arc::clone(&self.inner);
        let config = self.config.clone();
        tokio::spawn(Self::read_loop(inner, reader, cancel, handler, config));

        Ok(())
    }

    async fn send(&self, message: &JsonRpcMessage) -> Result<(), TransportError> {
        self.inner.write_message(message).await
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.inner.close().await;
        Ok(())
    }
}

/// Removes and returns the first complete line from `buffer`.
///
/// The trailing `\n` is stripped, as is a trailing `\r`. Returns `None`
/// until a full line is buffered; blank lines yield empty strings the
/// caller skips via the JSON parse path.
fn extract_line(buffer: &mut Vec<u8>) -> Option<String> {
    let pos = buffer.iter().position(|&b| b == b'\n')?;
    let mut line: Vec<u8> = buffer.drain(..=pos).collect();
    line.pop(); // the \n itself
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Some(String::from_utf8_lossy(&line).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_line_waits_for_terminator() {
        let mut buffer = b"{\"partial\":tr".to_vec();
        assert!(extract_line(&mut buffer).is_none());

        buffer.extend_from_slice(b"ue}\n");
        assert_eq!(extract_line(&mut buffer).unwrap(), "{\"partial\":true}");
        assert!(buffer.is_empty());
    }

    #[test]
    fn extract_line_strips_carriage_return() {
        let mut buffer = b"{}\r\n{\"a\":1}\n".to_vec();
        assert_eq!(extract_line(&mut buffer).unwrap(), "{}");
        assert_eq!(extract_line(&mut buffer).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn extract_line_handles_consecutive_newlines() {
        let mut buffer = b"\n\n{}\n".to_vec();
        assert_eq!(extract_line(&mut buffer).unwrap(), "");
        assert_eq!(extract_line(&mut buffer).unwrap(), "");
        assert_eq!(extract_line(&mut buffer).unwrap(), "{}");
        assert!(extract_line(&mut buffer).is_none());
    }
}
