//! Error types for mcp-duplex.
//!
//! Handler failures are classified into domain kinds and mapped onto the
//! JSON-RPC wire codes at the dispatch site; transport and notification
//! failures never reach the wire — they are logged and affect at most one
//! session's liveness.

use thiserror::Error;

use crate::protocol::error_codes;

/// Which handler category produced an error.
///
/// The same handler kind maps to different wire codes depending on the
/// dispatching method, so the engine passes the domain alongside the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerDomain {
    /// `tools/*` methods.
    Tool,
    /// `resources/*` methods.
    Resource,
    /// `prompts/*` methods.
    Prompt,
    /// Custom registered methods.
    Custom,
}

/// Errors returned by tool, resource, prompt, and custom handlers.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The named tool, resource, or prompt does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller supplied invalid or missing arguments.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The caller may not access the named entity.
    #[error("access denied: {0}")]
    Unauthorized(String),

    /// The handler failed while executing.
    #[error("execution failed: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Maps this error onto its JSON-RPC wire code for the given domain.
    ///
    /// Invalid input is `-32602` in every domain. Not-found uses the
    /// domain's dedicated code. Tools and prompts have a dedicated
    /// execution-failure code; resources pair not-found with access denied
    /// instead, so a resource execution failure falls back to the generic
    /// `-32603`, as everything in the custom domain does.
    #[must_use]
    pub const fn wire_code(&self, domain: HandlerDomain) -> i32 {
        match (self, domain) {
            (Self::InvalidInput(_), _) => error_codes::INVALID_PARAMS,

            (Self::NotFound(_), HandlerDomain::Tool) => error_codes::TOOL_NOT_FOUND,
            (Self::NotFound(_), HandlerDomain::Resource) => error_codes::RESOURCE_NOT_FOUND,
            (Self::NotFound(_), HandlerDomain::Prompt) => error_codes::PROMPT_NOT_FOUND,
            (Self::NotFound(_), HandlerDomain::Custom) => error_codes::METHOD_NOT_FOUND,

            (Self::Internal(_), HandlerDomain::Tool) => error_codes::TOOL_EXECUTION_FAILED,
            (Self::Internal(_), HandlerDomain::Prompt) => error_codes::PROMPT_EXECUTION_FAILED,
            (Self::Internal(_), HandlerDomain::Resource | HandlerDomain::Custom) => {
                error_codes::INTERNAL_ERROR
            }

            (Self::Unauthorized(_), HandlerDomain::Resource) => error_codes::RESOURCE_ACCESS_DENIED,
            (Self::Unauthorized(_), _) => error_codes::INTERNAL_ERROR,
        }
    }
}

/// Errors produced by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// `start` was called on a transport that is already running.
    #[error("transport already started")]
    AlreadyStarted,

    /// The transport has been closed; no further sends are possible.
    #[error("transport closed")]
    Closed,

    /// An underlying I/O operation failed.
    #[error("transport I/O error")]
    Io(#[from] std::io::Error),

    /// A message could not be serialised for the wire.
    #[error("failed to encode message")]
    Encode(#[source] serde_json::Error),
}

/// Errors produced by the notification sender.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// No session is registered under the given id.
    #[error("session not found: {session_id}")]
    SessionNotFound {
        /// The unknown session id.
        session_id: String,
    },

    /// The session's notification channel is full or already closed.
    #[error("notification channel full or closed for session {session_id}")]
    ChannelFullOrClosed {
        /// The affected session id.
        session_id: String,
    },

    /// The operation was cancelled before the notification was accepted.
    #[error("notification cancelled")]
    Cancelled,
}

/// Errors produced while validating server configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration value failed validation.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}
