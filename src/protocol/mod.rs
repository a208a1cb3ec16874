//! JSON-RPC 2.0 message layer.
//!
//! This module defines the wire-level message taxonomy and the MCP data
//! types carried inside it. Every byte exchanged with a client decodes into
//! a [`JsonRpcMessage`] and every reply encodes from one:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     JsonRpcMessage                       │
//! │                                                          │
//! │   Request ──────── method present, id present            │
//! │   Notification ─── method present, id absent             │
//! │   Response ─────── method absent                         │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The discriminator is field presence, not an explicit tag; see
//! [`parse_message`] for the exact classification rules.

pub mod message;
pub mod types;

pub use message::{
    classify_value, error_codes, parse_message, ErrorObject, JsonRpcMessage, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, ProtocolError, RequestId, JSONRPC_VERSION,
};
pub use types::{
    Capabilities, Content, Prompt, PromptArgument, PromptsCapability, Resource,
    ResourcesCapability, ServerInfo, Tool, ToolsCapability,
};
