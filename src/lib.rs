//! mcp-duplex: dual-transport Model Context Protocol server framework
//!
//! This library implements the server side of the Model Context Protocol:
//! a JSON-RPC 2.0 dialogue between a language-model client and a server
//! exposing tools, resources, and prompts. The protocol engine is
//! transport-agnostic and ships with two interchangeable transports — a
//! newline-delimited standard-stream transport and an HTTP transport that
//! fans responses and notifications out over per-session Server-Sent-Events
//! streams.
//!
//! # Quick start
//!
//! ```no_run
//! use mcp_duplex::config::StdioConfig;
//! use mcp_duplex::engine::ServerBuilder;
//! use mcp_duplex::handlers::CalculatorTools;
//! use mcp_duplex::transport::{StdioTransport, Transport};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), mcp_duplex::error::TransportError> {
//! let engine = ServerBuilder::new("calculator", "1.0.0")
//!     .with_tool_handler(CalculatorTools::new())
//!     .build();
//!
//! let transport = Arc::new(StdioTransport::stdio(StdioConfig::default()));
//! engine.attach_transport(transport.clone());
//!
//! let root = CancellationToken::new();
//! transport.start(root.child_token(), engine.message_handler()).await?;
//! transport.closed_token().cancelled_owned().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`protocol`] — JSON-RPC message taxonomy and MCP data types
//! - [`engine`] — lifecycle state machine, dispatch, handler registry
//! - [`transport`] — the transport contract and both implementations
//! - [`notify`] — per-session and broadcast notification push
//! - [`handlers`] — ready-made calculator/echo/documentation handlers
//! - [`config`] — transport tuning knobs
//! - [`error`] — error taxonomy and wire-code mapping

pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod notify;
pub mod protocol;
pub mod transport;
