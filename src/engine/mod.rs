//! Protocol engine.
//!
//! The engine sits between the transports and the user-registered handlers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Engine                             │
//! │                                                             │
//! │   ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    │
//! │   │  Transport  │───▶│  Lifecycle  │───▶│  Handlers   │    │
//! │   │ (stdio/SSE) │    │  + dispatch │    │ (registry)  │    │
//! │   └─────────────┘    └─────────────┘    └─────────────┘    │
//! │          ▲                  │                               │
//! │          └── notifications ─┘                               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Transports deliver decoded [`JsonRpcMessage`](crate::protocol::JsonRpcMessage)s
//! to the engine's message handler and write back whatever response it
//! produces; the engine never touches bytes. Handlers are registered at
//! construction time through the [`ServerBuilder`] and read without locking
//! afterwards.

pub mod builder;
pub mod profile;
pub mod registry;
pub mod server;

pub use builder::ServerBuilder;
pub use profile::{ClientProfile, ProfileRegistry};
pub use registry::{
    CustomHandler, HandlerRegistry, PromptHandler, ResourceHandler, ToolHandler,
};
pub use server::{ClientInfo, Engine};
