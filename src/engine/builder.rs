//! Fluent server construction.
//!
//! The builder is the only way to assemble an [`Engine`]; it fixes the
//! server identity, registers handlers (which enables the matching
//! capabilities), and installs client profiles. Everything is settled
//! before `build` returns, so the running engine never locks its registry.
//!
//! ```no_run
//! use mcp_duplex::engine::ServerBuilder;
//! use mcp_duplex::handlers::CalculatorTools;
//!
//! let engine = ServerBuilder::new("my-server", "1.0.0")
//!     .with_tool_handler(CalculatorTools::new())
//!     .build();
//! ```

use std::sync::Arc;

use serde_json::Value;

use crate::engine::profile::{ClientProfile, ProfileRegistry};
use crate::engine::registry::{
    CustomHandler, HandlerRegistry, PromptHandler, ResourceHandler, ToolHandler,
};
use crate::engine::server::Engine;
use crate::protocol::ServerInfo;

/// Assembles an [`Engine`] from server identity, handlers, and profiles.
pub struct ServerBuilder {
    info: ServerInfo,
    registry: HandlerRegistry,
    profiles: ProfileRegistry,
}

impl ServerBuilder {
    /// Starts a builder for a server with the given name and version.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            info: ServerInfo::new(name, version),
            registry: HandlerRegistry::new(),
            profiles: ProfileRegistry::new(),
        }
    }

    /// Attaches free-form metadata to the server info.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.info.metadata = Some(metadata);
        self
    }

    /// Registers the tool handler and enables the tools capability.
    #[must_use]
    pub fn with_tool_handler(mut self, handler: impl ToolHandler + 'static) -> Self {
        self.registry.register_tool_handler(Arc::new(handler));
        self
    }

    /// Registers the resource handler and enables the resources capability.
    #[must_use]
    pub fn with_resource_handler(mut self, handler: impl ResourceHandler + 'static) -> Self {
        self.registry.register_resource_handler(Arc::new(handler));
        self
    }

    /// Registers the prompt handler and enables the prompts capability.
    #[must_use]
    pub fn with_prompt_handler(mut self, handler: impl PromptHandler + 'static) -> Self {
        self.registry.register_prompt_handler(Arc::new(handler));
        self
    }

    /// Registers a handler for a method outside the standard dispatch table.
    #[must_use]
    pub fn with_custom_handler(
        mut self,
        method: impl Into<String>,
        handler: impl CustomHandler + 'static,
    ) -> Self {
        self.registry
            .register_custom_handler(method, Arc::new(handler));
        self
    }

    /// Registers a client profile matched against client names containing
    /// `prefix`.
    #[must_use]
    pub fn with_profile(mut self, prefix: impl Into<String>, profile: ClientProfile) -> Self {
        self.profiles.register(prefix, profile);
        self
    }

    /// Finalises the engine.
    #[must_use]
    pub fn build(self) -> Arc<Engine> {
        Arc::new(Engine::new(self.info, self.registry, self.profiles))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_fixes_identity() {
        let engine = ServerBuilder::new("test-server", "0.1.0").build();
        assert_eq!(engine.info().name, "test-server");
        assert!(!engine.is_initialized());
    }
}
