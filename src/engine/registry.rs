//! Handler registration and capability derivation.
//!
//! The engine recognises four handler roles. Registering a handler for a
//! category enables the corresponding capability advertised on `initialize`.
//! Registration happens at construction time; afterwards the registry is
//! read-only and dispatch reads it concurrently without locking.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::HandlerError;
use crate::protocol::{
    Capabilities, Content, Prompt, PromptsCapability, Resource, ResourcesCapability, Tool,
    ToolsCapability,
};

/// Serves `tools/list` and `tools/call`.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Lists the tools this handler exposes.
    ///
    /// An empty list is valid; the tools capability stays advertised.
    async fn list_tools(&self) -> Result<Vec<Tool>, HandlerError>;

    /// Invokes the named tool with the given arguments.
    async fn call_tool(&self, name: &str, arguments: &Value) -> Result<Vec<Content>, HandlerError>;
}

/// Serves `resources/list` and `resources/get`.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Lists the resources this handler exposes.
    async fn list_resources(&self) -> Result<Vec<Resource>, HandlerError>;

    /// Reads the resource identified by `uri`.
    async fn get_resource(&self, uri: &str) -> Result<Vec<Content>, HandlerError>;
}

/// Serves `prompts/list` and `prompts/call`.
#[async_trait]
pub trait PromptHandler: Send + Sync {
    /// Lists the prompts this handler exposes.
    async fn list_prompts(&self) -> Result<Vec<Prompt>, HandlerError>;

    /// Renders the named prompt with the given arguments.
    async fn call_prompt(&self, name: &str, arguments: &Value)
        -> Result<Vec<Content>, HandlerError>;
}

/// Serves a custom method outside the standard dispatch table.
#[async_trait]
pub trait CustomHandler: Send + Sync {
    /// Handles the method and returns its raw result value.
    async fn handle(&self, method: &str, params: Option<&Value>) -> Result<Value, HandlerError>;
}

/// The set of handlers a server was built with.
#[derive(Default)]
pub struct HandlerRegistry {
    tools: Option<Arc<dyn ToolHandler>>,
    resources: Option<Arc<dyn ResourceHandler>>,
    prompts: Option<Arc<dyn PromptHandler>>,
    custom: HashMap<String, Arc<dyn CustomHandler>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the tool handler, enabling the tools capability.
    pub fn register_tool_handler(&mut self, handler: Arc<dyn ToolHandler>) {
        self.tools = Some(handler);
    }

    /// Registers the resource handler, enabling the resources capability.
    pub fn register_resource_handler(&mut self, handler: Arc<dyn ResourceHandler>) {
        self.resources = Some(handler);
    }

    /// Registers the prompt handler, enabling the prompts capability.
    pub fn register_prompt_handler(&mut self, handler: Arc<dyn PromptHandler>) {
        self.prompts = Some(handler);
    }

    /// Registers a handler for a custom method name.
    pub fn register_custom_handler(&mut self, method: impl Into<String>, handler: Arc<dyn CustomHandler>) {
        self.custom.insert(method.into(), handler);
    }

    /// The registered tool handler, if any.
    #[must_use]
    pub fn tools(&self) -> Option<&Arc<dyn ToolHandler>> {
        self.tools.as_ref()
    }

    /// The registered resource handler, if any.
    #[must_use]
    pub fn resources(&self) -> Option<&Arc<dyn ResourceHandler>> {
        self.resources.as_ref()
    }

    /// The registered prompt handler, if any.
    #[must_use]
    pub fn prompts(&self) -> Option<&Arc<dyn PromptHandler>> {
        self.prompts.as_ref()
    }

    /// The handler registered for a custom method, if any.
    #[must_use]
    pub fn custom(&self, method: &str) -> Option<&Arc<dyn CustomHandler>> {
        self.custom.get(method)
    }

    /// Derives the base capabilities from the registered handlers.
    ///
    /// Each capability sub-object is present exactly when the matching
    /// handler is registered.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            tools: self.tools.as_ref().map(|_| ToolsCapability::default()),
            resources: self.resources.as_ref().map(|_| ResourcesCapability::default()),
            prompts: self.prompts.as_ref().map(|_| PromptsCapability::default()),
        }
    }
}
