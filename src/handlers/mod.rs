//! Ready-made handlers for the demo host and the test suite.
//!
//! These implement the handler traits only; the protocol engine neither
//! knows nor cares that they exist.

pub mod calculator;
pub mod docs;
pub mod echo;

pub use calculator::CalculatorTools;
pub use docs::Documentation;
pub use echo::EchoTool;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::engine::ToolHandler;
use crate::error::HandlerError;
use crate::protocol::{Content, Tool};

/// Aggregates several tool handlers behind one `tools/*` surface.
///
/// `tools/list` concatenates the member lists; `tools/call` routes to the
/// first member that advertises the requested name.
#[derive(Default)]
pub struct ToolSet {
    members: Vec<Arc<dyn ToolHandler>>,
}

impl ToolSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a member handler.
    #[must_use]
    pub fn with(mut self, handler: impl ToolHandler + 'static) -> Self {
        self.members.push(Arc::new(handler));
        self
    }
}

#[async_trait]
impl ToolHandler for ToolSet {
    async fn list_tools(&self) -> Result<Vec<Tool>, HandlerError> {
        let mut tools = Vec::new();
        for member in &self.members {
            tools.extend(member.list_tools().await?);
        }
        Ok(tools)
    }

    async fn call_tool(&self, name: &str, arguments: &Value) -> Result<Vec<Content>, HandlerError> {
        for member in &self.members {
            let advertises = member
                .list_tools()
                .await?
                .iter()
                .any(|tool| tool.name == name);
            if advertises {
                return member.call_tool(name, arguments).await;
            }
        }
        Err(HandlerError::NotFound(name.to_string()))
    }
}
