//! The `echo` tool: returns its message argument unchanged.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::engine::ToolHandler;
use crate::error::HandlerError;
use crate::protocol::{Content, Tool};

/// Echoes the `message` argument back as text content.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoTool;

impl EchoTool {
    /// Creates the echo tool.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolHandler for EchoTool {
    async fn list_tools(&self) -> Result<Vec<Tool>, HandlerError> {
        Ok(vec![Tool {
            name: "echo".to_string(),
            description: "Returns the given message unchanged".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "message": { "type": "string", "description": "Text to echo back" }
                },
                "required": ["message"]
            }),
        }])
    }

    async fn call_tool(&self, name: &str, arguments: &Value) -> Result<Vec<Content>, HandlerError> {
        if name != "echo" {
            return Err(HandlerError::NotFound(name.to_string()));
        }

        let message = arguments
            .get("message")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                HandlerError::InvalidInput("missing string argument 'message'".to_string())
            })?;

        Ok(vec![Content::text(message)])
    }
}
