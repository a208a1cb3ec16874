//! Static documentation: a resource handler and a prompt handler.
//!
//! Serves a small set of in-memory documents under `docs://` URIs and a
//! greeting prompt, mostly to give the resource and prompt code paths a
//! realistic workout.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::engine::{PromptHandler, ResourceHandler};
use crate::error::HandlerError;
use crate::protocol::{Content, Prompt, PromptArgument, Resource};

const GETTING_STARTED: &str = "Connect over stdio or HTTP, send initialize, \
then call tools/list to discover what the server offers.";

const PROTOCOL_NOTES: &str = "Messages are JSON-RPC 2.0. Requests carry an \
id and receive exactly one response; notifications carry none.";

/// In-memory documentation resources and prompts.
#[derive(Debug, Default, Clone, Copy)]
pub struct Documentation;

impl Documentation {
    /// Creates the documentation handler.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ResourceHandler for Documentation {
    async fn list_resources(&self) -> Result<Vec<Resource>, HandlerError> {
        Ok(vec![
            Resource {
                uri: "docs://getting-started".to_string(),
                name: "Getting started".to_string(),
                description: "How to connect and discover tools".to_string(),
                mime_type: Some("text/plain".to_string()),
            },
            Resource {
                uri: "docs://protocol".to_string(),
                name: "Protocol notes".to_string(),
                description: "Message framing and lifecycle".to_string(),
                mime_type: Some("text/plain".to_string()),
            },
        ])
    }

    async fn get_resource(&self, uri: &str) -> Result<Vec<Content>, HandlerError> {
        let text = match uri {
            "docs://getting-started" => GETTING_STARTED,
            "docs://protocol" => PROTOCOL_NOTES,
            other => return Err(HandlerError::NotFound(other.to_string())),
        };
        Ok(vec![Content::text(text)])
    }
}

#[async_trait]
impl PromptHandler for Documentation {
    async fn list_prompts(&self) -> Result<Vec<Prompt>, HandlerError> {
        Ok(vec![Prompt {
            name: "greeting".to_string(),
            description: "A personalised greeting".to_string(),
            arguments: vec![PromptArgument {
                name: "name".to_string(),
                description: "Who to greet".to_string(),
                required: true,
                schema: Some(json!({ "type": "string" })),
            }],
        }])
    }

    async fn call_prompt(
        &self,
        name: &str,
        arguments: &Value,
    ) -> Result<Vec<Content>, HandlerError> {
        if name != "greeting" {
            return Err(HandlerError::NotFound(name.to_string()));
        }

        let who = arguments
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| HandlerError::InvalidInput("missing argument 'name'".to_string()))?;

        Ok(vec![Content::text(format!(
            "Hello, {who}! How can this server help you today?"
        ))])
    }
}
