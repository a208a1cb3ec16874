//! Integration tests for the protocol engine lifecycle and dispatch.
//!
//! These drive the engine directly through `handle_message`, the same
//! entry point both transports use.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use mcp_duplex::engine::{CustomHandler, Engine, ServerBuilder};
use mcp_duplex::error::HandlerError;
use mcp_duplex::handlers::{CalculatorTools, Documentation, EchoTool, ToolSet};
use mcp_duplex::protocol::{parse_message, JsonRpcMessage, JsonRpcResponse};

/// Builds the engine used across these tests.
fn test_engine() -> Arc<Engine> {
    ServerBuilder::new("test-server", "0.1.0")
        .with_tool_handler(ToolSet::new().with(CalculatorTools::new()).with(EchoTool::new()))
        .with_resource_handler(Documentation::new())
        .with_prompt_handler(Documentation::new())
        .build()
}

/// Sends one raw JSON line through the engine and returns the response.
async fn request(engine: &Engine, raw: &str) -> JsonRpcResponse {
    let message = parse_message(raw).expect("test fixture must parse");
    match engine.handle_message(message).await {
        Some(JsonRpcMessage::Response(resp)) => resp,
        other => panic!("expected a response, got {other:?}"),
    }
}

/// Initialises the engine with a named client.
async fn initialize(engine: &Engine, client_name: &str) -> JsonRpcResponse {
    let raw = format!(
        r#"{{"jsonrpc":"2.0","id":1,"method":"initialize","params":{{"clientInfo":{{"name":"{client_name}","version":"1"}},"options":{{}}}}}}"#
    );
    request(engine, &raw).await
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[tokio::test]
async fn test_uninitialised_dispatch_rejected() {
    let engine = test_engine();
    let resp = request(&engine, r#"{"jsonrpc":"2.0","id":7,"method":"tools/list"}"#).await;

    let encoded = serde_json::to_value(&resp).unwrap();
    assert_eq!(
        encoded,
        json!({
            "jsonrpc": "2.0",
            "id": 7,
            "error": { "code": -32600, "message": "Server not initialized" }
        })
    );
}

#[tokio::test]
async fn test_uninitialised_ping_rejected() {
    let engine = test_engine();
    let resp = request(&engine, r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#).await;
    assert_eq!(resp.error.unwrap().code, -32600);
}

#[tokio::test]
async fn test_initialize_returns_info_and_capabilities() {
    let engine = test_engine();
    let resp = initialize(&engine, "t").await;

    let result = resp.result.unwrap();
    assert_eq!(result["serverInfo"]["name"], "test-server");
    assert_eq!(result["serverInfo"]["version"], "0.1.0");

    // Exactly the sub-objects with registered handlers.
    assert!(result["capabilities"].get("tools").is_some());
    assert!(result["capabilities"].get("resources").is_some());
    assert!(result["capabilities"].get("prompts").is_some());
    assert!(engine.is_initialized());
}

#[tokio::test]
async fn test_initialize_stores_client_info() {
    let engine = test_engine();
    assert!(engine.client_info().is_none());

    initialize(&engine, "my-editor").await;

    let client = engine.client_info().unwrap();
    assert_eq!(client.name, "my-editor");
    assert_eq!(client.version.as_deref(), Some("1"));
}

#[tokio::test]
async fn test_capabilities_track_registered_handlers() {
    let engine = ServerBuilder::new("test-server", "0.1.0")
        .with_tool_handler(EchoTool::new())
        .build();
    let resp = initialize(&engine, "t").await;

    let result = resp.result.unwrap();
    let caps = &result["capabilities"];
    assert!(caps.get("tools").is_some());
    assert!(caps.get("resources").is_none());
    assert!(caps.get("prompts").is_none());
}

#[tokio::test]
async fn test_shutdown_clears_initialized_and_allows_restart() {
    let engine = test_engine();
    initialize(&engine, "t").await;

    let resp = request(&engine, r#"{"jsonrpc":"2.0","id":2,"method":"shutdown"}"#).await;
    assert_eq!(resp.result.unwrap(), json!({}));
    assert!(!engine.is_initialized());

    // After shutdown, only initialize is accepted again.
    let resp = request(&engine, r#"{"jsonrpc":"2.0","id":3,"method":"tools/list"}"#).await;
    assert_eq!(resp.error.unwrap().code, -32600);

    initialize(&engine, "t").await;
    assert!(engine.is_initialized());
}

#[tokio::test]
async fn test_notifications_produce_no_response() {
    let engine = test_engine();
    let message =
        parse_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).unwrap();
    assert!(engine.handle_message(message).await.is_none());

    // Unknown notifications are ignored, even uninitialised.
    let message = parse_message(r#"{"jsonrpc":"2.0","method":"something/else"}"#).unwrap();
    assert!(engine.handle_message(message).await.is_none());
}

#[tokio::test]
async fn test_stray_response_is_ignored() {
    let engine = test_engine();
    let message = parse_message(r#"{"jsonrpc":"2.0","id":1,"result":{}}"#).unwrap();
    assert!(engine.handle_message(message).await.is_none());
}

// =============================================================================
// Dispatch Tests
// =============================================================================

#[tokio::test]
async fn test_initialize_then_tool_call() {
    let engine = test_engine();

    let resp = initialize(&engine, "t").await;
    assert_eq!(resp.result.unwrap()["serverInfo"]["name"], "test-server");

    let resp = request(
        &engine,
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"add","arguments":{"a":5,"b":3}}}"#,
    )
    .await;
    let result = resp.result.unwrap();
    assert_eq!(result["content"][0]["text"], "8.000000");
}

#[tokio::test]
async fn test_division_by_zero_is_invalid_input() {
    let engine = test_engine();
    initialize(&engine, "t").await;

    let resp = request(
        &engine,
        r#"{"jsonrpc":"2.0","id":9,"method":"tools/call","params":{"name":"divide","arguments":{"a":1,"b":0}}}"#,
    )
    .await;

    let error = resp.error.unwrap();
    assert_eq!(error.code, -32602);
    assert!(error.message.contains("division by zero"));
}

#[tokio::test]
async fn test_unknown_tool_uses_tool_error_code() {
    let engine = test_engine();
    initialize(&engine, "t").await;

    let resp = request(
        &engine,
        r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"nope","arguments":{}}}"#,
    )
    .await;
    assert_eq!(resp.error.unwrap().code, -32200);
}

#[tokio::test]
async fn test_tools_list_includes_all_registered() {
    let engine = test_engine();
    initialize(&engine, "t").await;

    let resp = request(&engine, r#"{"jsonrpc":"2.0","id":5,"method":"tools/list"}"#).await;
    let tools = resp.result.unwrap()["tools"].as_array().unwrap().clone();
    let names: Vec<&str> = tools.iter().filter_map(|t| t["name"].as_str()).collect();
    assert!(names.contains(&"add"));
    assert!(names.contains(&"divide"));
    assert!(names.contains(&"echo"));
}

#[tokio::test]
async fn test_empty_tool_list_is_valid() {
    struct Empty;

    #[async_trait]
    impl mcp_duplex::engine::ToolHandler for Empty {
        async fn list_tools(&self) -> Result<Vec<mcp_duplex::protocol::Tool>, HandlerError> {
            Ok(Vec::new())
        }

        async fn call_tool(
            &self,
            name: &str,
            _arguments: &Value,
        ) -> Result<Vec<mcp_duplex::protocol::Content>, HandlerError> {
            Err(HandlerError::NotFound(name.to_string()))
        }
    }

    let engine = ServerBuilder::new("test-server", "0.1.0")
        .with_tool_handler(Empty)
        .build();
    let resp = initialize(&engine, "t").await;
    assert!(resp.result.unwrap()["capabilities"].get("tools").is_some());

    let resp = request(&engine, r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#).await;
    assert_eq!(resp.result.unwrap()["tools"], json!([]));
}

#[tokio::test]
async fn test_resources_and_prompts_dispatch() {
    let engine = test_engine();
    initialize(&engine, "t").await;

    let resp = request(&engine, r#"{"jsonrpc":"2.0","id":2,"method":"resources/list"}"#).await;
    assert!(!resp.result.unwrap()["resources"].as_array().unwrap().is_empty());

    let resp = request(
        &engine,
        r#"{"jsonrpc":"2.0","id":3,"method":"resources/get","params":{"uri":"docs://protocol"}}"#,
    )
    .await;
    assert!(resp.result.unwrap()["content"][0]["text"].is_string());

    let resp = request(
        &engine,
        r#"{"jsonrpc":"2.0","id":4,"method":"resources/get","params":{"uri":"docs://missing"}}"#,
    )
    .await;
    assert_eq!(resp.error.unwrap().code, -32100);

    let resp = request(&engine, r#"{"jsonrpc":"2.0","id":5,"method":"prompts/list"}"#).await;
    assert_eq!(resp.result.unwrap()["prompts"][0]["name"], "greeting");

    let resp = request(
        &engine,
        r#"{"jsonrpc":"2.0","id":6,"method":"prompts/call","params":{"name":"greeting","arguments":{"name":"Ada"}}}"#,
    )
    .await;
    let text = resp.result.unwrap()["content"][0]["text"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(text.contains("Ada"));
}

#[tokio::test]
async fn test_missing_params_is_invalid_params() {
    let engine = test_engine();
    initialize(&engine, "t").await;

    let resp = request(&engine, r#"{"jsonrpc":"2.0","id":2,"method":"tools/call"}"#).await;
    assert_eq!(resp.error.unwrap().code, -32602);
}

#[tokio::test]
async fn test_unknown_method_is_method_not_found() {
    let engine = test_engine();
    initialize(&engine, "t").await;

    let resp = request(&engine, r#"{"jsonrpc":"2.0","id":2,"method":"no/such"}"#).await;
    let error = resp.error.unwrap();
    assert_eq!(error.code, -32601);
    assert!(error.message.contains("no/such"));
}

#[tokio::test]
async fn test_custom_handler_dispatch() {
    struct Version;

    #[async_trait]
    impl CustomHandler for Version {
        async fn handle(
            &self,
            _method: &str,
            _params: Option<&Value>,
        ) -> Result<Value, HandlerError> {
            Ok(json!({ "build": "test" }))
        }
    }

    let engine = ServerBuilder::new("test-server", "0.1.0")
        .with_custom_handler("server/version", Version)
        .build();
    initialize(&engine, "t").await;

    let resp = request(&engine, r#"{"jsonrpc":"2.0","id":2,"method":"server/version"}"#).await;
    assert_eq!(resp.result.unwrap()["build"], "test");
}

// =============================================================================
// Client Profile Tests
// =============================================================================

#[tokio::test]
async fn test_profile_appends_default_tools() {
    let mut profile = mcp_duplex::engine::ClientProfile::new("desktop");
    profile.default_tools.push(mcp_duplex::protocol::Tool {
        name: "open-window".to_string(),
        description: "Opens a window".to_string(),
        input_schema: json!({ "type": "object" }),
    });

    let engine = ServerBuilder::new("test-server", "0.1.0")
        .with_tool_handler(EchoTool::new())
        .with_profile("desktop", profile)
        .build();

    initialize(&engine, "Fancy-Desktop-Client").await;

    let resp = request(&engine, r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#).await;
    let tools = resp.result.unwrap()["tools"].as_array().unwrap().clone();
    let names: Vec<&str> = tools.iter().filter_map(|t| t["name"].as_str()).collect();
    assert!(names.contains(&"echo"));
    assert!(names.contains(&"open-window"));
}

#[tokio::test]
async fn test_profile_not_applied_to_other_clients() {
    let mut profile = mcp_duplex::engine::ClientProfile::new("desktop");
    profile.default_tools.push(mcp_duplex::protocol::Tool {
        name: "open-window".to_string(),
        description: String::new(),
        input_schema: json!({ "type": "object" }),
    });

    let engine = ServerBuilder::new("test-server", "0.1.0")
        .with_tool_handler(EchoTool::new())
        .with_profile("desktop", profile)
        .build();

    initialize(&engine, "terminal-client").await;

    let resp = request(&engine, r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#).await;
    let tools = resp.result.unwrap()["tools"].as_array().unwrap().clone();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0]["name"], "echo");
}

#[tokio::test]
async fn test_profile_overrides_server_info() {
    let mut profile = mcp_duplex::engine::ClientProfile::new("branded");
    profile.server_info = Some(mcp_duplex::protocol::ServerInfo::new(
        "branded-server",
        "9.9.9",
    ));

    let engine = ServerBuilder::new("test-server", "0.1.0")
        .with_profile("branded", profile)
        .build();

    let resp = initialize(&engine, "branded-agent").await;
    assert_eq!(resp.result.unwrap()["serverInfo"]["name"], "branded-server");
}
