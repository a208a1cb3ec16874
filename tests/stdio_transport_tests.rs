//! Integration tests for the stdio transport.
//!
//! An in-memory duplex pipe stands in for the process standard streams:
//! the test writes client lines into one end and reads server lines from
//! the other.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

use mcp_duplex::config::StdioConfig;
use mcp_duplex::engine::{Engine, ServerBuilder};
use mcp_duplex::error::TransportError;
use mcp_duplex::handlers::{CalculatorTools, EchoTool, ToolSet};
use mcp_duplex::protocol::{JsonRpcMessage, JsonRpcNotification};
use mcp_duplex::transport::{StdioTransport, Transport};

fn test_engine() -> Arc<Engine> {
    ServerBuilder::new("test-server", "0.1.0")
        .with_tool_handler(ToolSet::new().with(CalculatorTools::new()).with(EchoTool::new()))
        .build()
}

type ClientWriter = tokio::io::WriteHalf<tokio::io::DuplexStream>;
type ClientReader = BufReader<tokio::io::ReadHalf<tokio::io::DuplexStream>>;

/// Starts a transport wired to an in-memory pipe. Returns the client's
/// halves of the pipe and the running transport.
async fn start_transport(
    engine: &Arc<Engine>,
    cancel: CancellationToken,
) -> (
    Arc<StdioTransport<tokio::io::ReadHalf<tokio::io::DuplexStream>, tokio::io::WriteHalf<tokio::io::DuplexStream>>>,
    ClientWriter,
    ClientReader,
) {
    let (client_side, server_side) = tokio::io::duplex(64 * 1024);
    let (client_read, client_write) = tokio::io::split(client_side);
    let (server_read, server_write) = tokio::io::split(server_side);

    let transport = Arc::new(StdioTransport::new(
        StdioConfig::default(),
        server_read,
        server_write,
    ));
    transport
        .start(cancel, engine.message_handler())
        .await
        .expect("transport must start");

    (transport, client_write, BufReader::new(client_read))
}

/// Reads one line from the server with a timeout.
async fn read_line(reader: &mut ClientReader) -> String {
    let mut line = String::new();
    tokio::time::timeout(
        std::time::Duration::from_secs(5),
        reader.read_line(&mut line),
    )
    .await
    .expect("timed out waiting for server line")
    .expect("read failed");
    line
}

// =============================================================================
// Framing and Dispatch Tests
// =============================================================================

#[tokio::test]
async fn test_initialize_then_tool_call_round_trip() {
    let engine = test_engine();
    let (_transport, mut tx, mut rx) = start_transport(&engine, CancellationToken::new()).await;

    tx.write_all(
        b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"initialize\",\"params\":{\"clientInfo\":{\"name\":\"t\",\"version\":\"1\"},\"options\":{}}}\n",
    )
    .await
    .unwrap();
    tx.write_all(
        b"{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"tools/call\",\"params\":{\"name\":\"add\",\"arguments\":{\"a\":5,\"b\":3}}}\n",
    )
    .await
    .unwrap();

    // Responses arrive in request order, one per line.
    let first: serde_json::Value = serde_json::from_str(&read_line(&mut rx).await).unwrap();
    assert_eq!(first["id"], 1);
    assert_eq!(first["result"]["serverInfo"]["name"], "test-server");

    let second: serde_json::Value = serde_json::from_str(&read_line(&mut rx).await).unwrap();
    assert_eq!(second["id"], 2);
    assert_eq!(second["result"]["content"][0]["text"], "8.000000");
}

#[tokio::test]
async fn test_uninitialised_request_gets_error_line() {
    let engine = test_engine();
    let (_transport, mut tx, mut rx) = start_transport(&engine, CancellationToken::new()).await;

    tx.write_all(b"{\"jsonrpc\":\"2.0\",\"id\":7,\"method\":\"tools/list\"}\n")
        .await
        .unwrap();

    let resp: serde_json::Value = serde_json::from_str(&read_line(&mut rx).await).unwrap();
    assert_eq!(
        resp,
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": 7,
            "error": { "code": -32600, "message": "Server not initialized" }
        })
    );
}

#[tokio::test]
async fn test_malformed_line_dropped_silently() {
    let engine = test_engine();
    let (_transport, mut tx, mut rx) = start_transport(&engine, CancellationToken::new()).await;

    // The broken line produces no output; the next valid line still works.
    tx.write_all(b"{this is not json\n").await.unwrap();
    tx.write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"initialize\",\"params\":{}}\n")
        .await
        .unwrap();

    let resp: serde_json::Value = serde_json::from_str(&read_line(&mut rx).await).unwrap();
    assert_eq!(resp["id"], 1);
    assert!(resp["result"].is_object());
}

#[tokio::test]
async fn test_crlf_input_tolerated() {
    let engine = test_engine();
    let (_transport, mut tx, mut rx) = start_transport(&engine, CancellationToken::new()).await;

    tx.write_all(b"{\"jsonrpc\":\"2.0\",\"id\":3,\"method\":\"initialize\",\"params\":{}}\r\n")
        .await
        .unwrap();

    let resp: serde_json::Value = serde_json::from_str(&read_line(&mut rx).await).unwrap();
    assert_eq!(resp["id"], 3);
}

#[tokio::test]
async fn test_message_split_across_reads_is_reassembled() {
    let engine = test_engine();

    // The reader delivers the line in two chunks; the buffer must stitch
    // them back together before dispatch.
    let mock_reader = tokio_test::io::Builder::new()
        .read(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"meth")
        .read(b"od\":\"initialize\",\"params\":{}}\n")
        .build();

    let (client_side, server_side) = tokio::io::duplex(1024);
    let (client_read, _client_write) = tokio::io::split(client_side);
    let (_server_read, server_write) = tokio::io::split(server_side);

    let transport = Arc::new(StdioTransport::new(
        StdioConfig::default(),
        mock_reader,
        server_write,
    ));
    transport
        .start(CancellationToken::new(), engine.message_handler())
        .await
        .unwrap();

    let mut rx = BufReader::new(client_read);
    let resp: serde_json::Value = serde_json::from_str(&read_line(&mut rx).await).unwrap();
    assert_eq!(resp["id"], 1);
    assert!(resp["result"]["serverInfo"].is_object());
}

#[tokio::test]
async fn test_notification_input_produces_no_output() {
    let engine = test_engine();
    let (_transport, mut tx, mut rx) = start_transport(&engine, CancellationToken::new()).await;

    tx.write_all(b"{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n")
        .await
        .unwrap();
    tx.write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"initialize\",\"params\":{}}\n")
        .await
        .unwrap();

    // The first line out corresponds to the request, not the notification.
    let resp: serde_json::Value = serde_json::from_str(&read_line(&mut rx).await).unwrap();
    assert_eq!(resp["id"], 1);
}

#[tokio::test]
async fn test_send_writes_notification_line() {
    let engine = test_engine();
    let (transport, _tx, mut rx) = start_transport(&engine, CancellationToken::new()).await;

    transport
        .send(&JsonRpcMessage::Notification(JsonRpcNotification::new(
            "tools/listChanged",
            Some(serde_json::json!({})),
        )))
        .await
        .unwrap();

    let line: serde_json::Value = serde_json::from_str(&read_line(&mut rx).await).unwrap();
    assert_eq!(line["method"], "tools/listChanged");
}

#[tokio::test]
async fn test_engine_notification_flows_through_transport() {
    let engine = test_engine();
    let (transport, _tx, mut rx) = start_transport(&engine, CancellationToken::new()).await;
    engine.attach_transport(transport.clone());

    engine
        .send_notification(JsonRpcNotification::new(
            "resources/updated",
            Some(serde_json::json!({"uri": "docs://protocol"})),
        ))
        .await
        .unwrap();

    let line: serde_json::Value = serde_json::from_str(&read_line(&mut rx).await).unwrap();
    assert_eq!(line["method"], "resources/updated");
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[tokio::test]
async fn test_start_twice_fails() {
    let engine = test_engine();
    let (transport, _tx, _rx) = start_transport(&engine, CancellationToken::new()).await;

    let err = transport
        .start(CancellationToken::new(), engine.message_handler())
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::AlreadyStarted));
}

#[tokio::test]
async fn test_eof_closes_transport() {
    let engine = test_engine();
    let (client_side, server_side) = tokio::io::duplex(1024);
    let (server_read, server_write) = tokio::io::split(server_side);

    let transport = Arc::new(StdioTransport::new(
        StdioConfig::default(),
        server_read,
        server_write,
    ));
    transport
        .start(CancellationToken::new(), engine.message_handler())
        .await
        .unwrap();

    // Dropping the whole client side is EOF for the server's reader.
    drop(client_side);

    tokio::time::timeout(
        std::time::Duration::from_secs(5),
        transport.closed_token().cancelled_owned(),
    )
    .await
    .expect("transport must close on EOF");

    let err = transport
        .send(&JsonRpcMessage::Notification(JsonRpcNotification::new("x", None)))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Closed));
}

#[tokio::test]
async fn test_cancellation_stops_read_loop() {
    let engine = test_engine();
    let cancel = CancellationToken::new();
    let (transport, _tx, _rx) = start_transport(&engine, cancel.clone()).await;

    cancel.cancel();

    tokio::time::timeout(
        std::time::Duration::from_secs(5),
        transport.closed_token().cancelled_owned(),
    )
    .await
    .expect("cancellation must close the transport");
}

#[tokio::test]
async fn test_close_is_idempotent_and_send_after_close_errors() {
    let engine = test_engine();
    let (transport, _tx, _rx) = start_transport(&engine, CancellationToken::new()).await;

    transport.close().await.unwrap();
    transport.close().await.unwrap();

    let err = transport
        .send(&JsonRpcMessage::Notification(JsonRpcNotification::new("x", None)))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Closed));
}
