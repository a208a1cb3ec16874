//! Integration tests for the JSON-RPC message layer.
//!
//! These tests verify message classification by field presence, request-id
//! type preservation, result/error exclusivity, and the error-code
//! taxonomy.

use mcp_duplex::protocol::{
    error_codes, parse_message, JsonRpcMessage, JsonRpcResponse, RequestId,
};

// =============================================================================
// Classification Tests
// =============================================================================

#[test]
fn test_method_with_id_is_request() {
    let json = r#"{
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "clientInfo": { "name": "test-client", "version": "1.0.0" },
            "options": {}
        }
    }"#;

    match parse_message(json).unwrap() {
        JsonRpcMessage::Request(req) => {
            assert_eq!(req.method, "initialize");
            assert_eq!(req.id, RequestId::Number(1));
            assert!(req.params.is_some());
        }
        other => panic!("Expected Request, got {other:?}"),
    }
}

#[test]
fn test_method_without_id_is_notification() {
    let json = r#"{
        "jsonrpc": "2.0",
        "method": "notifications/initialized"
    }"#;

    match parse_message(json).unwrap() {
        JsonRpcMessage::Notification(notif) => {
            assert_eq!(notif.method, "notifications/initialized");
        }
        other => panic!("Expected Notification, got {other:?}"),
    }
}

#[test]
fn test_no_method_is_response() {
    let json = r#"{
        "jsonrpc": "2.0",
        "id": 3,
        "result": { "ok": true }
    }"#;

    match parse_message(json).unwrap() {
        JsonRpcMessage::Response(resp) => {
            assert_eq!(resp.id, Some(RequestId::Number(3)));
            assert!(!resp.is_error());
        }
        other => panic!("Expected Response, got {other:?}"),
    }
}

#[test]
fn test_error_response_classifies() {
    let json = r#"{
        "jsonrpc": "2.0",
        "id": "req-9",
        "error": { "code": -32601, "message": "Method not found" }
    }"#;

    match parse_message(json).unwrap() {
        JsonRpcMessage::Response(resp) => {
            assert_eq!(resp.id, Some(RequestId::String("req-9".to_string())));
            assert_eq!(resp.error.unwrap().code, -32601);
        }
        other => panic!("Expected Response, got {other:?}"),
    }
}

// =============================================================================
// Rejection Tests
// =============================================================================

#[test]
fn test_invalid_json_is_parse_error() {
    let err = parse_message("not valid json").unwrap_err();
    assert_eq!(err.code(), error_codes::PARSE_ERROR);
}

#[test]
fn test_missing_version_is_invalid_request() {
    let err = parse_message(r#"{"id": 1, "method": "test"}"#).unwrap_err();
    assert_eq!(err.code(), error_codes::INVALID_REQUEST);
}

#[test]
fn test_unrecognised_version_is_invalid_request() {
    let err = parse_message(r#"{"jsonrpc": "3.0", "id": 1, "method": "test"}"#).unwrap_err();
    assert_eq!(err.code(), error_codes::INVALID_REQUEST);
}

#[test]
fn test_response_without_result_or_error_rejected() {
    let err = parse_message(r#"{"jsonrpc": "2.0", "id": 1}"#).unwrap_err();
    assert_eq!(err.code(), error_codes::INVALID_REQUEST);
}

#[test]
fn test_array_body_rejected() {
    let err = parse_message(r#"[1, 2, 3]"#).unwrap_err();
    assert_eq!(err.code(), error_codes::INVALID_REQUEST);
}

// =============================================================================
// Round-trip Tests
// =============================================================================

#[test]
fn test_numeric_id_type_preserved_through_response() {
    let json = r#"{"jsonrpc": "2.0", "id": 42, "method": "ping"}"#;
    let JsonRpcMessage::Request(req) = parse_message(json).unwrap() else {
        panic!("Expected Request");
    };

    let response = JsonRpcResponse::success(req.id, serde_json::json!({}));
    let encoded = serde_json::to_value(&response).unwrap();
    assert_eq!(encoded["id"], serde_json::json!(42));
}

#[test]
fn test_string_id_type_preserved_through_response() {
    let json = r#"{"jsonrpc": "2.0", "id": "42", "method": "ping"}"#;
    let JsonRpcMessage::Request(req) = parse_message(json).unwrap() else {
        panic!("Expected Request");
    };

    let response = JsonRpcResponse::success(req.id, serde_json::json!({}));
    let encoded = serde_json::to_value(&response).unwrap();
    assert_eq!(encoded["id"], serde_json::json!("42"));
}

#[test]
fn test_exactly_one_of_result_or_error_serialised() {
    let success = JsonRpcResponse::success(RequestId::Number(1), serde_json::json!({"v": 1}));
    let encoded = serde_json::to_value(&success).unwrap();
    assert!(encoded.get("result").is_some());
    assert!(encoded.get("error").is_none());

    let failure = JsonRpcResponse::error(Some(RequestId::Number(1)), -32603, "boom");
    let encoded = serde_json::to_value(&failure).unwrap();
    assert!(encoded.get("result").is_none());
    assert!(encoded.get("error").is_some());
}

#[test]
fn test_notification_round_trip_is_single_line() {
    let json = r#"{"jsonrpc":"2.0","method":"system/heartbeat","params":{"timestamp":1}}"#;
    let message = parse_message(json).unwrap();
    let encoded = message.to_json().unwrap();
    assert!(!encoded.contains('\n'));
    assert!(encoded.contains(r#""method":"system/heartbeat""#));
}
