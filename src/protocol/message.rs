//! JSON-RPC 2.0 message types and the field-presence decoder.
//!
//! Messages are classified on decode without an explicit tag:
//!
//! - `method` present with a non-null `id` — request
//! - `method` present with `id` absent (or null) — notification
//! - `method` absent — response
//!
//! Request ids are opaque and type-preserving: a numeric id is echoed back
//! as a number, a string id as a string. Responses carry exactly one of
//! `result` or `error`; the absent field is omitted from the wire form.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// The only protocol version this server speaks.
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes, plus the MCP-specific ranges.
pub mod error_codes {
    /// Malformed JSON received.
    pub const PARSE_ERROR: i32 = -32700;
    /// Invalid request shape or wrong lifecycle state.
    pub const INVALID_REQUEST: i32 = -32600;
    /// Unknown method.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid or missing parameters.
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal server failure.
    pub const INTERNAL_ERROR: i32 = -32603;

    /// Resource not found.
    pub const RESOURCE_NOT_FOUND: i32 = -32100;
    /// Resource access denied.
    pub const RESOURCE_ACCESS_DENIED: i32 = -32101;
    /// Tool not found.
    pub const TOOL_NOT_FOUND: i32 = -32200;
    /// Tool execution failed.
    pub const TOOL_EXECUTION_FAILED: i32 = -32201;
    /// Prompt not found.
    pub const PROMPT_NOT_FOUND: i32 = -32300;
    /// Prompt execution failed.
    pub const PROMPT_EXECUTION_FAILED: i32 = -32301;
}

/// A request identifier: string or integer, echoed back verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric id.
    Number(i64),
    /// String id.
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl RequestId {
    /// Converts a raw JSON value into a request id.
    ///
    /// Returns `None` for null, fractional numbers, and non-scalar values.
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Number),
            Value::String(s) => Some(Self::String(s.clone())),
            _ => None,
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// Error code (standard codes are negative).
    pub code: i32,
    /// Human-readable error message.
    pub message: String,
    /// Additional error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    /// Creates an error object without additional data.
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// A request: expects exactly one response carrying the same id.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    /// Protocol version, always `"2.0"`.
    pub jsonrpc: Cow<'static, str>,
    /// Request id, echoed in the response.
    pub id: RequestId,
    /// Method name to invoke.
    pub method: String,
    /// Method parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Creates a new request.
    #[must_use]
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(JSONRPC_VERSION),
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// A notification: fire-and-forget, no id, no response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    /// Protocol version, always `"2.0"`.
    pub jsonrpc: Cow<'static, str>,
    /// Method name.
    pub method: String,
    /// Notification parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Creates a new notification.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(JSONRPC_VERSION),
            method: method.into(),
            params,
        }
    }
}

/// A response: echoes the request id and carries exactly one of
/// `result` or `error`.
///
/// The id is `None` only for error responses to messages whose id could not
/// be recovered (for example a parse error); it serialises as JSON null.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    /// Protocol version, always `"2.0"`.
    pub jsonrpc: Cow<'static, str>,
    /// Echo of the request id; null when the id is unrecoverable.
    pub id: Option<RequestId>,
    /// Success result, mutually exclusive with `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error object, mutually exclusive with `result`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

impl JsonRpcResponse {
    /// Creates a success response.
    #[must_use]
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(JSONRPC_VERSION),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    /// Creates an error response.
    #[must_use]
    pub fn error(id: Option<RequestId>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(JSONRPC_VERSION),
            id,
            result: None,
            error: Some(ErrorObject::new(code, message)),
        }
    }

    /// Returns true if this response carries an error.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// The tagged sum of everything that travels on the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    /// A request expecting a response.
    Request(JsonRpcRequest),
    /// A response to an earlier request.
    Response(JsonRpcResponse),
    /// A one-way notification.
    Notification(JsonRpcNotification),
}

impl JsonRpcMessage {
    /// Serialises to compact single-line JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation fails, which cannot happen for
    /// values constructed through this module.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// The method name, if this message carries one.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request(req) => Some(&req.method),
            Self::Notification(notif) => Some(&notif.method),
            Self::Response(_) => None,
        }
    }
}

impl From<JsonRpcResponse> for JsonRpcMessage {
    fn from(resp: JsonRpcResponse) -> Self {
        Self::Response(resp)
    }
}

impl From<JsonRpcNotification> for JsonRpcMessage {
    fn from(notif: JsonRpcNotification) -> Self {
        Self::Notification(notif)
    }
}

/// Errors produced while decoding a message.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The input was not valid JSON.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The input was JSON but not a valid JSON-RPC 2.0 message.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ProtocolError {
    /// The JSON-RPC error code for this failure.
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            Self::Parse(_) => error_codes::PARSE_ERROR,
            Self::InvalidRequest(_) => error_codes::INVALID_REQUEST,
        }
    }

    /// Builds the error response this failure maps to.
    ///
    /// Parse errors have no recoverable id, so the response id is null.
    #[must_use]
    pub fn into_response(self) -> JsonRpcResponse {
        let code = self.code();
        JsonRpcResponse::error(None, code, self.to_string())
    }
}

/// Parses and classifies a JSON-RPC message from its textual form.
///
/// # Errors
///
/// Returns [`ProtocolError::Parse`] for malformed JSON and
/// [`ProtocolError::InvalidRequest`] for valid JSON that is not a JSON-RPC
/// 2.0 message (wrong version, missing fields, malformed id).
pub fn parse_message(input: &str) -> Result<JsonRpcMessage, ProtocolError> {
    let value: Value = serde_json::from_str(input)?;
    classify_value(value)
}

/// Classifies an already-decoded JSON value into a message.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidRequest`] when the value does not form a
/// valid JSON-RPC 2.0 message.
pub fn classify_value(value: Value) -> Result<JsonRpcMessage, ProtocolError> {
    let Value::Object(mut map) = value else {
        return Err(ProtocolError::InvalidRequest(
            "message must be a JSON object".to_string(),
        ));
    };

    match map.get("jsonrpc").and_then(Value::as_str) {
        Some(JSONRPC_VERSION) => {}
        Some(other) => {
            return Err(ProtocolError::InvalidRequest(format!(
                "unsupported protocol version: {other}"
            )));
        }
        None => {
            return Err(ProtocolError::InvalidRequest(
                "missing jsonrpc version field".to_string(),
            ));
        }
    }

    let id = map.remove("id").filter(|v| !v.is_null());
    let params = map.remove("params");

    if let Some(method) = map.remove("method") {
        let Value::String(method) = method else {
            return Err(ProtocolError::InvalidRequest(
                "method must be a string".to_string(),
            ));
        };

        // Request when a usable id is present, notification otherwise.
        return match id {
            Some(raw) => {
                let id = RequestId::from_value(&raw).ok_or_else(|| {
                    ProtocolError::InvalidRequest(format!("invalid request id: {raw}"))
                })?;
                Ok(JsonRpcMessage::Request(JsonRpcRequest::new(
                    id, method, params,
                )))
            }
            None => Ok(JsonRpcMessage::Notification(JsonRpcNotification::new(
                method, params,
            ))),
        };
    }

    // No method: a response. It must carry a result or an error.
    let result = map.remove("result");
    let error = match map.remove("error") {
        Some(raw) => Some(
            serde_json::from_value::<ErrorObject>(raw)
                .map_err(|e| ProtocolError::InvalidRequest(format!("invalid error object: {e}")))?,
        ),
        None => None,
    };

    if result.is_some() && error.is_some() {
        return Err(ProtocolError::InvalidRequest(
            "response carries both result and error".to_string(),
        ));
    }
    if result.is_none() && error.is_none() {
        return Err(ProtocolError::InvalidRequest(
            "message has neither method nor result nor error".to_string(),
        ));
    }

    let id = match id {
        Some(raw) => Some(RequestId::from_value(&raw).ok_or_else(|| {
            ProtocolError::InvalidRequest(format!("invalid response id: {raw}"))
        })?),
        None => None,
    };

    Ok(JsonRpcMessage::Response(JsonRpcResponse {
        jsonrpc: Cow::Borrowed(JSONRPC_VERSION),
        id,
        result,
        error,
    }))
}

impl<'de> Deserialize<'de> for JsonRpcMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        classify_value(value).map_err(serde::de::Error::custom)
    }
}
