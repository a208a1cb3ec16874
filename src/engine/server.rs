//! The protocol engine: lifecycle state machine and method dispatch.
//!
//! # Lifecycle Flow
//!
//! ```text
//! Client                     Server
//!   │                          │
//!   ├─── initialize ──────────▶│  uninitialised ──▶ initialised
//!   │◀── serverInfo + caps ────┤
//!   │                          │
//!   │      [Operation Phase]   │
//!   ├─── tools/call ──────────▶│  dispatch to handlers
//!   │◀── content ──────────────┤
//!   │                          │
//!   ├─── shutdown ────────────▶│  initialised ──▶ shut-down
//!   │◀── {} ───────────────────┤
//!   │                          │  (transport stays open; a new
//!   │                          │   initialize restarts the engine)
//! ```
//!
//! Any request other than `initialize` received outside the initialised
//! state is answered with `-32600 Server not initialized` and reaches no
//! handler. `shutdown` clears the flag but does not close the transport;
//! closure is driven by external cancellation.

use std::sync::{Arc, RwLock};

use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::engine::profile::{ClientProfile, ProfileRegistry};
use crate::engine::registry::HandlerRegistry;
use crate::error::{HandlerDomain, HandlerError, TransportError};
use crate::protocol::{
    error_codes, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId,
    ServerInfo,
};
use crate::transport::{MessageHandler, Transport};

/// Engine state in the MCP lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    /// Waiting for the first `initialize`.
    Uninitialised,
    /// Ready for normal operation.
    Initialised,
    /// `shutdown` received; only `initialize` restarts the engine.
    ShutDown,
}

/// Client identity received during initialisation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    #[serde(default)]
    pub version: Option<String>,
}

/// Parameters for the `initialize` request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitializeParams {
    #[serde(default)]
    client_info: Option<ClientInfo>,
    /// Accepted for forward compatibility; currently unused.
    #[serde(default)]
    #[allow(dead_code)]
    options: Option<Value>,
}

/// Parameters for `tools/call` and `prompts/call`.
#[derive(Debug, Clone, Deserialize)]
struct NamedCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Parameters for `resources/get`.
#[derive(Debug, Clone, Deserialize)]
struct ResourceGetParams {
    uri: String,
}

/// Mutable per-lifecycle state, written only on lifecycle transitions.
struct SessionState {
    lifecycle: Lifecycle,
    client: Option<ClientInfo>,
    profile: Arc<ClientProfile>,
}

/// The protocol engine.
///
/// Holds the handler registry and capabilities (written once at
/// construction, read lock-free afterwards) and the lifecycle state
/// (guarded by a read-write lock, written only on `initialize` and
/// `shutdown`). Responses and notifications leave through the attached
/// transport; the engine never writes bytes itself.
pub struct Engine {
    info: ServerInfo,
    registry: HandlerRegistry,
    profiles: ProfileRegistry,
    state: RwLock<SessionState>,
    transport: RwLock<Option<Arc<dyn Transport>>>,
}

impl Engine {
    /// Creates an engine; use [`ServerBuilder`](crate::engine::ServerBuilder)
    /// instead of calling this directly.
    #[must_use]
    pub(crate) fn new(
        info: ServerInfo,
        registry: HandlerRegistry,
        profiles: ProfileRegistry,
    ) -> Self {
        let generic = profiles.resolve(None);
        Self {
            info,
            registry,
            profiles,
            state: RwLock::new(SessionState {
                lifecycle: Lifecycle::Uninitialised,
                client: None,
                profile: generic,
            }),
            transport: RwLock::new(None),
        }
    }

    /// Whether the engine has completed a successful `initialize`.
    ///
    /// # Panics
    ///
    /// Panics if the state lock is poisoned, which cannot happen because
    /// no code path panics while holding it.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state.read().expect("state lock poisoned").lifecycle == Lifecycle::Initialised
    }

    /// The server identity returned from `initialize`.
    #[must_use]
    pub const fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// The client identity stored by the last `initialize`, if any.
    ///
    /// # Panics
    ///
    /// Panics if the state lock is poisoned, which cannot happen because
    /// no code path panics while holding it.
    #[must_use]
    pub fn client_info(&self) -> Option<ClientInfo> {
        self.state.read().expect("state lock poisoned").client.clone()
    }

    /// Attaches the transport used for engine-originated notifications.
    ///
    /// # Panics
    ///
    /// Panics if the transport lock is poisoned, which cannot happen
    /// because no code path panics while holding it.
    pub fn attach_transport(&self, transport: Arc<dyn Transport>) {
        *self.transport.write().expect("transport lock poisoned") = Some(transport);
    }

    /// Sends a notification through the attached transport.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if no transport is attached, and
    /// propagates transport send failures.
    pub async fn send_notification(
        &self,
        notification: JsonRpcNotification,
    ) -> Result<(), TransportError> {
        let transport = self
            .transport
            .read()
            .expect("transport lock poisoned")
            .clone()
            .ok_or(TransportError::Closed)?;
        transport
            .send(&JsonRpcMessage::Notification(notification))
            .await
    }

    /// Builds the message-handler closure passed to
    /// [`Transport::start`](crate::transport::Transport::start).
    ///
    /// Handing the transport a function value instead of the engine keeps
    /// the transport ignorant of engine internals.
    #[must_use]
    pub fn message_handler(self: &Arc<Self>) -> MessageHandler {
        let engine = Arc::clone(self);
        Arc::new(
            move |message| -> BoxFuture<'static, Option<JsonRpcMessage>> {
                let engine = Arc::clone(&engine);
                Box::pin(async move { engine.handle_message(message).await })
            },
        )
    }

    /// Processes one decoded message.
    ///
    /// Requests yield exactly one response carrying the request id;
    /// notifications and stray responses yield nothing.
    pub async fn handle_message(&self, message: JsonRpcMessage) -> Option<JsonRpcMessage> {
        match message {
            JsonRpcMessage::Request(req) => {
                Some(JsonRpcMessage::Response(self.handle_request(req).await))
            }
            JsonRpcMessage::Notification(notif) => {
                self.handle_notification(&notif);
                None
            }
            JsonRpcMessage::Response(resp) => {
                // A server receives responses only if a client misbehaves.
                warn!(id = ?resp.id, "ignoring unexpected response message");
                None
            }
        }
    }

    /// Dispatches a request to the matching handler.
    async fn handle_request(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        debug!(method = %req.method, id = %req.id, "dispatching request");

        if req.method == "initialize" {
            return self.handle_initialize(&req);
        }

        if !self.is_initialized() {
            warn!(method = %req.method, "request rejected: server not initialized");
            return JsonRpcResponse::error(
                Some(req.id),
                error_codes::INVALID_REQUEST,
                "Server not initialized",
            );
        }

        let method = req.method.clone();
        match method.as_str() {
            "shutdown" => self.handle_shutdown(req.id),
            "ping" => JsonRpcResponse::success(req.id, json!({})),
            "tools/list" => self.handle_tools_list(req.id).await,
            "tools/call" => self.handle_tools_call(req.id, req.params.as_ref()).await,
            "resources/list" => self.handle_resources_list(req.id).await,
            "resources/get" => self.handle_resources_get(req.id, req.params.as_ref()).await,
            "prompts/list" => self.handle_prompts_list(req.id).await,
            "prompts/call" => self.handle_prompts_call(req.id, req.params.as_ref()).await,
            _ => self.handle_custom(req).await,
        }
    }

    /// Handles a notification. Unknown notifications are ignored per the
    /// JSON-RPC specification.
    fn handle_notification(&self, notif: &JsonRpcNotification) {
        match notif.method.as_str() {
            "notifications/initialized" => {
                debug!("client confirmed initialisation");
            }
            other => {
                debug!(method = %other, "ignoring unknown notification");
            }
        }
    }

    /// Handles `initialize`: stores client info, selects the client
    /// profile, computes effective capabilities, and flips the lifecycle.
    fn handle_initialize(&self, req: &JsonRpcRequest) -> JsonRpcResponse {
        let params: InitializeParams = match &req.params {
            Some(raw) => match serde_json::from_value(raw.clone()) {
                Ok(p) => p,
                Err(e) => {
                    return JsonRpcResponse::error(
                        Some(req.id.clone()),
                        error_codes::INVALID_PARAMS,
                        format!("Invalid initialize params: {e}"),
                    );
                }
            },
            None => InitializeParams::default(),
        };

        let client_name = params.client_info.as_ref().map(|c| c.name.as_str());
        let profile = self.profiles.resolve(client_name);

        debug!(
            client = client_name.unwrap_or("<unknown>"),
            profile = %profile.tag,
            "initialising"
        );

        let capabilities = profile.apply_capabilities(self.registry.capabilities());
        let info = profile.server_info.as_ref().unwrap_or(&self.info);

        let result = json!({
            "serverInfo": info,
            "capabilities": capabilities,
        });

        {
            let mut state = self.state.write().expect("state lock poisoned");
            state.lifecycle = Lifecycle::Initialised;
            state.client = params.client_info;
            state.profile = profile;
        }

        JsonRpcResponse::success(req.id.clone(), result)
    }

    /// Handles `shutdown`: clears the initialised flag. The transport is
    /// left open; closure is driven by external cancellation.
    fn handle_shutdown(&self, id: RequestId) -> JsonRpcResponse {
        {
            let mut state = self.state.write().expect("state lock poisoned");
            state.lifecycle = Lifecycle::ShutDown;
        }
        debug!("engine shut down; initialize restarts it");
        JsonRpcResponse::success(id, json!({}))
    }

    /// The profile selected by the last `initialize`.
    fn current_profile(&self) -> Arc<ClientProfile> {
        Arc::clone(&self.state.read().expect("state lock poisoned").profile)
    }

    async fn handle_tools_list(&self, id: RequestId) -> JsonRpcResponse {
        let Some(handler) = self.registry.tools() else {
            return method_not_found(id, "tools/list");
        };

        match handler.list_tools().await {
            Ok(mut tools) => {
                tools.extend(self.current_profile().default_tools.iter().cloned());
                JsonRpcResponse::success(id, json!({ "tools": tools }))
            }
            Err(e) => handler_error(id, HandlerDomain::Tool, &e),
        }
    }

    async fn handle_tools_call(&self, id: RequestId, params: Option<&Value>) -> JsonRpcResponse {
        let Some(handler) = self.registry.tools() else {
            return method_not_found(id, "tools/call");
        };

        let params: NamedCallParams = match parse_params(params) {
            Ok(p) => p,
            Err(message) => {
                return JsonRpcResponse::error(Some(id), error_codes::INVALID_PARAMS, message)
            }
        };

        debug!(tool = %params.name, "calling tool");
        match handler.call_tool(&params.name, &params.arguments).await {
            Ok(content) => JsonRpcResponse::success(id, json!({ "content": content })),
            Err(e) => handler_error(id, HandlerDomain::Tool, &e),
        }
    }

    async fn handle_resources_list(&self, id: RequestId) -> JsonRpcResponse {
        let Some(handler) = self.registry.resources() else {
            return method_not_found(id, "resources/list");
        };

        match handler.list_resources().await {
            Ok(resources) => JsonRpcResponse::success(id, json!({ "resources": resources })),
            Err(e) => handler_error(id, HandlerDomain::Resource, &e),
        }
    }

    async fn handle_resources_get(&self, id: RequestId, params: Option<&Value>) -> JsonRpcResponse {
        let Some(handler) = self.registry.resources() else {
            return method_not_found(id, "resources/get");
        };

        let params: ResourceGetParams = match parse_params(params) {
            Ok(p) => p,
            Err(message) => {
                return JsonRpcResponse::error(Some(id), error_codes::INVALID_PARAMS, message)
            }
        };

        debug!(uri = %params.uri, "reading resource");
        match handler.get_resource(&params.uri).await {
            Ok(content) => JsonRpcResponse::success(id, json!({ "content": content })),
            Err(e) => handler_error(id, HandlerDomain::Resource, &e),
        }
    }

    async fn handle_prompts_list(&self, id: RequestId) -> JsonRpcResponse {
        let Some(handler) = self.registry.prompts() else {
            return method_not_found(id, "prompts/list");
        };

        match handler.list_prompts().await {
            Ok(prompts) => JsonRpcResponse::success(id, json!({ "prompts": prompts })),
            Err(e) => handler_error(id, HandlerDomain::Prompt, &e),
        }
    }

    async fn handle_prompts_call(&self, id: RequestId, params: Option<&Value>) -> JsonRpcResponse {
        let Some(handler) = self.registry.prompts() else {
            return method_not_found(id, "prompts/call");
        };

        let params: NamedCallParams = match parse_params(params) {
            Ok(p) => p,
            Err(message) => {
                return JsonRpcResponse::error(Some(id), error_codes::INVALID_PARAMS, message)
            }
        };

        debug!(prompt = %params.name, "rendering prompt");
        match handler.call_prompt(&params.name, &params.arguments).await {
            Ok(content) => JsonRpcResponse::success(id, json!({ "content": content })),
            Err(e) => handler_error(id, HandlerDomain::Prompt, &e),
        }
    }

    /// Dispatches to a registered custom handler, or reports the method
    /// as unknown.
    async fn handle_custom(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        let Some(handler) = self.registry.custom(&req.method) else {
            return method_not_found(req.id, &req.method);
        };

        match handler.handle(&req.method, req.params.as_ref()).await {
            Ok(result) => JsonRpcResponse::success(req.id, result),
            Err(e) => handler_error(req.id, HandlerDomain::Custom, &e),
        }
    }
}

/// Deserialises method params, treating absence as an error.
fn parse_params<T: serde::de::DeserializeOwned>(params: Option<&Value>) -> Result<T, String> {
    let Some(raw) = params else {
        return Err("Missing params".to_string());
    };
    serde_json::from_value(raw.clone()).map_err(|e| format!("Invalid params: {e}"))
}

/// Builds a `-32601` response for an unknown or unhandled method.
fn method_not_found(id: RequestId, method: &str) -> JsonRpcResponse {
    warn!(method = %method, "method not found");
    JsonRpcResponse::error(
        Some(id),
        error_codes::METHOD_NOT_FOUND,
        format!("Method not found: {method}"),
    )
}

/// Maps a handler error onto its wire form.
fn handler_error(id: RequestId, domain: HandlerDomain, error: &HandlerError) -> JsonRpcResponse {
    warn!(?domain, error = %error, "handler error");
    JsonRpcResponse::error(Some(id), error.wire_code(domain), error.to_string())
}
