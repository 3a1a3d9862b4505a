//! Transport-agnostic JSON-RPC 2.0 dispatcher.
//!
//! `RpcRouter` takes an `AppState` and dispatches incoming JSON-RPC requests
//! to the appropriate method handler. Used from:
//!
//! - The stdio server (`conductor serve`)
//! - One-shot CLI calls (`conductor rpc`)
//! - Tests

use serde::Serialize;

use crate::state::AppState;

use super::error::RpcError;
use super::methods;
use super::types::*;

/// Transport-agnostic JSON-RPC router.
///
/// ```ignore
/// let router = RpcRouter::new(app_state);
///
/// // From raw JSON string (single request or batch):
/// let response_json = router.handle_request(raw_json_str).await;
///
/// // From a parsed request:
/// let response = router.dispatch(request).await;
/// ```
#[derive(Clone)]
pub struct RpcRouter {
    state: AppState,
}

const SERIALIZE_FAILURE: &str =
    r#"{"jsonrpc":"2.0","error":{"code":-32603,"message":"Failed to serialize response"},"id":null}"#;

impl RpcRouter {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Handle a raw JSON string holding one request or a batch. Returns the
    /// serialized response (an array for batches).
    pub async fn handle_request(&self, raw: &str) -> String {
        let value: serde_json::Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                let response =
                    JsonRpcResponse::error(None, PARSE_ERROR, format!("Parse error: {}", e));
                return serde_json::to_string(&response)
                    .unwrap_or_else(|_| SERIALIZE_FAILURE.into());
            }
        };

        serde_json::to_string(&self.handle_value(value).await)
            .unwrap_or_else(|_| SERIALIZE_FAILURE.into())
    }

    /// Handle a pre-parsed value: one request object or a batch array.
    pub async fn handle_value(&self, value: serde_json::Value) -> serde_json::Value {
        match value {
            serde_json::Value::Array(batch) => {
                if batch.is_empty() {
                    return to_json_or_default(JsonRpcResponse::error(
                        None,
                        INVALID_REQUEST,
                        "Invalid request: empty batch",
                    ));
                }
                let mut responses = Vec::with_capacity(batch.len());
                for item in batch {
                    responses.push(self.handle_single(item).await);
                }
                serde_json::to_value(responses).unwrap_or_default()
            }
            single => to_json_or_default(self.handle_single(single).await),
        }
    }

    async fn handle_single(&self, value: serde_json::Value) -> JsonRpcResponse {
        let id = value.get("id").cloned();
        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) => self.dispatch(request).await,
            Err(e) => RpcError::InvalidRequest(e.to_string()).to_response(id),
        }
    }

    /// Dispatch a parsed JSON-RPC request to the correct method handler.
    pub async fn dispatch(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        if !req.has_valid_version() {
            return JsonRpcResponse::error(
                req.id,
                INVALID_REQUEST,
                format!("Invalid JSON-RPC version, expected \"{}\"", JSONRPC_VERSION),
            );
        }

        if req.is_notification() {
            tracing::debug!("[RPC] {} sent without id, answering with a null id", req.method);
        }

        let id = req.id.clone();
        let params = req
            .params
            .unwrap_or(serde_json::Value::Object(Default::default()));

        match self.route(&req.method, params).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(err) => {
                tracing::debug!("[RPC] {} failed: {}", req.method, err);
                err.to_response(id)
            }
        }
    }

    async fn route(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, RpcError> {
        match method {
            // ----- Tasks -----
            "tasks.create" => {
                let p = parse_params(params)?;
                to_json(methods::tasks::create(&self.state, p).await?)
            }
            "tasks.execute" => {
                let p = parse_params(params)?;
                to_json(methods::tasks::execute(&self.state, p).await?)
            }
            "tasks.cancel" => {
                let p = parse_params(params)?;
                to_json(methods::tasks::cancel(&self.state, p).await?)
            }
            "tasks.get" => {
                let p = parse_params(params)?;
                to_json(methods::tasks::get(&self.state, p).await?)
            }
            "tasks.list" => {
                let p = parse_params(params)?;
                to_json(methods::tasks::list(&self.state, p).await?)
            }
            "tasks.execution" => {
                let p = parse_params(params)?;
                to_json(methods::tasks::execution(&self.state, p).await?)
            }

            // ----- Steps -----
            "steps.submitResult" => {
                let p = parse_params(params)?;
                to_json(methods::steps::submit_result(&self.state, p).await?)
            }

            // ----- Workflows -----
            "workflows.validate" => {
                let p = parse_params(params)?;
                to_json(methods::workflows::validate(&self.state, p).await?)
            }

            // ----- Agents -----
            "agents.register" => {
                let p = parse_params(params)?;
                to_json(methods::agents::register(&self.state, p).await?)
            }
            "agents.activate" => {
                let p = parse_params(params)?;
                to_json(methods::agents::activate(&self.state, p).await?)
            }
            "agents.updateStatus" => {
                let p = parse_params(params)?;
                to_json(methods::agents::update_status(&self.state, p).await?)
            }
            "agents.deregister" => {
                let p = parse_params(params)?;
                to_json(methods::agents::deregister(&self.state, p).await?)
            }
            "agents.get" => {
                let p = parse_params(params)?;
                to_json(methods::agents::get(&self.state, p).await?)
            }
            "agents.list" => {
                let p = parse_params(params)?;
                to_json(methods::agents::list(&self.state, p).await?)
            }
            "agents.stats" => {
                let p = parse_params(params)?;
                to_json(methods::agents::stats(&self.state, p).await?)
            }

            _ => Err(RpcError::MethodNotFound(method.to_string())),
        }
    }

    /// All supported method names, for discovery.
    pub fn method_list(&self) -> Vec<&'static str> {
        vec![
            "tasks.create",
            "tasks.execute",
            "tasks.cancel",
            "tasks.get",
            "tasks.list",
            "tasks.execution",
            "steps.submitResult",
            "workflows.validate",
            "agents.register",
            "agents.activate",
            "agents.updateStatus",
            "agents.deregister",
            "agents.get",
            "agents.list",
            "agents.stats",
        ]
    }
}

/// Helper: deserialize `serde_json::Value` into a typed params struct.
fn parse_params<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, RpcError> {
    serde_json::from_value(value).map_err(|e| RpcError::InvalidParams(e.to_string()))
}

fn to_json<T: Serialize>(result: T) -> Result<serde_json::Value, RpcError> {
    serde_json::to_value(result)
        .map_err(|e| RpcError::Internal(format!("Failed to serialize result: {}", e)))
}

fn to_json_or_default(response: JsonRpcResponse) -> serde_json::Value {
    serde_json::to_value(response).unwrap_or_default()
}
