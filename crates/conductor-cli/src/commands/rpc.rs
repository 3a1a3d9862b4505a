//! `conductor rpc` — Raw JSON-RPC invocation against fresh state.

use std::sync::Arc;

use conductor_core::dispatch::NoopDispatcher;
use conductor_core::rpc::RpcRouter;

use super::{init_state, print_json};

pub async fn call(method: &str, params_str: &str) -> Result<(), String> {
    let params: serde_json::Value =
        serde_json::from_str(params_str).map_err(|e| format!("Invalid JSON params: {}", e))?;

    let router = RpcRouter::new(init_state(Arc::new(NoopDispatcher)));
    let response = router
        .handle_value(serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params
        }))
        .await;

    print_json(&response);
    match response.get("error") {
        Some(err) => Err(format!(
            "RPC call failed: {}",
            err["message"].as_str().unwrap_or("unknown error")
        )),
        None => Ok(()),
    }
}
