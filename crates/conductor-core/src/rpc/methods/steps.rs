//! RPC methods for worker callbacks.
//!
//! Methods:
//! - `steps.submitResult` — report the outcome of a dispatched step

use serde::Deserialize;

use crate::orchestration::StepResultAck;
use crate::rpc::error::RpcError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// steps.submitResult
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResultParams {
    pub task_id: String,
    pub step_id: String,
    pub success: bool,
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

pub async fn submit_result(
    state: &AppState,
    params: SubmitResultParams,
) -> Result<StepResultAck, RpcError> {
    let ack = state
        .engine
        .submit_step_result(
            &params.task_id,
            &params.step_id,
            params.success,
            params.output,
            params.error,
        )
        .await?;
    Ok(ack)
}
