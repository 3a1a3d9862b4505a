//! RPC methods for workflow checks.
//!
//! Methods:
//! - `workflows.validate` — structural check without creating a task

use serde::{Deserialize, Serialize};

use crate::models::workflow::{Workflow, WorkflowStep};
use crate::rpc::error::RpcError;
use crate::state::AppState;
use crate::workflow::schema::StepDefinition;
use crate::workflow::validator;

// ---------------------------------------------------------------------------
// workflows.validate
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateParams {
    pub steps: Vec<StepDefinition>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn validate(_state: &AppState, params: ValidateParams) -> Result<ValidateResult, RpcError> {
    let workflow = Workflow::new(params.steps.into_iter().map(WorkflowStep::from).collect());
    Ok(match validator::check(&workflow) {
        Ok(()) => ValidateResult {
            valid: true,
            error: None,
        },
        Err(violation) => ValidateResult {
            valid: false,
            error: Some(violation.to_string()),
        },
    })
}
