//! RPC methods for task lifecycle.
//!
//! Methods:
//! - `tasks.create`    — validate a workflow and create a CREATED task
//! - `tasks.execute`   — start a CREATED task; returns immediately
//! - `tasks.cancel`    — cancel a RUNNING task
//! - `tasks.get`       — get a single task by id
//! - `tasks.list`      — list tasks, optionally by creator and status
//! - `tasks.execution` — the scheduler's execution record for a task

use serde::{Deserialize, Serialize};

use crate::models::task::{Task, TaskExecution, TaskStatus};
use crate::rpc::error::RpcError;
use crate::state::AppState;
use crate::workflow::schema::WorkflowDefinition;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdParams {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct TaskResult {
    pub task: Task,
}

// ---------------------------------------------------------------------------
// tasks.create
// ---------------------------------------------------------------------------

/// Same shape as a workflow definition file.
pub type CreateParams = WorkflowDefinition;

pub async fn create(state: &AppState, params: CreateParams) -> Result<TaskResult, RpcError> {
    let task = state.engine.create_task(params.into_task_input(None)).await?;
    Ok(TaskResult { task })
}

// ---------------------------------------------------------------------------
// tasks.execute
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ExecuteResult {
    pub ok: bool,
    pub task: Task,
}

pub async fn execute(state: &AppState, params: IdParams) -> Result<ExecuteResult, RpcError> {
    let task = state.engine.execute(&params.id).await?;
    Ok(ExecuteResult { ok: true, task })
}

// ---------------------------------------------------------------------------
// tasks.cancel
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct CancelResult {
    pub canceled: bool,
    pub task: Task,
}

pub async fn cancel(state: &AppState, params: IdParams) -> Result<CancelResult, RpcError> {
    let task = state.engine.cancel(&params.id).await?;
    Ok(CancelResult {
        canceled: true,
        task,
    })
}

// ---------------------------------------------------------------------------
// tasks.get
// ---------------------------------------------------------------------------

pub async fn get(state: &AppState, params: IdParams) -> Result<Task, RpcError> {
    Ok(state.engine.get_task(&params.id).await?)
}

// ---------------------------------------------------------------------------
// tasks.list
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub creator: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListResult {
    pub tasks: Vec<Task>,
}

pub async fn list(state: &AppState, params: ListParams) -> Result<ListResult, RpcError> {
    let status = match &params.status {
        Some(s) => Some(
            TaskStatus::from_str(s)
                .ok_or_else(|| RpcError::InvalidParams(format!("Invalid status: {}", s)))?,
        ),
        None => None,
    };
    let tasks = state
        .engine
        .list_tasks(params.creator.as_deref(), status)
        .await;
    Ok(ListResult { tasks })
}

// ---------------------------------------------------------------------------
// tasks.execution
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ExecutionResult {
    /// `null` until the task has been executed.
    pub execution: Option<TaskExecution>,
}

pub async fn execution(state: &AppState, params: IdParams) -> Result<ExecutionResult, RpcError> {
    let execution = state.engine.get_execution(&params.id).await?;
    Ok(ExecutionResult { execution })
}
