//! RPC methods for the worker directory.
//!
//! Methods:
//! - `agents.register`     — register a worker (PENDING unless a status is given)
//! - `agents.activate`     — PENDING → ACTIVE
//! - `agents.updateStatus` — set any status
//! - `agents.deregister`   — remove a worker
//! - `agents.get`          — get a single worker by id
//! - `agents.list`         — list workers, optionally by status
//! - `agents.stats`        — performance stats from the decision engine

use serde::{Deserialize, Serialize};

use crate::decision::PerformanceStats;
use crate::models::agent::{Agent, AgentStatus, RegisterAgentInput};
use crate::rpc::error::RpcError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdParams {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct AgentResult {
    pub agent: Agent,
}

fn parse_status(raw: &str) -> Result<AgentStatus, RpcError> {
    AgentStatus::from_str(raw).ok_or_else(|| RpcError::InvalidParams(format!("Invalid status: {}", raw)))
}

// ---------------------------------------------------------------------------
// agents.register
// ---------------------------------------------------------------------------

pub async fn register(state: &AppState, params: RegisterAgentInput) -> Result<AgentResult, RpcError> {
    let agent = state.agent_store.register(params).await?;
    Ok(AgentResult { agent })
}

// ---------------------------------------------------------------------------
// agents.activate
// ---------------------------------------------------------------------------

pub async fn activate(state: &AppState, params: IdParams) -> Result<AgentResult, RpcError> {
    let agent = state.agent_store.activate(&params.id).await?;
    Ok(AgentResult { agent })
}

// ---------------------------------------------------------------------------
// agents.updateStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusParams {
    pub id: String,
    pub status: String,
}

pub async fn update_status(
    state: &AppState,
    params: UpdateStatusParams,
) -> Result<AgentResult, RpcError> {
    let status = parse_status(&params.status)?;
    let agent = state.agent_store.update_status(&params.id, status).await?;
    Ok(AgentResult { agent })
}

// ---------------------------------------------------------------------------
// agents.deregister
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct DeregisterResult {
    pub deregistered: bool,
}

pub async fn deregister(state: &AppState, params: IdParams) -> Result<DeregisterResult, RpcError> {
    state.agent_store.deregister(&params.id).await?;
    Ok(DeregisterResult { deregistered: true })
}

// ---------------------------------------------------------------------------
// agents.get
// ---------------------------------------------------------------------------

pub async fn get(state: &AppState, params: IdParams) -> Result<Agent, RpcError> {
    state
        .agent_store
        .get(&params.id)
        .await
        .ok_or_else(|| RpcError::NotFound(format!("Agent {} not found", params.id)))
}

// ---------------------------------------------------------------------------
// agents.list
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListResult {
    pub agents: Vec<Agent>,
}

pub async fn list(state: &AppState, params: ListParams) -> Result<ListResult, RpcError> {
    let agents = match &params.status {
        Some(raw) => state.agent_store.list_by_status(parse_status(raw)?).await,
        None => state.agent_store.list().await,
    };
    Ok(ListResult { agents })
}

// ---------------------------------------------------------------------------
// agents.stats
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResult {
    pub agent_id: String,
    #[serde(flatten)]
    pub stats: PerformanceStats,
}

/// Stats are kept per worker id and survive deregistration.
pub async fn stats(state: &AppState, params: IdParams) -> Result<StatsResult, RpcError> {
    let stats = state.engine.decision().stats(&params.id);
    Ok(StatsResult {
        agent_id: params.id,
        stats,
    })
}
