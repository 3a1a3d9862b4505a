use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::SchedulerError;
use crate::models::agent::{Agent, AgentStatus, RegisterAgentInput};
use crate::models::workflow::StepRequirements;
use crate::selector::{is_eligible, AgentDirectory};

#[derive(Default)]
struct AgentStoreInner {
    agents: HashMap<String, Agent>,
    /// Registration order; directory queries answer in this order.
    order: Vec<String>,
}

/// In-memory worker registry. Cloning shares the same registry.
#[derive(Clone, Default)]
pub struct AgentStore {
    inner: Arc<RwLock<AgentStoreInner>>,
}

impl AgentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, input: RegisterAgentInput) -> Result<Agent, SchedulerError> {
        let id = input
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        if id.trim().is_empty() {
            return Err(SchedulerError::Validation("Agent id must not be empty".to_string()));
        }

        let mut agent = Agent::new(
            id.clone(),
            input.name.unwrap_or_else(|| id.clone()),
            input.owner.unwrap_or_else(|| "unknown".to_string()),
            input.capabilities,
            input.networks,
        )
        .with_quote(input.cost_estimate, input.time_estimate_ms);
        if let Some(status) = input.status {
            agent.status = status;
        }

        let mut inner = self.inner.write().await;
        if inner.agents.contains_key(&id) {
            return Err(SchedulerError::Validation(format!(
                "Agent {} is already registered",
                id
            )));
        }
        inner.order.push(id.clone());
        inner.agents.insert(id.clone(), agent.clone());
        tracing::info!(
            "[AgentStore] Registered agent {} ({})",
            id,
            agent.status.as_str()
        );
        Ok(agent)
    }

    /// PENDING → ACTIVE once the worker's identity has been verified elsewhere.
    pub async fn activate(&self, agent_id: &str) -> Result<Agent, SchedulerError> {
        let mut inner = self.inner.write().await;
        let agent = inner
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| SchedulerError::NotFound(format!("Agent {} not found", agent_id)))?;
        if agent.status != AgentStatus::Pending {
            return Err(SchedulerError::State(format!(
                "Agent {} is {}, only PENDING agents can be activated",
                agent_id,
                agent.status.as_str()
            )));
        }
        agent.status = AgentStatus::Active;
        agent.updated_at = Utc::now();
        Ok(agent.clone())
    }

    pub async fn update_status(
        &self,
        agent_id: &str,
        status: AgentStatus,
    ) -> Result<Agent, SchedulerError> {
        let mut inner = self.inner.write().await;
        let agent = inner
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| SchedulerError::NotFound(format!("Agent {} not found", agent_id)))?;
        agent.status = status;
        agent.updated_at = Utc::now();
        tracing::info!("[AgentStore] Agent {} is now {}", agent_id, status.as_str());
        Ok(agent.clone())
    }

    pub async fn deregister(&self, agent_id: &str) -> Result<Agent, SchedulerError> {
        let mut inner = self.inner.write().await;
        let agent = inner
            .agents
            .remove(agent_id)
            .ok_or_else(|| SchedulerError::NotFound(format!("Agent {} not found", agent_id)))?;
        inner.order.retain(|id| id != agent_id);
        tracing::info!("[AgentStore] Deregistered agent {}", agent_id);
        Ok(agent)
    }

    pub async fn get(&self, agent_id: &str) -> Option<Agent> {
        self.inner.read().await.agents.get(agent_id).cloned()
    }

    pub async fn list(&self) -> Vec<Agent> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .filter_map(|id| inner.agents.get(id).cloned())
            .collect()
    }

    pub async fn list_by_status(&self, status: AgentStatus) -> Vec<Agent> {
        self.list()
            .await
            .into_iter()
            .filter(|a| a.status == status)
            .collect()
    }
}

#[async_trait]
impl AgentDirectory for AgentStore {
    async fn find_active(
        &self,
        requirements: &StepRequirements,
    ) -> Result<Vec<Agent>, SchedulerError> {
        let inner = self.inner.read().await;
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.agents.get(id))
            .filter(|a| is_eligible(a, requirements))
            .cloned()
            .collect())
    }
}
