//! Worker selection: narrows the worker directory to eligible candidates.
//!
//! A worker is eligible for a step when it is ACTIVE, its capability set is a
//! superset of the step's required capabilities, and (if the step names
//! networks) it supports at least one of them.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::SchedulerError;
use crate::models::agent::{Agent, AgentStatus};
use crate::models::workflow::{StepRequirements, WorkflowStep};

/// The only collaborator the engine consumes: a directory of registered workers.
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    /// ACTIVE workers matching `requirements`, in directory order.
    async fn find_active(&self, requirements: &StepRequirements)
        -> Result<Vec<Agent>, SchedulerError>;
}

/// `required ⊆ offered`.
pub fn capabilities_satisfied(required: &BTreeSet<String>, offered: &BTreeSet<String>) -> bool {
    required.is_subset(offered)
}

/// Absent (or empty) requirement matches any worker; otherwise the sets must intersect.
pub fn network_compatible(required: Option<&BTreeSet<String>>, supported: &BTreeSet<String>) -> bool {
    match required {
        None => true,
        Some(r) if r.is_empty() => true,
        Some(r) => !r.is_disjoint(supported),
    }
}

pub fn is_eligible(agent: &Agent, requirements: &StepRequirements) -> bool {
    agent.status == AgentStatus::Active
        && capabilities_satisfied(&requirements.capabilities, &agent.capabilities)
        && network_compatible(requirements.networks.as_ref(), &agent.networks)
}

/// Queries a directory for the workers able to run a step.
pub struct WorkerSelector;

impl WorkerSelector {
    /// Every eligible worker, in directory order.
    ///
    /// Results are re-checked here so a loose directory implementation can
    /// never hand a non-ACTIVE or non-matching worker to the engine.
    pub async fn candidates(
        step: &WorkflowStep,
        directory: &dyn AgentDirectory,
    ) -> Result<Vec<Agent>, SchedulerError> {
        let found = directory.find_active(&step.requirements).await?;
        Ok(found
            .into_iter()
            .filter(|a| is_eligible(a, &step.requirements))
            .collect())
    }

    /// Baseline policy: first eligible worker, or `None`.
    pub async fn select_candidate(
        step: &WorkflowStep,
        directory: &dyn AgentDirectory,
    ) -> Result<Option<String>, SchedulerError> {
        Ok(Self::candidates(step, directory)
            .await?
            .into_iter()
            .next()
            .map(|a| a.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::agent::RegisterAgentInput;
    use crate::store::AgentStore;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_capabilities_superset() {
        assert!(capabilities_satisfied(&set(&["a"]), &set(&["a", "b"])));
        assert!(capabilities_satisfied(&set(&[]), &set(&[])));
        assert!(!capabilities_satisfied(&set(&["a", "c"]), &set(&["a", "b"])));
    }

    #[test]
    fn test_network_intersection() {
        assert!(network_compatible(None, &set(&[])));
        assert!(network_compatible(Some(&set(&[])), &set(&["base"])));
        assert!(network_compatible(Some(&set(&["base", "eth"])), &set(&["eth"])));
        assert!(!network_compatible(Some(&set(&["base"])), &set(&["eth"])));
    }

    #[test]
    fn test_is_eligible_requires_active() {
        let mut agent = Agent::new(
            "w1".into(),
            "w1".into(),
            "owner".into(),
            ["swap".to_string()],
            ["eth".to_string()],
        );
        let req = StepRequirements::new(["swap"]).with_networks(["eth"]);
        assert!(!is_eligible(&agent, &req));

        agent.status = AgentStatus::Active;
        assert!(is_eligible(&agent, &req));

        agent.status = AgentStatus::Suspended;
        assert!(!is_eligible(&agent, &req));
    }

    fn register(id: &str, caps: &[&str], status: AgentStatus) -> RegisterAgentInput {
        RegisterAgentInput {
            id: Some(id.to_string()),
            name: None,
            owner: None,
            capabilities: caps.iter().map(|c| c.to_string()).collect(),
            networks: vec!["eth".to_string()],
            status: Some(status),
            cost_estimate: None,
            time_estimate_ms: None,
        }
    }

    #[tokio::test]
    async fn test_select_candidate_against_store() {
        let store = AgentStore::new();
        for (id, caps, status) in [
            ("idle", vec!["swap"], AgentStatus::Inactive),
            ("banned", vec!["swap"], AgentStatus::Suspended),
            ("bridger", vec!["bridge"], AgentStatus::Active),
            ("first", vec!["swap", "bridge"], AgentStatus::Active),
            ("second", vec!["swap"], AgentStatus::Active),
        ] {
            store.register(register(id, &caps, status)).await.unwrap();
        }

        let swap = WorkflowStep::new("s", "s", StepRequirements::new(["swap"]), vec![]);
        assert_eq!(
            WorkerSelector::select_candidate(&swap, &store).await.unwrap().as_deref(),
            Some("first")
        );

        let on_base = WorkflowStep::new(
            "b",
            "b",
            StepRequirements::new(["swap"]).with_networks(["base"]),
            vec![],
        );
        assert_eq!(WorkerSelector::select_candidate(&on_base, &store).await.unwrap(), None);

        let oracle = WorkflowStep::new("o", "o", StepRequirements::new(["oracle"]), vec![]);
        assert_eq!(WorkerSelector::select_candidate(&oracle, &store).await.unwrap(), None);
    }
}
