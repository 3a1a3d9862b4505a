//! File schema for workflow definitions.
//!
//! A workflow file (YAML or JSON) describes one task to create:
//!
//! ```yaml
//! name: "Token Swap"
//! description: "Analyze, select a route, execute"
//! creator: "0xabc"
//! budget: 10.0
//! deadline: "2030-01-01T00:00:00Z"
//!
//! steps:
//!   - id: analyze
//!     requirements:
//!       capabilities: [market-analysis]
//!     input: { pair: "ETH/USDC" }
//!
//!   - id: select
//!     requirements:
//!       capabilities: [routing]
//!       networks: [ethereum, base]
//!     dependsOn: [analyze]
//! ```
//!
//! An agent roster file is a list of `RegisterAgentInput` entries:
//!
//! ```yaml
//! - id: agent-1
//!   capabilities: [market-analysis, routing]
//!   networks: [ethereum]
//!   status: ACTIVE
//!   costEstimate: 1.5
//! ```

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;
use crate::models::agent::RegisterAgentInput;
use crate::models::task::CreateTaskInput;
use crate::models::workflow::{StepRequirements, Workflow, WorkflowStep};

/// Top-level workflow definition loaded from a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Creator identity; callers may override it.
    #[serde(default)]
    pub creator: Option<String>,

    #[serde(default)]
    pub budget: Option<f64>,

    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,

    pub steps: Vec<StepDefinition>,
}

/// A single step as written in a workflow file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDefinition {
    /// Unique within the workflow.
    pub id: String,

    /// Display name; defaults to the id.
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub requirements: StepRequirements,

    #[serde(default)]
    pub input: serde_json::Value,

    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl From<StepDefinition> for WorkflowStep {
    fn from(def: StepDefinition) -> Self {
        let name = def.name.unwrap_or_else(|| def.id.clone());
        WorkflowStep::new(def.id, name, def.requirements, def.depends_on).with_input(def.input)
    }
}

impl WorkflowDefinition {
    /// Parse a definition from YAML (JSON is valid YAML too).
    pub fn from_yaml(yaml: &str) -> Result<Self, SchedulerError> {
        serde_yaml::from_str(yaml).map_err(|e| {
            SchedulerError::Validation(format!("Failed to parse workflow definition: {}", e))
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchedulerError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SchedulerError::Validation(format!(
                "Failed to read workflow file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    pub fn workflow(&self) -> Workflow {
        Workflow::new(self.steps.iter().cloned().map(WorkflowStep::from).collect())
    }

    /// Build a task creation request. `creator` wins over the file's creator.
    pub fn into_task_input(self, creator: Option<String>) -> CreateTaskInput {
        let workflow = self.workflow();
        CreateTaskInput {
            name: self.name,
            description: self.description,
            creator: creator
                .or(self.creator)
                .unwrap_or_else(|| "anonymous".to_string()),
            workflow,
            budget: self.budget,
            deadline: self.deadline,
        }
    }
}

/// Parse an agent roster (YAML or JSON list).
pub fn roster_from_yaml(yaml: &str) -> Result<Vec<RegisterAgentInput>, SchedulerError> {
    serde_yaml::from_str(yaml)
        .map_err(|e| SchedulerError::Validation(format!("Failed to parse agent roster: {}", e)))
}

pub fn roster_from_file(path: impl AsRef<Path>) -> Result<Vec<RegisterAgentInput>, SchedulerError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        SchedulerError::Validation(format!(
            "Failed to read agent roster '{}': {}",
            path.display(),
            e
        ))
    })?;
    roster_from_yaml(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::agent::AgentStatus;
    use std::io::Write;

    #[test]
    fn test_parse_minimal_workflow() {
        let yaml = r#"
name: "Test Flow"
steps:
  - id: only
    requirements:
      capabilities: [echo]
"#;
        let def = WorkflowDefinition::from_yaml(yaml).unwrap();
        assert_eq!(def.name, "Test Flow");
        assert_eq!(def.steps.len(), 1);

        let wf = def.workflow();
        assert_eq!(wf.steps[0].name, "only");
        assert!(wf.steps[0].requirements.networks.is_none());
        assert!(wf.steps[0].depends_on.is_empty());
    }

    #[test]
    fn test_parse_full_workflow() {
        let yaml = r#"
name: "Token Swap"
description: "Analyze, select, execute"
creator: "0xabc"
budget: 10.5
deadline: "2030-01-01T00:00:00Z"
steps:
  - id: analyze
    name: "Analyze market"
    requirements:
      capabilities: [market-analysis]
    input:
      pair: "ETH/USDC"
  - id: select
    requirements:
      capabilities: [routing]
      networks: [ethereum, base]
    dependsOn: [analyze]
"#;
        let def = WorkflowDefinition::from_yaml(yaml).unwrap();
        let input = def.into_task_input(None);
        assert_eq!(input.creator, "0xabc");
        assert_eq!(input.budget, Some(10.5));
        assert!(input.deadline.is_some());

        let steps = &input.workflow.steps;
        assert_eq!(steps[0].name, "Analyze market");
        assert_eq!(steps[0].input["pair"], "ETH/USDC");
        assert_eq!(steps[1].depends_on, vec!["analyze".to_string()]);
        let networks = steps[1].requirements.networks.as_ref().unwrap();
        assert!(networks.contains("base"));
    }

    #[test]
    fn test_creator_override() {
        let def = WorkflowDefinition::from_yaml("name: x\ncreator: file\nsteps: []\n").unwrap();
        let input = def.into_task_input(Some("cli".to_string()));
        assert_eq!(input.creator, "cli");
    }

    #[test]
    fn test_parse_errors_are_validation_errors() {
        let err = WorkflowDefinition::from_yaml("steps: 3").unwrap_err();
        assert!(matches!(err, SchedulerError::Validation(_)));
    }

    #[test]
    fn test_roster_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"[{{"id": "w1", "capabilities": ["echo"], "networks": ["base"], "status": "ACTIVE", "costEstimate": 2.0}}]"#
        )
        .unwrap();

        let roster = roster_from_file(file.path()).unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].id.as_deref(), Some("w1"));
        assert_eq!(roster[0].status, Some(AgentStatus::Active));
        assert_eq!(roster[0].cost_estimate, Some(2.0));
    }
}
