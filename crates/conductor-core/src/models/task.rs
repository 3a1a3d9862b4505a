use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::workflow::Workflow;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    #[serde(rename = "CREATED")]
    Created,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "CANCELED")]
    Canceled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "CREATED" => Some(Self::Created),
            "RUNNING" => Some(Self::Running),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            "CANCELED" => Some(Self::Canceled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub creator: String,
    pub workflow: Workflow,
    pub status: TaskStatus,
    /// Step id → output, for COMPLETED steps only.
    #[serde(default)]
    pub result: BTreeMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(id: String, input: CreateTaskInput) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: input.name,
            description: input.description,
            creator: input.creator,
            workflow: input.workflow,
            status: TaskStatus::Created,
            result: BTreeMap::new(),
            error: None,
            budget: input.budget,
            deadline: input.deadline,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        }
    }
}

/// Input for creating a new task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub creator: String,
    pub workflow: Workflow,
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
}

/// Scheduler scratchpad for one running task. Never handed out mutably.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskExecution {
    pub task_id: String,
    pub completed_steps: BTreeSet<String>,
    pub failed_steps: BTreeSet<String>,
    /// Most recently dispatched step still awaiting its result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    #[serde(default)]
    pub in_flight: BTreeSet<String>,
    /// Sum of cost estimates of the workers assigned so far.
    #[serde(default)]
    pub committed_cost: f64,
    /// When each step was handed to its worker; results are timed from here.
    #[serde(default)]
    pub dispatched_at: BTreeMap<String, DateTime<Utc>>,
    pub start_time: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    /// Set once the task reaches a terminal state; the record is then archived.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskExecution {
    pub fn new(task_id: String) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            completed_steps: BTreeSet::new(),
            failed_steps: BTreeSet::new(),
            current_step: None,
            in_flight: BTreeSet::new(),
            committed_cost: 0.0,
            dispatched_at: BTreeMap::new(),
            start_time: now,
            last_updated: now,
            finished_at: None,
        }
    }

    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }

    pub(crate) fn record_dispatch(&mut self, step_id: &str, cost: Option<f64>) {
        self.in_flight.insert(step_id.to_string());
        self.dispatched_at.insert(step_id.to_string(), Utc::now());
        self.current_step = Some(step_id.to_string());
        self.committed_cost += cost.unwrap_or(0.0);
        self.touch();
    }

    /// Returns the milliseconds since the step was dispatched, if it was.
    pub(crate) fn record_result(&mut self, step_id: &str, success: bool) -> Option<u64> {
        if success {
            self.completed_steps.insert(step_id.to_string());
        } else {
            self.failed_steps.insert(step_id.to_string());
        }
        self.in_flight.remove(step_id);
        if self.current_step.as_deref() == Some(step_id) {
            self.current_step = None;
        }
        self.touch();
        self.dispatched_at
            .get(step_id)
            .map(|at| (self.last_updated - *at).num_milliseconds().max(0) as u64)
    }
}
