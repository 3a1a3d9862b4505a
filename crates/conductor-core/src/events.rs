//! Task event bus: lifecycle notifications for observers.
//!
//! Emission never blocks the engine. Slow subscribers lag and drop the oldest
//! events; with no subscribers, events are discarded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskEventType {
    TaskCreated,
    TaskStarted,
    StepAssigned,
    StepCompleted,
    StepFailed,
    StepSkipped,
    TaskCompleted,
    TaskFailed,
    TaskCanceled,
}

impl TaskEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaskCreated => "TASK_CREATED",
            Self::TaskStarted => "TASK_STARTED",
            Self::StepAssigned => "STEP_ASSIGNED",
            Self::StepCompleted => "STEP_COMPLETED",
            Self::StepFailed => "STEP_FAILED",
            Self::StepSkipped => "STEP_SKIPPED",
            Self::TaskCompleted => "TASK_COMPLETED",
            Self::TaskFailed => "TASK_FAILED",
            Self::TaskCanceled => "TASK_CANCELED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEvent {
    #[serde(rename = "type")]
    pub event_type: TaskEventType,
    pub task_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl TaskEvent {
    pub fn task(event_type: TaskEventType, task_id: &str) -> Self {
        Self {
            event_type,
            task_id: task_id.to_string(),
            step_id: None,
            agent_id: None,
            data: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }

    pub fn step(event_type: TaskEventType, task_id: &str, step_id: &str) -> Self {
        Self {
            step_id: Some(step_id.to_string()),
            ..Self::task(event_type, task_id)
        }
    }

    pub fn with_agent(mut self, agent_id: Option<&str>) -> Self {
        self.agent_id = agent_id.map(str::to_string);
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TaskEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn emit(&self, event: TaskEvent) {
        tracing::debug!(
            "[EventBus] {} task={} step={:?}",
            event.event_type.as_str(),
            event.task_id,
            event.step_id
        );
        // Err only means nobody is listening.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
