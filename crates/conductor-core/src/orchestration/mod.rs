//! TaskEngine - task lifecycle and the re-entrant dispatch loop.
//!
//! ```text
//! create_task ──► CREATED ──execute──► RUNNING ──► COMPLETED | FAILED
//!                                         │
//!                                         └──cancel──► CANCELED
//! ```
//!
//! A dispatch pass runs under the task's exclusive lock:
//!   1. Stop if the task is no longer RUNNING
//!   2. Finalize if every step is terminal
//!   3. Compute ready steps; detect starvation when nothing is ready or in flight
//!   4. For each ready step, rank eligible workers and mark it ASSIGNED,
//!      or FAILED when nobody can take it
//!
//! Dispatches collected by the pass are delivered after the lock is released.
//! Each step result re-enters the loop through [`TaskEngine::submit_step_result`].

use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::SchedulerConfig;
use crate::decision::{AgentCandidate, DecisionContext, DecisionEngine};
use crate::dispatch::{StepDispatch, StepDispatcher};
use crate::error::SchedulerError;
use crate::events::{EventBus, TaskEvent, TaskEventType};
use crate::models::agent::Agent;
use crate::models::task::{CreateTaskInput, Task, TaskExecution, TaskStatus};
use crate::models::workflow::{StepStatus, WorkflowStep};
use crate::selector::{AgentDirectory, WorkerSelector};
use crate::store::task_store::TaskEntry;
use crate::store::TaskStore;
use crate::workflow::validator::{
    apply_step_status, blocking_failures, check, initialize, is_complete, next_ready_steps,
};

type Delivery = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Acknowledgement returned to a worker reporting a step result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepResultAck {
    pub task_id: String,
    pub step_id: String,
    /// `false` for duplicates and for results that arrive after the task stopped.
    pub accepted: bool,
    pub task_status: TaskStatus,
}

struct EngineInner {
    tasks: TaskStore,
    directory: Arc<dyn AgentDirectory>,
    dispatcher: Arc<dyn StepDispatcher>,
    decision: Arc<DecisionEngine>,
    events: EventBus,
    config: SchedulerConfig,
}

/// Single scheduling authority over an in-memory task set. Cloning shares it.
#[derive(Clone)]
pub struct TaskEngine {
    inner: Arc<EngineInner>,
}

impl TaskEngine {
    pub fn new(
        directory: Arc<dyn AgentDirectory>,
        dispatcher: Arc<dyn StepDispatcher>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                tasks: TaskStore::new(),
                directory,
                dispatcher,
                decision: Arc::new(DecisionEngine::new(&config)),
                events: EventBus::new(config.event_capacity),
                config,
            }),
        }
    }

    pub fn decision(&self) -> &Arc<DecisionEngine> {
        &self.inner.decision
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    // ─── Task lifecycle ───────────────────────────────────────────────────

    pub async fn create_task(&self, input: CreateTaskInput) -> Result<Task, SchedulerError> {
        if input.name.trim().is_empty() {
            return Err(SchedulerError::Validation(
                "Task name must not be empty".to_string(),
            ));
        }
        if input.creator.trim().is_empty() {
            return Err(SchedulerError::Validation(
                "Task creator must not be empty".to_string(),
            ));
        }
        if input.budget.is_some_and(|b| b.is_nan() || b < 0.0) {
            return Err(SchedulerError::Validation(
                "Task budget must be a non-negative number".to_string(),
            ));
        }
        check(&input.workflow)?;

        let workflow = initialize(&input.workflow);
        let task = Task::new(
            uuid::Uuid::new_v4().to_string(),
            CreateTaskInput { workflow, ..input },
        );
        self.inner.tasks.insert(task.clone()).await?;

        tracing::info!(
            "[Engine] Created task {} ({} step(s)) for {}",
            task.id,
            task.workflow.steps.len(),
            task.creator
        );
        self.inner
            .events
            .emit(TaskEvent::task(TaskEventType::TaskCreated, &task.id));
        Ok(task)
    }

    /// Moves a CREATED task to RUNNING and returns at once; the dispatch loop
    /// runs in the background.
    pub async fn execute(&self, task_id: &str) -> Result<Task, SchedulerError> {
        let entry = self.inner.tasks.entry(task_id).await?;
        let snapshot = {
            let mut guard = entry.lock().await;
            if guard.task.status != TaskStatus::Created {
                return Err(SchedulerError::State(format!(
                    "Task {} is {}, only CREATED tasks can be executed",
                    task_id,
                    guard.task.status.as_str()
                )));
            }
            let now = Utc::now();
            guard.task.status = TaskStatus::Running;
            guard.task.started_at = Some(now);
            guard.task.updated_at = now;
            guard.execution = Some(TaskExecution::new(task_id.to_string()));
            guard.task.clone()
        };

        tracing::info!("[Engine] Task {} started", task_id);
        self.inner
            .events
            .emit(TaskEvent::task(TaskEventType::TaskStarted, task_id));

        let engine = self.clone();
        let id = task_id.to_string();
        tokio::spawn(async move {
            engine.advance(&id).await;
        });

        Ok(snapshot)
    }

    /// Stops further dispatch. Steps already handed out are not recalled.
    pub async fn cancel(&self, task_id: &str) -> Result<Task, SchedulerError> {
        let entry = self.inner.tasks.entry(task_id).await?;
        let mut guard = entry.lock().await;
        let TaskEntry { task, execution } = &mut *guard;

        if task.status != TaskStatus::Running {
            return Err(SchedulerError::State(format!(
                "Task {} is {}, only RUNNING tasks can be canceled",
                task_id,
                task.status.as_str()
            )));
        }

        let now = Utc::now();
        task.status = TaskStatus::Canceled;
        task.completed_at = Some(now);
        task.updated_at = now;
        if let Some(execution) = execution.as_mut() {
            execution.finished_at = Some(now);
            execution.touch();
        }

        tracing::info!("[Engine] Task {} canceled", task_id);
        self.inner
            .events
            .emit(TaskEvent::task(TaskEventType::TaskCanceled, task_id));
        Ok(task.clone())
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Task, SchedulerError> {
        self.inner.tasks.get(task_id).await
    }

    pub async fn list_tasks(&self, creator: Option<&str>, status: Option<TaskStatus>) -> Vec<Task> {
        self.inner.tasks.list(creator, status).await
    }

    /// `None` for a task that has never been executed.
    pub async fn get_execution(&self, task_id: &str) -> Result<Option<TaskExecution>, SchedulerError> {
        self.inner.tasks.get_execution(task_id).await
    }

    // ─── Step results ─────────────────────────────────────────────────────

    /// The single ingress for workers reporting a step outcome.
    pub async fn submit_step_result(
        &self,
        task_id: &str,
        step_id: &str,
        success: bool,
        output: Option<serde_json::Value>,
        error: Option<String>,
    ) -> Result<StepResultAck, SchedulerError> {
        let entry = self.inner.tasks.entry(task_id).await?;

        let (agent_id, execution_time_ms, accepted, task_status) = {
            let mut guard = entry.lock().await;
            let TaskEntry { task, execution } = &mut *guard;

            let step = task.workflow.step(step_id).ok_or_else(|| {
                SchedulerError::NotFound(format!("Step {} not found in task {}", step_id, task_id))
            })?;
            if step.status == StepStatus::Pending {
                return Err(SchedulerError::State(format!(
                    "Step {} of task {} has not been dispatched",
                    step_id, task_id
                )));
            }

            let already_recorded = execution.as_ref().is_some_and(|e| {
                e.completed_steps.contains(step_id) || e.failed_steps.contains(step_id)
            });
            if step.status.is_terminal() || already_recorded {
                tracing::warn!(
                    "[Engine] Ignoring duplicate result for step {} of task {}",
                    step_id,
                    task_id
                );
                return Ok(StepResultAck {
                    task_id: task_id.to_string(),
                    step_id: step_id.to_string(),
                    accepted: false,
                    task_status: task.status,
                });
            }

            let agent_id = step.assigned_agent.clone();
            let execution_time_ms = execution
                .as_mut()
                .and_then(|e| e.record_result(step_id, success))
                .unwrap_or(0);

            if task.status != TaskStatus::Running {
                tracing::warn!(
                    "[Engine] Late result for step {} of {} task {}; execution updated only",
                    step_id,
                    task.status.as_str(),
                    task_id
                );
                (agent_id, execution_time_ms, false, task.status)
            } else {
                let (status, error) = if success {
                    (StepStatus::Completed, None)
                } else {
                    let reason = error.unwrap_or_else(|| "Step reported failure".to_string());
                    (StepStatus::Failed, Some(reason))
                };
                apply_step_status(&mut task.workflow, step_id, status, output, error.clone())?;
                task.updated_at = Utc::now();

                let (event_type, data) = if success {
                    (TaskEventType::StepCompleted, serde_json::Value::Null)
                } else {
                    (TaskEventType::StepFailed, serde_json::json!({ "error": error }))
                };
                self.inner.events.emit(
                    TaskEvent::step(event_type, task_id, step_id)
                        .with_agent(agent_id.as_deref())
                        .with_data(data),
                );
                tracing::info!(
                    "[Engine] Task {}: step {} {}",
                    task_id,
                    step_id,
                    status.as_str()
                );
                (agent_id, execution_time_ms, true, task.status)
            }
        };

        if let Some(agent_id) = agent_id.as_deref() {
            self.inner
                .decision
                .record_outcome(agent_id, task_id, step_id, success, execution_time_ms);
        }

        let task_status = if accepted {
            self.advance(task_id).await;
            self.inner.tasks.get(task_id).await?.status
        } else {
            task_status
        };

        Ok(StepResultAck {
            task_id: task_id.to_string(),
            step_id: step_id.to_string(),
            accepted,
            task_status,
        })
    }

    // ─── Dispatch loop ────────────────────────────────────────────────────

    async fn advance(&self, task_id: &str) {
        match self.plan(task_id).await {
            Ok(dispatches) => {
                for dispatch in dispatches {
                    tokio::spawn(self.deliver(dispatch));
                }
            }
            Err(e) => {
                tracing::error!("[Engine] Dispatch pass for task {} failed: {}", task_id, e);
            }
        }
    }

    /// One serialized pass over a task. Returns the dispatches to deliver.
    async fn plan(&self, task_id: &str) -> Result<Vec<StepDispatch>, SchedulerError> {
        let entry = self.inner.tasks.entry(task_id).await?;
        let mut guard = entry.lock().await;
        let TaskEntry { task, execution } = &mut *guard;

        let mut dispatches = Vec::new();
        let Some(execution) = execution.as_mut() else {
            return Ok(dispatches);
        };

        loop {
            if task.status != TaskStatus::Running {
                break;
            }
            if is_complete(&task.workflow) {
                self.finalize(task, execution);
                break;
            }

            let ready = next_ready_steps(&task.workflow, &execution.completed_steps);
            if ready.is_empty() {
                let waiting = task.workflow.steps.iter().any(|s| s.status.is_in_flight());
                if waiting {
                    break;
                }
                self.skip_blocked(task, execution)?;
                continue;
            }

            tracing::debug!("[Engine] Task {}: {} step(s) ready", task_id, ready.len());
            for step in ready {
                match self.choose_worker(task, execution, &step).await {
                    Ok(Some(agent)) => {
                        apply_step_status(
                            &mut task.workflow,
                            &step.id,
                            StepStatus::Assigned,
                            None,
                            None,
                        )?;
                        if let Some(s) = task.workflow.step_mut(&step.id) {
                            s.assigned_agent = Some(agent.id.clone());
                        }
                        execution.record_dispatch(&step.id, agent.cost_estimate);

                        tracing::info!(
                            "[Engine] Task {}: step {} assigned to {}",
                            task_id,
                            step.id,
                            agent.id
                        );
                        self.inner.events.emit(
                            TaskEvent::step(TaskEventType::StepAssigned, task_id, &step.id)
                                .with_agent(Some(&agent.id)),
                        );
                        dispatches.push(StepDispatch {
                            task_id: task_id.to_string(),
                            step_id: step.id.clone(),
                            agent_id: agent.id,
                            input: step.input.clone(),
                            requirements: step.requirements.clone(),
                        });
                    }
                    Ok(None) => {
                        let reason = format!("No worker available for step {}", step.id);
                        self.fail_step(task, execution, &step.id, reason)?;
                    }
                    Err(e) => {
                        self.fail_step(task, execution, &step.id, e.to_string())?;
                    }
                }
            }
            task.updated_at = Utc::now();
        }

        Ok(dispatches)
    }

    /// Selector narrows to eligible workers, the decision engine ranks them.
    async fn choose_worker(
        &self,
        task: &Task,
        execution: &TaskExecution,
        step: &WorkflowStep,
    ) -> Result<Option<Agent>, SchedulerError> {
        let eligible = WorkerSelector::candidates(step, self.inner.directory.as_ref()).await?;
        if eligible.is_empty() {
            return Ok(None);
        }

        let decision = &self.inner.decision;
        let candidates: Vec<AgentCandidate> = eligible
            .iter()
            .map(|agent| {
                let mut candidate = AgentCandidate::from_agent(
                    agent,
                    &step.requirements,
                    self.inner.config.base_score,
                );
                if candidate.estimated_time_ms.is_none() {
                    candidate.estimated_time_ms = decision.average_execution_time_ms(&agent.id);
                }
                candidate
            })
            .collect();

        let context = DecisionContext {
            task_id: task.id.clone(),
            step_id: step.id.clone(),
            deadline: task.deadline,
            remaining_budget: task.budget.map(|b| b - execution.committed_cost),
            now: Utc::now(),
        };

        Ok(decision
            .rank(&context, &candidates)
            .and_then(|id| eligible.into_iter().find(|a| a.id == id)))
    }

    fn deliver(&self, dispatch: StepDispatch) -> Delivery {
        let engine = self.clone();
        Box::pin(async move {
            let task_id = dispatch.task_id.clone();
            let step_id = dispatch.step_id.clone();

            match engine.inner.dispatcher.dispatch(dispatch).await {
                Ok(()) => engine.mark_running(&task_id, &step_id).await,
                Err(e) => {
                    tracing::warn!(
                        "[Engine] Task {}: dispatch of step {} failed: {}",
                        task_id,
                        step_id,
                        e
                    );
                    if let Err(err) = engine
                        .submit_step_result(&task_id, &step_id, false, None, Some(e.to_string()))
                        .await
                    {
                        tracing::error!(
                            "[Engine] Task {}: could not record dispatch failure of {}: {}",
                            task_id,
                            step_id,
                            err
                        );
                    }
                }
            }
        })
    }

    /// ASSIGNED → RUNNING once the hand-off succeeded, unless a result beat us to it.
    async fn mark_running(&self, task_id: &str, step_id: &str) {
        let Ok(entry) = self.inner.tasks.entry(task_id).await else {
            return;
        };
        let mut guard = entry.lock().await;
        if guard.task.status != TaskStatus::Running {
            return;
        }
        let assigned = guard
            .task
            .workflow
            .step(step_id)
            .is_some_and(|s| s.status == StepStatus::Assigned);
        if assigned
            && apply_step_status(&mut guard.task.workflow, step_id, StepStatus::Running, None, None)
                .is_ok()
        {
            guard.task.updated_at = Utc::now();
        }
    }

    fn fail_step(
        &self,
        task: &mut Task,
        execution: &mut TaskExecution,
        step_id: &str,
        reason: String,
    ) -> Result<(), SchedulerError> {
        tracing::warn!("[Engine] Task {}: step {} failed: {}", task.id, step_id, reason);
        apply_step_status(
            &mut task.workflow,
            step_id,
            StepStatus::Failed,
            None,
            Some(reason.clone()),
        )?;
        execution.record_result(step_id, false);
        self.inner.events.emit(
            TaskEvent::step(TaskEventType::StepFailed, &task.id, step_id)
                .with_data(serde_json::json!({ "error": reason })),
        );
        Ok(())
    }

    /// Starvation: nothing ready, nothing in flight, PENDING steps remain.
    fn skip_blocked(
        &self,
        task: &mut Task,
        execution: &mut TaskExecution,
    ) -> Result<(), SchedulerError> {
        let blockers = blocking_failures(&task.workflow);
        let mut all_failed = BTreeSet::new();

        for step_id in task.workflow.step_ids_with_status(StepStatus::Pending) {
            let failed = blockers.get(&step_id).cloned().unwrap_or_default();
            let reason = if failed.is_empty() {
                "Skipped: dependencies can no longer complete".to_string()
            } else {
                format!(
                    "Skipped: blocked by failed step(s) {}",
                    failed.iter().cloned().collect::<Vec<_>>().join(", ")
                )
            };
            all_failed.extend(failed);

            apply_step_status(
                &mut task.workflow,
                &step_id,
                StepStatus::Skipped,
                None,
                Some(reason),
            )?;
            self.inner.events.emit(TaskEvent::step(
                TaskEventType::StepSkipped,
                &task.id,
                &step_id,
            ));
        }

        let ids: Vec<String> = all_failed.into_iter().collect();
        tracing::warn!(
            "[Engine] Task {} blocked by failed step(s): {}",
            task.id,
            ids.join(", ")
        );
        task.error = Some(format!("Workflow blocked by failed step(s): {}", ids.join(", ")));
        execution.touch();
        Ok(())
    }

    fn finalize(&self, task: &mut Task, execution: &mut TaskExecution) {
        let now = Utc::now();
        let failed = task.workflow.step_ids_with_status(StepStatus::Failed);

        task.result = task
            .workflow
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .map(|s| {
                (
                    s.id.clone(),
                    s.output.clone().unwrap_or(serde_json::Value::Null),
                )
            })
            .collect();

        let event = if failed.is_empty() {
            task.status = TaskStatus::Completed;
            TaskEvent::task(TaskEventType::TaskCompleted, &task.id)
                .with_data(serde_json::json!({ "result": task.result }))
        } else {
            task.status = TaskStatus::Failed;
            if task.error.is_none() {
                task.error = Some(format!("Step(s) failed: {}", failed.join(", ")));
            }
            TaskEvent::task(TaskEventType::TaskFailed, &task.id)
                .with_data(serde_json::json!({ "error": task.error }))
        };
        task.completed_at = Some(now);
        task.updated_at = now;
        execution.finished_at = Some(now);
        execution.touch();

        tracing::info!("[Engine] Task {} finished: {}", task.id, task.status.as_str());
        self.inner.events.emit(event);
    }
}
