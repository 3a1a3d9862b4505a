//! `conductor workflow` — Validate and run workflow definition files.
//!
//! `run` executes the workflow on a simulated local worker pool: every
//! dispatched step is answered by the assigned worker after an optional
//! latency, echoing `{agent, input}` as its output.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use conductor_core::dispatch::{ChannelDispatcher, StepDispatch};
use conductor_core::events::TaskEventType;
use conductor_core::models::agent::AgentStatus;
use conductor_core::models::task::{Task, TaskExecution, TaskStatus};
use conductor_core::state::AppState;
use conductor_core::workflow::schema::{roster_from_file, WorkflowDefinition};
use conductor_core::workflow::validator;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::UnboundedReceiver;

use super::{init_state, print_json};

/// Validate a workflow file without running it.
pub async fn validate(workflow_file: &str) -> Result<(), String> {
    let definition = WorkflowDefinition::from_file(workflow_file).map_err(|e| e.to_string())?;
    let workflow = definition.workflow();
    validator::check(&workflow).map_err(|v| format!("Workflow '{}' is invalid: {}", definition.name, v))?;

    println!("✅ Workflow '{}' is valid", definition.name);
    println!("   Steps: {}", workflow.steps.len());
    for (i, step) in workflow.steps.iter().enumerate() {
        let caps: Vec<&str> = step.requirements.capabilities.iter().map(String::as_str).collect();
        let deps = if step.depends_on.is_empty() {
            "-".to_string()
        } else {
            step.depends_on.join(", ")
        };
        println!(
            "   {}. {} (needs: [{}], after: {})",
            i + 1,
            step.id,
            caps.join(", "),
            deps
        );
    }
    Ok(())
}

/// How the simulated pool answers dispatches.
#[derive(Debug, Clone, Default)]
pub struct SimulationOptions {
    /// Steps that report failure instead of success.
    pub fail_steps: HashSet<String>,
    pub latency: Duration,
}

/// Run a workflow file to completion and print the final task and execution.
pub async fn run(
    workflow_file: &str,
    agents_file: &str,
    fail_steps: &[String],
    latency_ms: u64,
) -> Result<(), String> {
    let options = SimulationOptions {
        fail_steps: fail_steps.iter().cloned().collect(),
        latency: Duration::from_millis(latency_ms),
    };
    let (task, execution) = execute_file(workflow_file, agents_file, options).await?;

    print_json(&serde_json::json!({ "task": task, "execution": execution }));

    if task.status == TaskStatus::Completed {
        Ok(())
    } else {
        Err(format!(
            "Task {} ended {}: {}",
            task.id,
            task.status.as_str(),
            task.error.as_deref().unwrap_or("no reason recorded")
        ))
    }
}

/// Load both files, run the task on a simulated pool and return its final state.
pub async fn execute_file(
    workflow_file: &str,
    agents_file: &str,
    options: SimulationOptions,
) -> Result<(Task, Option<TaskExecution>), String> {
    let definition = WorkflowDefinition::from_file(workflow_file).map_err(|e| e.to_string())?;
    let roster = roster_from_file(agents_file).map_err(|e| e.to_string())?;

    let (dispatcher, dispatches) = ChannelDispatcher::new();
    let state = init_state(Arc::new(dispatcher));

    // A roster file is a trusted local pool; entries without a status start ACTIVE.
    for mut entry in roster {
        entry.status.get_or_insert(AgentStatus::Active);
        state
            .agent_store
            .register(entry)
            .await
            .map_err(|e| e.to_string())?;
    }

    tokio::spawn(run_simulated_pool(state.clone(), dispatches, options));

    let task = state
        .engine
        .create_task(definition.into_task_input(None))
        .await
        .map_err(|e| e.to_string())?;
    tracing::info!(
        "[Workflow] Loaded '{}' ({} step(s)) from {}",
        task.name,
        task.workflow.steps.len(),
        workflow_file
    );

    let mut events = state.engine.events().subscribe();
    state
        .engine
        .execute(&task.id)
        .await
        .map_err(|e| e.to_string())?;

    loop {
        match events.recv().await {
            Ok(event) if event.task_id == task.id => {
                tracing::info!(
                    "[Workflow] {} {}{}",
                    event.event_type.as_str(),
                    event.step_id.as_deref().unwrap_or(""),
                    event
                        .agent_id
                        .as_deref()
                        .map(|a| format!(" → {}", a))
                        .unwrap_or_default()
                );
                if matches!(
                    event.event_type,
                    TaskEventType::TaskCompleted | TaskEventType::TaskFailed | TaskEventType::TaskCanceled
                ) {
                    break;
                }
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("[Workflow] Event stream lagged by {} event(s)", skipped);
                let current = state.engine.get_task(&task.id).await.map_err(|e| e.to_string())?;
                if current.status.is_terminal() {
                    break;
                }
            }
            Err(RecvError::Closed) => break,
        }
    }

    let task = state.engine.get_task(&task.id).await.map_err(|e| e.to_string())?;
    let execution = state
        .engine
        .get_execution(&task.id)
        .await
        .map_err(|e| e.to_string())?;
    Ok((task, execution))
}

/// Answer every dispatch as the assigned worker would.
pub async fn run_simulated_pool(
    state: AppState,
    mut dispatches: UnboundedReceiver<StepDispatch>,
    options: SimulationOptions,
) {
    while let Some(dispatch) = dispatches.recv().await {
        let state = state.clone();
        let options = options.clone();
        tokio::spawn(async move {
            if !options.latency.is_zero() {
                tokio::time::sleep(options.latency).await;
            }

            let succeed = !options.fail_steps.contains(&dispatch.step_id);
            let (output, error) = if succeed {
                let output = serde_json::json!({
                    "agent": dispatch.agent_id,
                    "input": dispatch.input,
                });
                (Some(output), None)
            } else {
                (None, Some(format!("Simulated failure of step {}", dispatch.step_id)))
            };

            if let Err(e) = state
                .engine
                .submit_step_result(&dispatch.task_id, &dispatch.step_id, succeed, output, error)
                .await
            {
                tracing::warn!(
                    "[Workflow] Worker {} could not report step {}: {}",
                    dispatch.agent_id,
                    dispatch.step_id,
                    e
                );
            }
        });
    }
}
