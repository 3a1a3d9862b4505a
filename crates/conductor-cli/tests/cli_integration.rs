//! Integration tests for the conductor-cli commands.
//!
//! These tests exercise the same code paths as the binary: the JSON-RPC
//! router over in-memory state, and the workflow runner over temp files.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use conductor_cli::commands::workflow::{self, SimulationOptions};
use conductor_core::dispatch::StepDispatch;
use conductor_core::models::task::TaskStatus;
use conductor_core::models::workflow::StepStatus;
use conductor_core::rpc::RpcRouter;
use conductor_core::state::{AppState, AppStateInner};
use conductor_core::SchedulerConfig;
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedReceiver;

/// In-memory state whose dispatches land on the returned receiver.
fn test_state() -> (AppState, UnboundedReceiver<StepDispatch>) {
    let (inner, rx) = AppStateInner::with_channel(SchedulerConfig::default());
    (Arc::new(inner), rx)
}

async fn call(router: &RpcRouter, method: &str, params: Value) -> Value {
    router
        .handle_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params
        }))
        .await
}

async fn next_dispatch(rx: &mut UnboundedReceiver<StepDispatch>) -> StepDispatch {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for dispatch")
        .expect("dispatch channel closed")
}

fn swap_workflow() -> Value {
    json!({
        "name": "Token Swap",
        "creator": "0xabc",
        "budget": 10.0,
        "steps": [
            { "id": "analyze", "requirements": { "capabilities": ["analysis"] } },
            { "id": "select", "requirements": { "capabilities": ["routing"] }, "dependsOn": ["analyze"] },
            { "id": "execute", "requirements": { "capabilities": ["routing"], "networks": ["base"] }, "dependsOn": ["select"] }
        ]
    })
}

#[tokio::test]
async fn test_agent_register_activate_and_list() {
    let (state, _rx) = test_state();
    let router = RpcRouter::new(state);

    let response = call(
        &router,
        "agents.register",
        json!({ "id": "w1", "capabilities": ["analysis"], "networks": ["base"], "owner": "0x1" }),
    )
    .await;
    let agent = &response["result"]["agent"];
    assert_eq!(agent["id"], "w1");
    assert_eq!(agent["status"], "PENDING");

    let response = call(&router, "agents.activate", json!({ "id": "w1" })).await;
    assert_eq!(response["result"]["agent"]["status"], "ACTIVE");

    let response = call(&router, "agents.activate", json!({ "id": "w1" })).await;
    assert_eq!(response["error"]["code"], -32003);

    let response = call(&router, "agents.list", json!({ "status": "ACTIVE" })).await;
    assert_eq!(response["result"]["agents"].as_array().unwrap().len(), 1);

    let response = call(&router, "agents.updateStatus", json!({ "id": "w1", "status": "NAPPING" })).await;
    assert_eq!(response["error"]["code"], -32602);

    let response = call(&router, "agents.deregister", json!({ "id": "w1" })).await;
    assert_eq!(response["result"]["deregistered"], true);
    let response = call(&router, "agents.get", json!({ "id": "w1" })).await;
    assert_eq!(response["error"]["code"], -32001);
}

#[tokio::test]
async fn test_full_task_flow_over_rpc() {
    let (state, mut rx) = test_state();
    let router = RpcRouter::new(state);

    call(
        &router,
        "agents.register",
        json!({
            "id": "w1",
            "capabilities": ["analysis", "routing"],
            "networks": ["base"],
            "status": "ACTIVE",
            "costEstimate": 1.5
        }),
    )
    .await;

    let response = call(&router, "tasks.create", swap_workflow()).await;
    let task = &response["result"]["task"];
    assert_eq!(task["status"], "CREATED");
    assert_eq!(task["workflow"][0]["status"], "PENDING");
    let task_id = task["id"].as_str().unwrap().to_string();

    let response = call(&router, "tasks.execution", json!({ "id": task_id })).await;
    assert!(response["result"]["execution"].is_null());

    let response = call(&router, "tasks.execute", json!({ "id": task_id })).await;
    assert_eq!(response["result"]["ok"], true);
    assert_eq!(response["result"]["task"]["status"], "RUNNING");

    for expected in ["analyze", "select", "execute"] {
        let dispatch = next_dispatch(&mut rx).await;
        assert_eq!(dispatch.step_id, expected);
        assert_eq!(dispatch.agent_id, "w1");
        let response = call(
            &router,
            "steps.submitResult",
            json!({
                "taskId": task_id,
                "stepId": expected,
                "success": true,
                "output": { "step": expected }
            }),
        )
        .await;
        assert_eq!(response["result"]["accepted"], true);
    }

    let response = call(&router, "tasks.get", json!({ "id": task_id })).await;
    let task = &response["result"];
    assert_eq!(task["status"], "COMPLETED");
    assert_eq!(task["result"]["execute"]["step"], "execute");

    let response = call(&router, "tasks.execution", json!({ "id": task_id })).await;
    let execution = &response["result"]["execution"];
    assert_eq!(execution["completedSteps"].as_array().unwrap().len(), 3);
    assert_eq!(execution["committedCost"], 4.5);

    let response = call(&router, "agents.stats", json!({ "id": "w1" })).await;
    assert_eq!(response["result"]["totalTasks"], 3);
    assert_eq!(response["result"]["successRate"], 1.0);

    let response = call(&router, "tasks.list", json!({ "creator": "0xabc", "status": "COMPLETED" })).await;
    assert_eq!(response["result"]["tasks"].as_array().unwrap().len(), 1);

    let response = call(&router, "tasks.cancel", json!({ "id": task_id })).await;
    assert_eq!(response["error"]["code"], -32003);
}

#[tokio::test]
async fn test_invalid_workflows_rejected() {
    let (state, _rx) = test_state();
    let router = RpcRouter::new(state);

    let cyclic = json!({
        "steps": [
            { "id": "a", "dependsOn": ["b"] },
            { "id": "b", "dependsOn": ["a"] }
        ]
    });
    let response = call(&router, "workflows.validate", cyclic.clone()).await;
    assert_eq!(response["result"]["valid"], false);
    assert!(response["result"]["error"].as_str().unwrap().contains("cycle"));

    let mut create = cyclic;
    create["name"] = json!("loop");
    let response = call(&router, "tasks.create", create).await;
    assert_eq!(response["error"]["code"], -32002);

    let response = call(&router, "tasks.list", json!({})).await;
    assert!(response["result"]["tasks"].as_array().unwrap().is_empty());

    let response = call(
        &router,
        "workflows.validate",
        json!({ "steps": [{ "id": "a" }, { "id": "b", "dependsOn": ["a"] }] }),
    )
    .await;
    assert_eq!(response["result"]["valid"], true);
}

fn write_temp(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes()).expect("Failed to write temp file");
    file
}

const WORKFLOW_YAML: &str = r#"
name: "Rebalance"
creator: "cli-test"
steps:
  - id: analyze
    requirements:
      capabilities: [analysis]
    input: { pair: "ETH/USDC" }
  - id: hedge
    requirements:
      capabilities: [routing]
  - id: execute
    requirements:
      capabilities: [routing]
      networks: [base]
    dependsOn: [analyze, hedge]
"#;

const ROSTER_YAML: &str = r#"
- id: analyst
  capabilities: [analysis]
  networks: [ethereum]
- id: router
  capabilities: [routing]
  networks: [base]
"#;

#[tokio::test]
async fn test_workflow_run_on_simulated_pool() {
    let workflow_file = write_temp(WORKFLOW_YAML);
    let roster_file = write_temp(ROSTER_YAML);

    let (task, execution) = workflow::execute_file(
        workflow_file.path().to_str().unwrap(),
        roster_file.path().to_str().unwrap(),
        SimulationOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.creator, "cli-test");
    assert_eq!(task.result.len(), 3);
    assert_eq!(task.result["analyze"]["agent"], "analyst");
    assert_eq!(task.result["analyze"]["input"]["pair"], "ETH/USDC");
    assert_eq!(task.result["execute"]["agent"], "router");

    let execution = execution.unwrap();
    assert_eq!(execution.completed_steps.len(), 3);
    assert!(execution.finished_at.is_some());
}

#[tokio::test]
async fn test_workflow_run_with_failing_step() {
    let workflow_file = write_temp(WORKFLOW_YAML);
    let roster_file = write_temp(ROSTER_YAML);

    let options = SimulationOptions {
        fail_steps: ["hedge".to_string()].into_iter().collect(),
        latency: Duration::from_millis(5),
    };
    let (task, _) = workflow::execute_file(
        workflow_file.path().to_str().unwrap(),
        roster_file.path().to_str().unwrap(),
        options,
    )
    .await
    .unwrap();

    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.result.contains_key("analyze"));
    assert_eq!(task.workflow.step("hedge").unwrap().status, StepStatus::Failed);
    assert_eq!(task.workflow.step("execute").unwrap().status, StepStatus::Skipped);

    let err = workflow::run(
        workflow_file.path().to_str().unwrap(),
        roster_file.path().to_str().unwrap(),
        &["analyze".to_string()],
        0,
    )
    .await
    .unwrap_err();
    assert!(err.contains("FAILED"));
}

#[tokio::test]
async fn test_workflow_validate_command() {
    let good = write_temp(WORKFLOW_YAML);
    assert!(workflow::validate(good.path().to_str().unwrap()).await.is_ok());

    let bad = write_temp("name: bad\nsteps:\n  - id: a\n    dependsOn: [ghost]\n");
    let err = workflow::validate(bad.path().to_str().unwrap()).await.unwrap_err();
    assert!(err.contains("unknown step 'ghost'"));

    assert!(workflow::validate("/definitely/not/here.yaml").await.is_err());
}
