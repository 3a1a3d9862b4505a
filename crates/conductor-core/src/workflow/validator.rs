//! Workflow validation and the per-step state machine.
//!
//! All functions here are pure over a [`Workflow`]: they never touch task or
//! execution records, so the engine can call them while holding a task lock.
//!
//! Step lifecycle:
//!
//! ```text
//! PENDING ──► ASSIGNED ──► RUNNING ──► COMPLETED | FAILED
//!    │                                       ▲
//!    └──────────► FAILED (no worker) ────────┘
//!    └──────────► SKIPPED (upstream failed)
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::Utc;

use crate::error::SchedulerError;
use crate::models::workflow::{StepStatus, Workflow, WorkflowStep};

/// First structural problem found in a workflow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowViolation {
    #[error("duplicate step id '{0}'")]
    DuplicateStepId(String),

    #[error("step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    #[error("dependency cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
}

impl From<WorkflowViolation> for SchedulerError {
    fn from(v: WorkflowViolation) -> Self {
        SchedulerError::Validation(format!("Invalid workflow: {}", v))
    }
}

/// Check uniqueness, referential integrity and acyclicity, in that order.
pub fn check(workflow: &Workflow) -> Result<(), WorkflowViolation> {
    let mut seen = HashSet::with_capacity(workflow.steps.len());
    for step in &workflow.steps {
        if !seen.insert(step.id.as_str()) {
            return Err(WorkflowViolation::DuplicateStepId(step.id.clone()));
        }
    }

    for step in &workflow.steps {
        for dep in &step.depends_on {
            if !seen.contains(dep.as_str()) {
                return Err(WorkflowViolation::UnknownDependency {
                    step: step.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    match find_cycle(workflow) {
        Some(path) => Err(WorkflowViolation::Cycle(path)),
        None => Ok(()),
    }
}

/// Fails closed: `false` for any violation, never panics.
pub fn validate(workflow: &Workflow) -> bool {
    check(workflow).is_ok()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// Depth-first walk over `depends_on` edges with an on-stack marker.
/// Returns the offending path (first id repeated at the end), self-loops included.
fn find_cycle(workflow: &Workflow) -> Option<Vec<String>> {
    let index: HashMap<&str, usize> = workflow
        .steps
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.as_str(), i))
        .collect();
    let mut marks = vec![Mark::Unvisited; workflow.steps.len()];

    for root in 0..workflow.steps.len() {
        if marks[root] != Mark::Unvisited {
            continue;
        }

        // (step index, next dependency to visit)
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        marks[root] = Mark::OnStack;

        while let Some(frame) = stack.last_mut() {
            let (node, cursor) = *frame;
            let deps = &workflow.steps[node].depends_on;

            if cursor >= deps.len() {
                marks[node] = Mark::Done;
                stack.pop();
                continue;
            }
            frame.1 += 1;

            let Some(&dep) = index.get(deps[cursor].as_str()) else {
                continue;
            };
            match marks[dep] {
                Mark::OnStack => {
                    let start = stack.iter().position(|(n, _)| *n == dep).unwrap_or(0);
                    let mut path: Vec<String> = stack[start..]
                        .iter()
                        .map(|(n, _)| workflow.steps[*n].id.clone())
                        .collect();
                    path.push(workflow.steps[dep].id.clone());
                    return Some(path);
                }
                Mark::Unvisited => {
                    marks[dep] = Mark::OnStack;
                    stack.push((dep, 0));
                }
                Mark::Done => {}
            }
        }
    }

    None
}

/// Copy of `workflow` with every step back at PENDING and transient fields cleared.
pub fn initialize(workflow: &Workflow) -> Workflow {
    let steps = workflow
        .steps
        .iter()
        .map(|s| WorkflowStep {
            id: s.id.clone(),
            name: s.name.clone(),
            requirements: s.requirements.clone(),
            input: s.input.clone(),
            depends_on: s.depends_on.clone(),
            status: StepStatus::Pending,
            output: None,
            error: None,
            assigned_agent: None,
            start_time: None,
            end_time: None,
        })
        .collect();
    Workflow::new(steps)
}

/// PENDING steps whose dependencies are all in `completed`. Order is workflow order,
/// but callers must not rely on it.
pub fn next_ready_steps(workflow: &Workflow, completed: &BTreeSet<String>) -> Vec<WorkflowStep> {
    workflow
        .steps
        .iter()
        .filter(|s| s.status == StepStatus::Pending)
        .filter(|s| s.depends_on.iter().all(|d| completed.contains(d)))
        .cloned()
        .collect()
}

/// No further progress is possible. Says nothing about success.
pub fn is_complete(workflow: &Workflow) -> bool {
    workflow.steps.iter().all(|s| s.status.is_terminal())
}

/// Pure variant of [`apply_step_status`].
pub fn set_step_status(
    workflow: &Workflow,
    step_id: &str,
    status: StepStatus,
    output: Option<serde_json::Value>,
    error: Option<String>,
) -> Result<Workflow, SchedulerError> {
    let mut updated = workflow.clone();
    apply_step_status(&mut updated, step_id, status, output, error)?;
    Ok(updated)
}

/// Set a step's status in place, stamping `start_time` on first entry to RUNNING
/// and `end_time` on entry to a terminal status.
pub fn apply_step_status(
    workflow: &mut Workflow,
    step_id: &str,
    status: StepStatus,
    output: Option<serde_json::Value>,
    error: Option<String>,
) -> Result<(), SchedulerError> {
    let step = workflow
        .step_mut(step_id)
        .ok_or_else(|| SchedulerError::NotFound(format!("Step {} not found", step_id)))?;

    let now = Utc::now();
    step.status = status;
    if status == StepStatus::Running && step.start_time.is_none() {
        step.start_time = Some(now);
    }
    if status.is_terminal() {
        step.end_time = Some(now);
    }
    if output.is_some() {
        step.output = output;
    }
    if error.is_some() {
        step.error = error;
    }
    Ok(())
}

/// For every PENDING step that can no longer become ready, the FAILED steps upstream
/// of it. Steps blocked only by SKIPPED ancestors inherit those ancestors' blockers.
pub fn blocking_failures(workflow: &Workflow) -> BTreeMap<String, BTreeSet<String>> {
    let by_id: HashMap<&str, &WorkflowStep> =
        workflow.steps.iter().map(|s| (s.id.as_str(), s)).collect();
    let mut blocked = BTreeMap::new();

    for step in workflow.steps.iter().filter(|s| s.status == StepStatus::Pending) {
        let mut failed = BTreeSet::new();
        let mut visited = HashSet::new();
        let mut frontier: Vec<&str> = step.depends_on.iter().map(String::as_str).collect();

        while let Some(id) = frontier.pop() {
            if !visited.insert(id) {
                continue;
            }
            let Some(dep) = by_id.get(id) else { continue };
            match dep.status {
                StepStatus::Failed => {
                    failed.insert(dep.id.clone());
                }
                StepStatus::Pending | StepStatus::Skipped => {
                    frontier.extend(dep.depends_on.iter().map(String::as_str));
                }
                _ => {}
            }
        }

        if !failed.is_empty() {
            blocked.insert(step.id.clone(), failed);
        }
    }

    blocked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::workflow::StepRequirements;

    fn step(id: &str, deps: &[&str]) -> WorkflowStep {
        WorkflowStep::new(
            id,
            id,
            StepRequirements::new(["compute"]),
            deps.iter().map(|d| d.to_string()).collect(),
        )
    }

    fn linear() -> Workflow {
        Workflow::new(vec![
            step("analyze", &[]),
            step("select", &["analyze"]),
            step("execute", &["select"]),
        ])
    }

    #[test]
    fn test_validate_accepts_dag() {
        assert!(validate(&linear()));
        assert!(validate(&Workflow::default()));

        let diamond = Workflow::new(vec![
            step("a", &[]),
            step("b", &["a"]),
            step("c", &["a"]),
            step("d", &["b", "c"]),
        ]);
        assert!(validate(&diamond));
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let wf = Workflow::new(vec![step("a", &[]), step("a", &[])]);
        assert_eq!(
            check(&wf),
            Err(WorkflowViolation::DuplicateStepId("a".to_string()))
        );
        assert!(!validate(&wf));
    }

    #[test]
    fn test_validate_rejects_dangling_dependency() {
        let wf = Workflow::new(vec![step("a", &["ghost"])]);
        assert_eq!(
            check(&wf),
            Err(WorkflowViolation::UnknownDependency {
                step: "a".to_string(),
                dependency: "ghost".to_string(),
            })
        );
    }

    #[test]
    fn test_validate_rejects_cycles() {
        let two = Workflow::new(vec![step("a", &["b"]), step("b", &["a"])]);
        assert!(matches!(check(&two), Err(WorkflowViolation::Cycle(_))));

        let self_loop = Workflow::new(vec![step("a", &[]), step("b", &["b"])]);
        assert_eq!(
            check(&self_loop),
            Err(WorkflowViolation::Cycle(vec!["b".to_string(), "b".to_string()]))
        );

        let long = Workflow::new(vec![
            step("a", &["c"]),
            step("b", &["a"]),
            step("c", &["b"]),
            step("d", &[]),
        ]);
        match check(&long) {
            Err(WorkflowViolation::Cycle(path)) => {
                assert_eq!(path.first(), path.last());
                assert_eq!(path.len(), 4);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_initialize_resets_transient_state() {
        let mut wf = linear();
        apply_step_status(&mut wf, "analyze", StepStatus::Completed, Some(serde_json::json!(1)), None)
            .unwrap();
        wf.steps[0].assigned_agent = Some("agent-1".to_string());

        let fresh = initialize(&wf);
        assert!(fresh.steps.iter().all(|s| s.status == StepStatus::Pending));
        assert!(fresh.steps[0].output.is_none());
        assert!(fresh.steps[0].assigned_agent.is_none());
        assert!(fresh.steps[0].end_time.is_none());
        assert_eq!(fresh.steps[1].depends_on, vec!["analyze".to_string()]);
    }

    #[test]
    fn test_next_ready_steps_respects_dependencies_and_status() {
        let wf = Workflow::new(vec![
            step("a", &[]),
            step("b", &[]),
            step("c", &["a", "b"]),
        ]);
        let mut completed = BTreeSet::new();

        let ready: Vec<String> = next_ready_steps(&wf, &completed).into_iter().map(|s| s.id).collect();
        assert_eq!(ready, vec!["a", "b"]);

        completed.insert("a".to_string());
        let wf = set_step_status(&wf, "a", StepStatus::Completed, None, None).unwrap();
        let wf = set_step_status(&wf, "b", StepStatus::Assigned, None, None).unwrap();
        assert!(next_ready_steps(&wf, &completed).is_empty());

        completed.insert("b".to_string());
        let ready: Vec<String> = next_ready_steps(&wf, &completed).into_iter().map(|s| s.id).collect();
        assert_eq!(ready, vec!["c"]);
    }

    #[test]
    fn test_simulated_run_visits_every_step_once() {
        let mut wf = Workflow::new(vec![
            step("a", &[]),
            step("b", &["a"]),
            step("c", &["a"]),
            step("d", &["b", "c"]),
            step("e", &[]),
        ]);
        let mut completed = BTreeSet::new();
        let mut visits: HashMap<String, usize> = HashMap::new();

        while !is_complete(&wf) {
            let ready = next_ready_steps(&wf, &completed);
            assert!(!ready.is_empty(), "acyclic workflow must always make progress");
            for s in ready {
                *visits.entry(s.id.clone()).or_default() += 1;
                apply_step_status(&mut wf, &s.id, StepStatus::Completed, None, None).unwrap();
                completed.insert(s.id);
            }
        }

        assert_eq!(visits.len(), 5);
        assert!(visits.values().all(|&n| n == 1));
    }

    #[test]
    fn test_is_complete_counts_failed_and_skipped() {
        let wf = linear();
        assert!(!is_complete(&wf));
        let wf = set_step_status(&wf, "analyze", StepStatus::Completed, None, None).unwrap();
        let wf = set_step_status(&wf, "select", StepStatus::Failed, None, None).unwrap();
        assert!(!is_complete(&wf));
        let wf = set_step_status(&wf, "execute", StepStatus::Skipped, None, None).unwrap();
        assert!(is_complete(&wf));
    }

    #[test]
    fn test_set_step_status_stamps_times() {
        let wf = linear();
        let wf = set_step_status(&wf, "analyze", StepStatus::Running, None, None).unwrap();
        let started = wf.steps[0].start_time.expect("start time set");
        assert!(wf.steps[0].end_time.is_none());

        // Re-entering RUNNING keeps the original start time.
        let wf = set_step_status(&wf, "analyze", StepStatus::Running, None, None).unwrap();
        assert_eq!(wf.steps[0].start_time, Some(started));

        let wf = set_step_status(
            &wf,
            "analyze",
            StepStatus::Completed,
            Some(serde_json::json!({"x": 1})),
            None,
        )
        .unwrap();
        assert!(wf.steps[0].end_time.is_some());
        assert_eq!(wf.steps[0].output, Some(serde_json::json!({"x": 1})));
    }

    #[test]
    fn test_set_step_status_unknown_step_is_not_found() {
        let wf = linear();
        let err = set_step_status(&wf, "ghost", StepStatus::Running, None, None).unwrap_err();
        assert!(matches!(err, SchedulerError::NotFound(_)));
    }

    #[test]
    fn test_blocking_failures_follow_pending_and_skipped_chains() {
        let wf = Workflow::new(vec![
            step("c", &[]),
            step("b", &["c"]),
            step("z", &["b"]),
            step("ok", &[]),
        ]);
        let wf = set_step_status(&wf, "c", StepStatus::Failed, None, None).unwrap();
        let wf = set_step_status(&wf, "ok", StepStatus::Completed, None, None).unwrap();

        let blocked = blocking_failures(&wf);
        assert_eq!(blocked.len(), 2);
        assert!(blocked["b"].contains("c"));
        assert!(blocked["z"].contains("c"));
    }
}
