//! Decision engine — ranks eligible workers for a step.
//!
//! Each candidate starts from a base score and is adjusted multiplicatively:
//!
//! | Factor      | Adjustment                                              |
//! |-------------|---------------------------------------------------------|
//! | performance | `× (0.5 + successRate)`; successRate is 0.5 with no history |
//! | deadline    | `× deadline_penalty` if the time estimate overshoots    |
//! | budget      | `× budget_penalty` if the cost estimate overshoots      |
//!
//! Ties keep input order. History is a bounded per-worker ring buffer.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SchedulerConfig;
use crate::models::agent::Agent;
use crate::models::workflow::StepRequirements;

/// Success rate assumed for a worker with no recorded history (neutral factor 1.0).
const DEFAULT_SUCCESS_RATE: f64 = 0.5;

/// One finished step attempt by a worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub task_id: String,
    pub step_id: String,
    pub success: bool,
    pub execution_time_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// Aggregates derived from a worker's history window.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceStats {
    pub total_tasks: usize,
    pub successful_tasks: usize,
    pub failed_tasks: usize,
    pub average_execution_time_ms: f64,
    pub success_rate: f64,
}

/// Selection-time projection of a worker. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentCandidate {
    pub agent_id: String,
    pub base_score: f64,
    pub matched_capabilities: BTreeSet<String>,
    pub matched_networks: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_time_ms: Option<u64>,
}

impl AgentCandidate {
    pub fn new(agent_id: impl Into<String>, base_score: f64) -> Self {
        Self {
            agent_id: agent_id.into(),
            base_score,
            matched_capabilities: BTreeSet::new(),
            matched_networks: BTreeSet::new(),
            estimated_cost: None,
            estimated_time_ms: None,
        }
    }

    /// Project an eligible worker against a step's requirements.
    pub fn from_agent(agent: &Agent, requirements: &StepRequirements, base_score: f64) -> Self {
        let matched_networks = match &requirements.networks {
            Some(required) if !required.is_empty() => {
                required.intersection(&agent.networks).cloned().collect()
            }
            _ => agent.networks.clone(),
        };
        Self {
            agent_id: agent.id.clone(),
            base_score,
            matched_capabilities: requirements
                .capabilities
                .intersection(&agent.capabilities)
                .cloned()
                .collect(),
            matched_networks,
            estimated_cost: agent.cost_estimate,
            estimated_time_ms: agent.time_estimate_ms,
        }
    }
}

/// What the engine knows about the step being placed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionContext {
    pub task_id: String,
    pub step_id: String,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub remaining_budget: Option<f64>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScoredCandidate {
    pub agent_id: String,
    pub score: f64,
}

/// Scores candidates and keeps per-worker outcome history.
pub struct DecisionEngine {
    history_capacity: usize,
    deadline_penalty: f64,
    budget_penalty: f64,
    history: RwLock<HashMap<String, VecDeque<ExecutionRecord>>>,
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new(&SchedulerConfig::default())
    }
}

impl DecisionEngine {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            history_capacity: config.history_capacity.max(1),
            deadline_penalty: config.deadline_penalty,
            budget_penalty: config.budget_penalty,
            history: RwLock::new(HashMap::new()),
        }
    }

    /// Best candidate, or `None` only when `candidates` is empty.
    pub fn rank(&self, context: &DecisionContext, candidates: &[AgentCandidate]) -> Option<String> {
        self.score(context, candidates)
            .into_iter()
            .next()
            .map(|c| c.agent_id)
    }

    /// All candidates with adjusted scores, best first (stable on ties).
    pub fn score(&self, context: &DecisionContext, candidates: &[AgentCandidate]) -> Vec<ScoredCandidate> {
        let remaining_ms = context
            .deadline
            .map(|d| (d - context.now).num_milliseconds());

        let mut scored: Vec<ScoredCandidate> = candidates
            .iter()
            .map(|c| {
                let mut score = c.base_score * (0.5 + self.success_rate(&c.agent_id));

                if let (Some(remaining), Some(estimate)) = (remaining_ms, c.estimated_time_ms) {
                    if i64::try_from(estimate).unwrap_or(i64::MAX) > remaining {
                        score *= self.deadline_penalty;
                    }
                }
                if let (Some(budget), Some(cost)) = (context.remaining_budget, c.estimated_cost) {
                    if cost > budget {
                        score *= self.budget_penalty;
                    }
                }

                ScoredCandidate {
                    agent_id: c.agent_id.clone(),
                    score,
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        tracing::debug!(
            "[Decision] Task {} step {}: {:?}",
            context.task_id,
            context.step_id,
            scored
        );
        scored
    }

    pub fn record_outcome(
        &self,
        agent_id: &str,
        task_id: &str,
        step_id: &str,
        success: bool,
        execution_time_ms: u64,
    ) {
        let mut history = self.write_history();
        let window = history.entry(agent_id.to_string()).or_default();
        if window.len() >= self.history_capacity {
            window.pop_front();
        }
        window.push_back(ExecutionRecord {
            task_id: task_id.to_string(),
            step_id: step_id.to_string(),
            success,
            execution_time_ms,
            timestamp: Utc::now(),
        });
    }

    /// All zeros when the worker has no history.
    pub fn stats(&self, agent_id: &str) -> PerformanceStats {
        let history = self.read_history();
        let Some(window) = history.get(agent_id).filter(|w| !w.is_empty()) else {
            return PerformanceStats::default();
        };

        let total = window.len();
        let successful = window.iter().filter(|r| r.success).count();
        let total_time: u64 = window.iter().map(|r| r.execution_time_ms).sum();

        PerformanceStats {
            total_tasks: total,
            successful_tasks: successful,
            failed_tasks: total - successful,
            average_execution_time_ms: total_time as f64 / total as f64,
            success_rate: successful as f64 / total as f64,
        }
    }

    /// Mean recorded execution time, used when a worker quotes no estimate.
    pub fn average_execution_time_ms(&self, agent_id: &str) -> Option<u64> {
        let stats = self.stats(agent_id);
        (stats.total_tasks > 0).then(|| stats.average_execution_time_ms.round() as u64)
    }

    pub fn history(&self, agent_id: &str) -> Vec<ExecutionRecord> {
        self.read_history()
            .get(agent_id)
            .map(|w| w.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn success_rate(&self, agent_id: &str) -> f64 {
        let stats = self.stats(agent_id);
        if stats.total_tasks == 0 {
            DEFAULT_SUCCESS_RATE
        } else {
            stats.success_rate
        }
    }

    fn read_history(&self) -> RwLockReadGuard<'_, HashMap<String, VecDeque<ExecutionRecord>>> {
        self.history.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_history(&self) -> RwLockWriteGuard<'_, HashMap<String, VecDeque<ExecutionRecord>>> {
        self.history.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn context() -> DecisionContext {
        DecisionContext {
            task_id: "t1".to_string(),
            step_id: "s1".to_string(),
            deadline: None,
            remaining_budget: None,
            now: Utc::now(),
        }
    }

    #[test]
    fn test_empty_candidates_rank_none() {
        let engine = DecisionEngine::default();
        assert_eq!(engine.rank(&context(), &[]), None);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let engine = DecisionEngine::default();
        let candidates = vec![AgentCandidate::new("a", 1.0), AgentCandidate::new("b", 1.0)];
        assert_eq!(engine.rank(&context(), &candidates), Some("a".to_string()));
    }

    #[test]
    fn test_higher_success_rate_ranks_first() {
        let engine = DecisionEngine::default();
        engine.record_outcome("a", "t0", "s0", false, 10);
        engine.record_outcome("b", "t0", "s0", true, 10);

        let candidates = vec![AgentCandidate::new("a", 1.0), AgentCandidate::new("b", 1.0)];
        let scored = engine.score(&context(), &candidates);
        assert_eq!(scored[0].agent_id, "b");
        assert!((scored[0].score - 1.5).abs() < 1e-9);
        assert!((scored[1].score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_over_budget_ranks_below_within_budget() {
        let engine = DecisionEngine::default();
        let mut ctx = context();
        ctx.remaining_budget = Some(5.0);

        let mut expensive = AgentCandidate::new("expensive", 1.0);
        expensive.estimated_cost = Some(8.0);
        let mut cheap = AgentCandidate::new("cheap", 1.0);
        cheap.estimated_cost = Some(4.0);

        assert_eq!(
            engine.rank(&ctx, &[expensive, cheap]),
            Some("cheap".to_string())
        );
    }

    #[test]
    fn test_deadline_penalty() {
        let engine = DecisionEngine::default();
        let mut ctx = context();
        ctx.deadline = Some(ctx.now + Duration::seconds(1));

        let mut slow = AgentCandidate::new("slow", 1.0);
        slow.estimated_time_ms = Some(5_000);
        let mut fast = AgentCandidate::new("fast", 1.0);
        fast.estimated_time_ms = Some(500);

        let scored = engine.score(&ctx, &[slow, fast]);
        assert_eq!(scored[0].agent_id, "fast");
        assert!((scored[1].score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_history_is_bounded() {
        let config = SchedulerConfig {
            history_capacity: 3,
            ..SchedulerConfig::default()
        };
        let engine = DecisionEngine::new(&config);
        engine.record_outcome("a", "t", "s1", false, 100);
        for i in 0..3 {
            engine.record_outcome("a", "t", &format!("s{}", i + 2), true, 10);
        }

        let history = engine.history("a");
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].step_id, "s2");

        let stats = engine.stats("a");
        assert_eq!(stats.total_tasks, 3);
        assert_eq!(stats.failed_tasks, 0);
        assert_eq!(stats.success_rate, 1.0);
        assert_eq!(stats.average_execution_time_ms, 10.0);
    }

    #[test]
    fn test_stats_default_without_history() {
        let engine = DecisionEngine::default();
        assert_eq!(engine.stats("nobody"), PerformanceStats::default());
        assert_eq!(engine.average_execution_time_ms("nobody"), None);
    }
}
