//! Scheduler configuration.

use std::str::FromStr;

/// Tunables for scoring and event buffering.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Executions remembered per worker (oldest dropped first).
    pub history_capacity: usize,
    /// Starting score for every eligible candidate.
    pub base_score: f64,
    /// Multiplier applied when a candidate cannot finish before the deadline.
    pub deadline_penalty: f64,
    /// Multiplier applied when a candidate's quote exceeds the remaining budget.
    pub budget_penalty: f64,
    /// Buffered task events per subscriber.
    pub event_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            history_capacity: 100,
            base_score: 1.0,
            deadline_penalty: 0.5,
            budget_penalty: 0.5,
            event_capacity: 256,
        }
    }
}

impl SchedulerConfig {
    /// Defaults overridden by `CONDUCTOR_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            history_capacity: parse_or(
                &lookup,
                "CONDUCTOR_HISTORY_CAPACITY",
                defaults.history_capacity,
            )
            .max(1),
            base_score: parse_or(&lookup, "CONDUCTOR_BASE_SCORE", defaults.base_score),
            deadline_penalty: parse_or(
                &lookup,
                "CONDUCTOR_DEADLINE_PENALTY",
                defaults.deadline_penalty,
            ),
            budget_penalty: parse_or(&lookup, "CONDUCTOR_BUDGET_PENALTY", defaults.budget_penalty),
            event_capacity: parse_or(&lookup, "CONDUCTOR_EVENT_CAPACITY", defaults.event_capacity)
                .max(1),
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("[Config] Ignoring unparsable {}={:?}", key, raw);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_overrides_and_fallbacks() {
        let env: HashMap<&str, &str> = [
            ("CONDUCTOR_HISTORY_CAPACITY", "10"),
            ("CONDUCTOR_BUDGET_PENALTY", "0.25"),
            ("CONDUCTOR_BASE_SCORE", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let config = SchedulerConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.history_capacity, 10);
        assert_eq!(config.budget_penalty, 0.25);
        assert_eq!(config.base_score, 1.0);
        assert_eq!(config.deadline_penalty, 0.5);
    }

    #[test]
    fn test_capacity_never_zero() {
        let config = SchedulerConfig::from_lookup(|k| {
            (k == "CONDUCTOR_HISTORY_CAPACITY").then(|| "0".to_string())
        });
        assert_eq!(config.history_capacity, 1);
    }
}
