//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command and reuses
//! the conductor-core domain logic through `AppState`.

pub mod rpc;
pub mod serve;
pub mod workflow;

use std::sync::Arc;

use conductor_core::dispatch::StepDispatcher;
use conductor_core::state::{AppState, AppStateInner};
use conductor_core::SchedulerConfig;

/// Fresh in-memory state configured from `CONDUCTOR_*` variables.
pub fn init_state(dispatcher: Arc<dyn StepDispatcher>) -> AppState {
    Arc::new(AppStateInner::new(SchedulerConfig::from_env(), dispatcher))
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}
