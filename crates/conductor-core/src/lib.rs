//! Conductor Core — transport-agnostic workflow scheduling engine.
//!
//! Coordinates multi-step workflows across a pool of independently addressed
//! workers. Each step declares capability/network requirements and the steps
//! it depends on; the engine validates the step graph, dispatches ready steps
//! to the best eligible worker and advances the task as results come back.
//!
//! - `workflow` — DAG validation and the step state machine
//! - `selector` — eligibility predicates over the worker directory
//! - `decision` — multi-factor worker ranking with outcome history
//! - `orchestration` — task lifecycle and the re-entrant dispatch loop
//! - `rpc` — JSON-RPC 2.0 router over all of the above

pub mod config;
pub mod decision;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod models;
pub mod orchestration;
pub mod rpc;
pub mod selector;
pub mod state;
pub mod store;
pub mod workflow;

// Convenience re-exports
pub use config::SchedulerConfig;
pub use error::{ErrorKind, SchedulerError};
pub use orchestration::{StepResultAck, TaskEngine};
pub use state::{AppState, AppStateInner};
