//! Workflow graph handling: definition files and the step state machine.
//!
//! # Architecture
//!
//! ```text
//! workflow.yaml ──► WorkflowDefinition ──► CreateTaskInput
//!                                              │
//!                          validator::check ◄──┘  (duplicates, dangling deps, cycles)
//!                                              │
//!                     validator::initialize ──► Workflow (all PENDING)
//!                                              │
//!      engine ──► next_ready_steps / apply_step_status / is_complete
//! ```

pub mod schema;
pub mod validator;

pub use schema::{StepDefinition, WorkflowDefinition};
pub use validator::{
    apply_step_status, blocking_failures, check, initialize, is_complete, next_ready_steps,
    set_step_status, validate, WorkflowViolation,
};
