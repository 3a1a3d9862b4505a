//! JSON-RPC method implementations, organized by domain.
//!
//! Each sub-module exposes typed param/result structs and async handlers that
//! take `AppState` + params.

pub mod agents;
pub mod steps;
pub mod tasks;
pub mod workflows;
