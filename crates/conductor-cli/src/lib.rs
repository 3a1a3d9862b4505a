//! Conductor CLI — validate and run multi-step workflows from the command line.
//!
//! Reuses the same core domain logic (conductor-core) that the stdio JSON-RPC
//! server exposes.

pub mod commands;
