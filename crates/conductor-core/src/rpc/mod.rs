//! Transport-agnostic JSON-RPC 2.0 layer over the scheduling engine.
//!
//! The router is free of any transport so the same method table serves the
//! stdio server, one-shot CLI calls and tests.
//!
//! # Example
//!
//! ```ignore
//! use conductor_core::rpc::RpcRouter;
//!
//! let router = RpcRouter::new(app_state);
//! let response = router.handle_request(r#"{
//!     "jsonrpc": "2.0",
//!     "id": 1,
//!     "method": "tasks.get",
//!     "params": { "id": "..." }
//! }"#).await;
//! ```

pub mod error;
pub mod methods;
pub mod router;
pub mod types;

pub use error::RpcError;
pub use router::RpcRouter;
pub use types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
