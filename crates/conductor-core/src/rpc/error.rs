//! RPC error type that bridges `SchedulerError` to JSON-RPC errors.

use super::types;
use crate::error::{ErrorKind, SchedulerError};

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),
}

impl RpcError {
    pub fn code(&self) -> i64 {
        match self {
            RpcError::NotFound(_) => types::NOT_FOUND,
            RpcError::Validation(_) => types::VALIDATION_ERROR,
            RpcError::InvalidState(_) => types::INVALID_STATE,
            RpcError::Internal(_) => types::INTERNAL_ERROR,
            RpcError::InvalidParams(_) => types::INVALID_PARAMS,
            RpcError::InvalidRequest(_) => types::INVALID_REQUEST,
            RpcError::MethodNotFound(_) => types::METHOD_NOT_FOUND,
        }
    }

    pub fn to_response(&self, id: Option<serde_json::Value>) -> types::JsonRpcResponse {
        types::JsonRpcResponse::error(id, self.code(), self.to_string())
    }
}

impl From<SchedulerError> for RpcError {
    fn from(err: SchedulerError) -> Self {
        let message = err.message().to_string();
        match err.kind() {
            ErrorKind::NotFound => RpcError::NotFound(message),
            ErrorKind::Validation => RpcError::Validation(message),
            ErrorKind::State => RpcError::InvalidState(message),
            ErrorKind::Dispatch | ErrorKind::Internal => RpcError::Internal(message),
        }
    }
}
