//! Step dispatch seam.
//!
//! The engine hands each assigned step to a [`StepDispatcher`] and forgets
//! about it; the worker later reports back through
//! `TaskEngine::submit_step_result`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::SchedulerError;
use crate::models::workflow::StepRequirements;

/// One step handed to one worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepDispatch {
    pub task_id: String,
    pub step_id: String,
    pub agent_id: String,
    pub input: serde_json::Value,
    pub requirements: StepRequirements,
}

#[async_trait]
pub trait StepDispatcher: Send + Sync {
    /// Fire-and-forget hand-off. An error fails the step with its message.
    async fn dispatch(&self, dispatch: StepDispatch) -> Result<(), SchedulerError>;
}

/// Forwards dispatches to whoever holds the receiving half.
#[derive(Clone)]
pub struct ChannelDispatcher {
    tx: mpsc::UnboundedSender<StepDispatch>,
}

impl ChannelDispatcher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StepDispatch>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl StepDispatcher for ChannelDispatcher {
    async fn dispatch(&self, dispatch: StepDispatch) -> Result<(), SchedulerError> {
        let step_id = dispatch.step_id.clone();
        self.tx.send(dispatch).map_err(|_| {
            SchedulerError::Dispatch(format!(
                "Worker channel closed before step {} could be delivered",
                step_id
            ))
        })
    }
}

/// Accepts and drops every dispatch. Useful when results are submitted by hand.
pub struct NoopDispatcher;

#[async_trait]
impl StepDispatcher for NoopDispatcher {
    async fn dispatch(&self, dispatch: StepDispatch) -> Result<(), SchedulerError> {
        tracing::debug!(
            "[Dispatch] Dropping step {} of task {}",
            dispatch.step_id,
            dispatch.task_id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StepDispatch {
        StepDispatch {
            task_id: "t1".to_string(),
            step_id: "s1".to_string(),
            agent_id: "w1".to_string(),
            input: serde_json::json!({"amount": 3}),
            requirements: StepRequirements::new(["swap"]),
        }
    }

    #[tokio::test]
    async fn test_channel_delivers() {
        let (dispatcher, mut rx) = ChannelDispatcher::new();
        dispatcher.dispatch(sample()).await.unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received, sample());
    }

    #[tokio::test]
    async fn test_closed_channel_is_dispatch_error() {
        let (dispatcher, rx) = ChannelDispatcher::new();
        drop(rx);
        let err = dispatcher.dispatch(sample()).await.unwrap_err();
        assert!(matches!(err, SchedulerError::Dispatch(_)));
    }
}
