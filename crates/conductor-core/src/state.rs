//! Shared application state for the RPC router and the CLI.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::SchedulerConfig;
use crate::dispatch::{ChannelDispatcher, StepDispatch, StepDispatcher};
use crate::orchestration::TaskEngine;
use crate::store::AgentStore;

/// Shared state accessible by all RPC handlers.
pub struct AppStateInner {
    pub agent_store: AgentStore,
    pub engine: TaskEngine,
    pub config: SchedulerConfig,
}

pub type AppState = Arc<AppStateInner>;

impl AppStateInner {
    /// The engine reads workers from `agent_store` and hands steps to `dispatcher`.
    pub fn new(config: SchedulerConfig, dispatcher: Arc<dyn StepDispatcher>) -> Self {
        let agent_store = AgentStore::new();
        let engine = TaskEngine::new(Arc::new(agent_store.clone()), dispatcher, config.clone());
        Self {
            agent_store,
            engine,
            config,
        }
    }

    /// State whose dispatches arrive on the returned receiver.
    pub fn with_channel(config: SchedulerConfig) -> (Self, mpsc::UnboundedReceiver<StepDispatch>) {
        let (dispatcher, rx) = ChannelDispatcher::new();
        (Self::new(config, Arc::new(dispatcher)), rx)
    }
}
