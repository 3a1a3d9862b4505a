pub mod agent_store;
pub mod task_store;

pub use agent_store::AgentStore;
pub use task_store::TaskStore;
