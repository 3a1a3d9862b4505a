use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::error::SchedulerError;
use crate::models::task::{Task, TaskExecution, TaskStatus};

/// A task and its scheduler scratchpad, always locked together.
#[derive(Debug)]
pub(crate) struct TaskEntry {
    pub(crate) task: Task,
    pub(crate) execution: Option<TaskExecution>,
}

#[derive(Default)]
struct TaskStoreInner {
    entries: HashMap<String, Arc<Mutex<TaskEntry>>>,
    /// Creation order; listings answer in this order.
    order: Vec<String>,
}

/// In-memory task set with one exclusive lock per task id.
///
/// The outer map lock is held only long enough to find an entry; all reads and
/// writes of a task's state go through that task's own mutex, so different
/// tasks never contend with each other.
#[derive(Clone, Default)]
pub struct TaskStore {
    inner: Arc<RwLock<TaskStoreInner>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn insert(&self, task: Task) -> Result<(), SchedulerError> {
        let mut inner = self.inner.write().await;
        if inner.entries.contains_key(&task.id) {
            return Err(SchedulerError::Internal(format!(
                "Task {} already exists",
                task.id
            )));
        }
        inner.order.push(task.id.clone());
        inner.entries.insert(
            task.id.clone(),
            Arc::new(Mutex::new(TaskEntry {
                task,
                execution: None,
            })),
        );
        Ok(())
    }

    /// Lock handle for one task. Callers hold it for a whole read-modify-write.
    pub(crate) async fn entry(&self, task_id: &str) -> Result<Arc<Mutex<TaskEntry>>, SchedulerError> {
        self.inner
            .read()
            .await
            .entries
            .get(task_id)
            .cloned()
            .ok_or_else(|| SchedulerError::NotFound(format!("Task {} not found", task_id)))
    }

    pub async fn get(&self, task_id: &str) -> Result<Task, SchedulerError> {
        let entry = self.entry(task_id).await?;
        let guard = entry.lock().await;
        Ok(guard.task.clone())
    }

    /// `None` until the task has been started.
    pub async fn get_execution(&self, task_id: &str) -> Result<Option<TaskExecution>, SchedulerError> {
        let entry = self.entry(task_id).await?;
        let guard = entry.lock().await;
        Ok(guard.execution.clone())
    }

    pub async fn list(&self, creator: Option<&str>, status: Option<TaskStatus>) -> Vec<Task> {
        let handles: Vec<Arc<Mutex<TaskEntry>>> = {
            let inner = self.inner.read().await;
            inner
                .order
                .iter()
                .filter_map(|id| inner.entries.get(id).cloned())
                .collect()
        };

        let mut tasks = Vec::with_capacity(handles.len());
        for handle in handles {
            let guard = handle.lock().await;
            let task = &guard.task;
            if creator.is_some_and(|c| c != task.creator) {
                continue;
            }
            if status.is_some_and(|s| s != task.status) {
                continue;
            }
            tasks.push(task.clone());
        }
        tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::CreateTaskInput;
    use crate::models::workflow::Workflow;

    fn task(id: &str, creator: &str) -> Task {
        Task::new(
            id.to_string(),
            CreateTaskInput {
                name: id.to_string(),
                description: None,
                creator: creator.to_string(),
                workflow: Workflow::default(),
                budget: None,
                deadline: None,
            },
        )
    }

    #[tokio::test]
    async fn test_insert_get_and_filter() {
        let store = TaskStore::new();
        store.insert(task("t1", "alice")).await.unwrap();
        store.insert(task("t2", "bob")).await.unwrap();
        store.insert(task("t3", "alice")).await.unwrap();

        assert_eq!(store.get("t2").await.unwrap().creator, "bob");
        assert!(store.get_execution("t2").await.unwrap().is_none());
        assert!(matches!(
            store.get("nope").await,
            Err(SchedulerError::NotFound(_))
        ));

        let alice: Vec<String> = store
            .list(Some("alice"), None)
            .await
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(alice, vec!["t1", "t3"]);
        assert!(store.list(None, Some(TaskStatus::Running)).await.is_empty());
        assert_eq!(store.list(None, Some(TaskStatus::Created)).await.len(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let store = TaskStore::new();
        store.insert(task("t1", "alice")).await.unwrap();
        assert!(store.insert(task("t1", "alice")).await.is_err());
    }
}
