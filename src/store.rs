//! Task, context, and blocker types, and the trait the ReAct loop uses to
//! reach the persistence layer it does not own.
//!
//! The core only ever calls three shapes against this store — `get`,
//! `list_for_task`, `create` — so it never depends on a particular
//! database. A real binary wires a concrete store (SQL, document, in-memory)
//! behind this trait; this crate ships an in-memory one for tests.

use crate::errors::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Ready,
    InProgress,
    Blocked,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub workspace_id: String,
    pub prd_id: Option<String>,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: i32,
    /// 1 (trivial) through 5 (hardest).
    pub complexity: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockerStatus {
    Open,
    Answered,
    Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blocker {
    pub id: String,
    pub task_id: String,
    pub question: String,
    pub answer: Option<String>,
    pub status: BlockerStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The minimal contract the ReAct loop needs against task/blocker storage.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn get(&self, task_id: &str) -> Result<Task, StoreError>;
    async fn list_for_task(&self, task_id: &str) -> Result<Vec<Blocker>, StoreError>;
    async fn create(
        &self,
        workspace_id: &str,
        question: &str,
        task_id: Option<&str>,
    ) -> Result<Blocker, StoreError>;
}

/// In-process store backed by a mutex-guarded map, for tests and small
/// single-process deployments.
pub struct InMemoryTaskStore {
    tasks: Mutex<HashMap<String, Task>>,
    blockers: Mutex<HashMap<String, Vec<Blocker>>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self { tasks: Mutex::new(HashMap::new()), blockers: Mutex::new(HashMap::new()) }
    }

    pub fn insert_task(&self, task: Task) {
        self.tasks.lock().unwrap().insert(task.id.clone(), task);
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn get(&self, task_id: &str) -> Result<Task, StoreError> {
        self.tasks
            .lock()
            .unwrap()
            .get(task_id)
            .cloned()
            .ok_or_else(|| StoreError::TaskNotFound(task_id.to_string()))
    }

    async fn list_for_task(&self, task_id: &str) -> Result<Vec<Blocker>, StoreError> {
        Ok(self.blockers.lock().unwrap().get(task_id).cloned().unwrap_or_default())
    }

    async fn create(
        &self,
        _workspace_id: &str,
        question: &str,
        task_id: Option<&str>,
    ) -> Result<Blocker, StoreError> {
        let task_id = task_id
            .ok_or_else(|| StoreError::Backend("create requires a task_id".to_string()))?
            .to_string();
        let now = Utc::now();
        let blocker = Blocker {
            id: uuid::Uuid::new_v4().to_string(),
            task_id: task_id.clone(),
            question: question.to_string(),
            answer: None,
            status: BlockerStatus::Open,
            created_at: now,
            updated_at: now,
        };
        self.blockers.lock().unwrap().entry(task_id).or_default().push(blocker.clone());
        Ok(blocker)
    }
}
