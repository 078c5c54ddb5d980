//! Task operations, always on behalf of a resolved caller.
//!
//! [`TaskService::for_owner`] is the only way in: it binds a [`UserIdentity`] to the
//! store, and every call made through the returned [`OwnedTasks`] carries that owner
//! down to the query. Tasks owned by someone else behave exactly like tasks that do
//! not exist.

use std::sync::Arc;

use chrono::Utc;
use log::debug;
use thiserror::Error;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::auth::UserIdentity;
use crate::error::AppError;
use crate::models::{Page, Task, TaskFilter, TaskInput, TaskPatch, TaskStats};
use crate::store::{StoreError, TaskStore};

#[derive(Debug, Error)]
pub enum TaskError {
    /// Absent, or owned by someone else. The two are never told apart.
    #[error("Task not found")]
    NotFound,
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<TaskError> for AppError {
    fn from(error: TaskError) -> AppError {
        match error {
            TaskError::NotFound => AppError::NotFound(error.to_string()),
            TaskError::Validation(errors) => errors.into(),
            TaskError::Store(err) => err.into(),
        }
    }
}

pub type TaskResult<T> = Result<T, TaskError>;

#[derive(Clone)]
pub struct TaskService {
    store: Arc<dyn TaskStore>,
}

impl TaskService {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    pub fn for_owner(&self, owner: &UserIdentity) -> OwnedTasks<'_> {
        OwnedTasks {
            owner: owner.user_id,
            store: self.store.as_ref(),
        }
    }
}

/// The task store seen through one owner's eyes.
pub struct OwnedTasks<'a> {
    owner: Uuid,
    store: &'a dyn TaskStore,
}

impl OwnedTasks<'_> {
    pub fn owner(&self) -> Uuid {
        self.owner
    }

    pub async fn create(&self, input: TaskInput) -> TaskResult<Task> {
        input.validate()?;
        let task = Task::new(input, self.owner, Utc::now());
        let task = self.store.insert_task(&task).await?;
        debug!("user {} created task {}", self.owner, task.id);
        Ok(task)
    }

    pub async fn list(&self, filter: TaskFilter, page: Page) -> TaskResult<Vec<Task>> {
        Ok(self.store.list_tasks(self.owner, filter, page).await?)
    }

    pub async fn count(&self, filter: TaskFilter) -> TaskResult<i64> {
        Ok(self.store.count_tasks(self.owner, filter).await?)
    }

    pub async fn get(&self, id: Uuid) -> TaskResult<Task> {
        self.store
            .find_task(self.owner, id)
            .await?
            .ok_or(TaskError::NotFound)
    }

    /// Applies only the fields present in `patch`; `updated_at` is always refreshed.
    /// The mask is applied by the store in one step, so concurrent patches to
    /// different fields both land.
    pub async fn update(&self, id: Uuid, patch: TaskPatch) -> TaskResult<Task> {
        patch.validate()?;
        self.store
            .update_task(self.owner, id, &patch, Utc::now())
            .await?
            .ok_or(TaskError::NotFound)
    }

    /// Flips the completion flag as stored at the moment of the write.
    pub async fn toggle(&self, id: Uuid) -> TaskResult<Task> {
        self.store
            .toggle_task(self.owner, id, Utc::now())
            .await?
            .ok_or(TaskError::NotFound)
    }

    /// Hard delete. `false` when nothing owned by the caller had that id.
    pub async fn delete(&self, id: Uuid) -> TaskResult<bool> {
        let removed = self.store.delete_task(self.owner, id).await?;
        if removed {
            debug!("user {} deleted task {}", self.owner, id);
        }
        Ok(removed)
    }

    pub async fn stats(&self) -> TaskResult<TaskStats> {
        let total = self.count(TaskFilter::default()).await?;
        let completed = self
            .count(TaskFilter {
                completed: Some(true),
            })
            .await?;
        Ok(TaskStats {
            total,
            completed,
            pending: total - completed,
        })
    }
}
