//! Persistence seams.
//!
//! Every `TaskStore` method takes the owner's id and applies it as a predicate on the
//! rows it touches. There is no way to address a task by id alone, so a forgotten
//! ownership check cannot leak another user's data.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{NewUser, Page, Task, TaskFilter, TaskPatch, User};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint was violated (duplicate email or username).
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> AppError {
        match error {
            StoreError::Conflict(what) => AppError::Conflict(what),
            StoreError::Database(err) => err.into(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;
}

/// Owner-scoped task persistence.
///
/// Listings are ordered by `created_at` ascending, ties broken by `id`.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert_task(&self, task: &Task) -> StoreResult<Task>;
    async fn list_tasks(&self, owner: Uuid, filter: TaskFilter, page: Page)
        -> StoreResult<Vec<Task>>;
    async fn count_tasks(&self, owner: Uuid, filter: TaskFilter) -> StoreResult<i64>;
    async fn find_task(&self, owner: Uuid, id: Uuid) -> StoreResult<Option<Task>>;
    /// Applies the fields present in `patch` to the stored row in a single step, so
    /// concurrent patches to different fields never undo each other. `None` when the
    /// row is gone or not owned.
    async fn update_task(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: &TaskPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Task>>;
    /// Flips `completed` against the stored value, not a value read earlier.
    async fn toggle_task(
        &self,
        owner: Uuid,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Task>>;
    /// `true` when a row was removed.
    async fn delete_task(&self, owner: Uuid, id: Uuid) -> StoreResult<bool>;
}
