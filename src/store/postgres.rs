use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{StoreError, StoreResult, TaskStore, UserStore};
use crate::models::{NewUser, Page, Task, TaskFilter, TaskPatch, User};

const USER_COLUMNS: &str = "id, email, username, password_hash, first_name, last_name, \
     is_active, created_at, updated_at, last_login_at";

const TASK_COLUMNS: &str = "id, user_id, title, description, completed, priority, due_date, \
     category, position, created_at, updated_at, completed_at";

/// Postgres-backed store. Schema lives in `migrations/`.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// Maps a unique violation (SQLSTATE 23505) to `StoreError::Conflict`.
fn map_unique_violation(error: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &error {
        if db_err.code().as_deref() == Some("23505") {
            let constraint = db_err.constraint().unwrap_or("unique").to_string();
            return StoreError::Conflict(constraint);
        }
    }
    StoreError::Database(error)
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let sql = format!(
            "INSERT INTO users (id, email, username, password_hash, first_name, last_name) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.email)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .fetch_one(&self.pool)
            .await
            .map_err(map_unique_violation)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE users SET last_login_at = $1, updated_at = $1 WHERE id = $2")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn insert_task(&self, task: &Task) -> StoreResult<Task> {
        let sql = format!(
            "INSERT INTO tasks (id, user_id, title, description, completed, priority, due_date, \
             category, position, created_at, updated_at, completed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING {}",
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(task.id)
            .bind(task.user_id)
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.completed)
            .bind(task.priority)
            .bind(task.due_date)
            .bind(&task.category)
            .bind(task.position)
            .bind(task.created_at)
            .bind(task.updated_at)
            .bind(task.completed_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(task)
    }

    async fn list_tasks(
        &self,
        owner: Uuid,
        filter: TaskFilter,
        page: Page,
    ) -> StoreResult<Vec<Task>> {
        // `$2` is NULL when no completion filter is requested.
        let sql = format!(
            "SELECT {} FROM tasks \
             WHERE user_id = $1 AND ($2::BOOLEAN IS NULL OR completed = $2) \
             ORDER BY created_at ASC, id ASC \
             LIMIT $3 OFFSET $4",
            TASK_COLUMNS
        );
        let tasks = sqlx::query_as::<_, Task>(&sql)
            .bind(owner)
            .bind(filter.completed)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(tasks)
    }

    async fn count_tasks(&self, owner: Uuid, filter: TaskFilter) -> StoreResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM tasks \
             WHERE user_id = $1 AND ($2::BOOLEAN IS NULL OR completed = $2)",
        )
        .bind(owner)
        .bind(filter.completed)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn find_task(&self, owner: Uuid, id: Uuid) -> StoreResult<Option<Task>> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE id = $1 AND user_id = $2",
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    async fn update_task(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: &TaskPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Task>> {
        // One statement: every right-hand side sees the row as it was when the row
        // lock was taken. Nullable columns carry a "present" flag next to the value
        // so an explicit clear is distinct from "leave alone".
        let sql = format!(
            "UPDATE tasks SET \
                 title = COALESCE($3, title), \
                 description = CASE WHEN $4 THEN $5 ELSE description END, \
                 priority = COALESCE($6, priority), \
                 due_date = CASE WHEN $7 THEN $8 ELSE due_date END, \
                 category = CASE WHEN $9 THEN $10 ELSE category END, \
                 position = CASE WHEN $11 THEN $12 ELSE position END, \
                 completed_at = CASE \
                     WHEN $13::BOOLEAN IS NULL THEN completed_at \
                     WHEN $13 AND NOT completed THEN $14 \
                     WHEN $13 THEN completed_at \
                     ELSE NULL END, \
                 completed = COALESCE($13, completed), \
                 updated_at = $14 \
             WHERE user_id = $1 AND id = $2 \
             RETURNING {}",
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(owner)
            .bind(id)
            .bind(patch.title.clone().flatten())
            .bind(patch.description.is_some())
            .bind(patch.description.clone().flatten())
            .bind(patch.priority)
            .bind(patch.due_date.is_some())
            .bind(patch.due_date.flatten())
            .bind(patch.category.is_some())
            .bind(patch.category.clone().flatten())
            .bind(patch.position.is_some())
            .bind(patch.position.flatten())
            .bind(patch.completed)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    async fn toggle_task(
        &self,
        owner: Uuid,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Task>> {
        let sql = format!(
            "UPDATE tasks SET \
                 completed = NOT completed, \
                 completed_at = CASE WHEN completed THEN NULL ELSE $3 END, \
                 updated_at = $3 \
             WHERE user_id = $1 AND id = $2 \
             RETURNING {}",
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(owner)
            .bind(id)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    async fn delete_task(&self, owner: Uuid, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
