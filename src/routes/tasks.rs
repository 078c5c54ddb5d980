use crate::{
    auth::AuthenticatedUser,
    error::AppError,
    models::{TaskInput, TaskList, TaskPatch, TaskQuery},
    tasks::TaskService,
};
use actix_web::{delete, get, patch, post, route, web, HttpResponse, Responder};
use uuid::Uuid;

/// Lists the caller's tasks, oldest first.
///
/// ## Query Parameters:
/// - `completed` (optional): only tasks with this completion state.
/// - `limit` (optional): page size, default 50, at most 100.
/// - `offset` (optional): rows to skip, default 0.
///
/// ## Responses:
/// - `200 OK`: a `TaskList`; `total` counts every match, not just the page.
/// - `401 Unauthorized`: missing or invalid token.
#[get("")]
pub async fn list_tasks(
    tasks: web::Data<TaskService>,
    user: AuthenticatedUser,
    query: web::Query<TaskQuery>,
) -> Result<impl Responder, AppError> {
    let owned = tasks.for_owner(&user.0);
    let filter = query.filter();
    let page = query.page();

    let items = owned.list(filter, page).await?;
    let total = owned.count(filter).await?;

    Ok(HttpResponse::Ok().json(TaskList {
        tasks: items,
        total,
        limit: page.limit,
        offset: page.offset,
    }))
}

/// Creates a task owned by the caller. New tasks are never completed.
///
/// ## Responses:
/// - `201 Created`: the stored `Task`.
/// - `422 Unprocessable Entity`: blank or oversized title, oversized description or category.
#[post("")]
pub async fn create_task(
    tasks: web::Data<TaskService>,
    user: AuthenticatedUser,
    task_data: web::Json<TaskInput>,
) -> Result<impl Responder, AppError> {
    let task = tasks
        .for_owner(&user.0)
        .create(task_data.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(task))
}

/// Totals for the caller's tasks.
#[get("/stats")]
pub async fn task_stats(
    tasks: web::Data<TaskService>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let stats = tasks.for_owner(&user.0).stats().await?;
    Ok(HttpResponse::Ok().json(stats))
}

/// Retrieves one task. `404` when absent or owned by someone else.
#[get("/{id}")]
pub async fn get_task(
    tasks: web::Data<TaskService>,
    user: AuthenticatedUser,
    task_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let task = tasks.for_owner(&user.0).get(task_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(task))
}

/// Partially updates a task.
///
/// Only the fields present in the body change. A field sent as `null` clears it
/// (description, due date, category, position); a missing field is left alone.
/// An empty body only refreshes `updated_at`.
///
/// ## Responses:
/// - `200 OK`: the updated `Task`.
/// - `404 Not Found`: absent or owned by someone else.
/// - `422 Unprocessable Entity`: a present field fails validation.
#[route("/{id}", method = "PUT", method = "PATCH")]
pub async fn update_task(
    tasks: web::Data<TaskService>,
    user: AuthenticatedUser,
    task_id: web::Path<Uuid>,
    task_data: web::Json<TaskPatch>,
) -> Result<impl Responder, AppError> {
    let task = tasks
        .for_owner(&user.0)
        .update(task_id.into_inner(), task_data.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(task))
}

/// Flips `completed`.
#[patch("/{id}/toggle")]
pub async fn toggle_task(
    tasks: web::Data<TaskService>,
    user: AuthenticatedUser,
    task_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let task = tasks
        .for_owner(&user.0)
        .toggle(task_id.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(task))
}

/// Deletes a task for good.
///
/// ## Responses:
/// - `204 No Content`: deleted.
/// - `404 Not Found`: absent or owned by someone else.
#[delete("/{id}")]
pub async fn delete_task(
    tasks: web::Data<TaskService>,
    user: AuthenticatedUser,
    task_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    if !tasks.for_owner(&user.0).delete(task_id.into_inner()).await? {
        return Err(AppError::NotFound("Task not found".into()));
    }
    Ok(HttpResponse::NoContent().finish())
}
