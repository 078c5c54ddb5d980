pub mod auth;
pub mod health;
pub mod tasks;

use actix_web::web;

/// Routes under `/api`. `/tasks/stats` is registered ahead of `/tasks/{id}`.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(auth::login)
            .service(auth::register)
            .service(auth::profile),
    )
    .service(
        web::scope("/tasks")
            .service(tasks::list_tasks)
            .service(tasks::create_task)
            .service(tasks::task_stats)
            .service(tasks::get_task)
            .service(tasks::update_task)
            .service(tasks::toggle_task)
            .service(tasks::delete_task),
    );
}
