#![doc = "The `tasknest` library crate."]
#![doc = ""]
#![doc = "Accounts, session tokens and owner-scoped task storage for the TaskNest API."]
#![doc = "The binary (`main.rs`) only reads configuration, picks a store and serves [`AppState`]."]

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod store;
pub mod tasks;

use std::sync::Arc;

use actix_web::web;

use crate::auth::{AuthMiddleware, AuthService, IdentityResolver, PasswordHasher, TokenCodec};
use crate::error::AppError;
use crate::store::{TaskStore, UserStore};
use crate::tasks::TaskService;

pub use crate::config::Config;

/// Everything a worker needs to serve requests. Cheap to clone into each worker.
#[derive(Clone)]
pub struct AppState {
    pub auth: web::Data<AuthService>,
    pub tasks: web::Data<TaskService>,
    pub resolver: web::Data<IdentityResolver>,
}

impl AppState {
    pub fn new(
        users: Arc<dyn UserStore>,
        tasks: Arc<dyn TaskStore>,
        codec: TokenCodec,
        hasher: PasswordHasher,
    ) -> Self {
        let codec = Arc::new(codec);
        let hasher = Arc::new(hasher);
        Self {
            auth: web::Data::new(AuthService::new(users.clone(), codec.clone(), hasher)),
            tasks: web::Data::new(TaskService::new(tasks)),
            resolver: web::Data::new(IdentityResolver::new(codec, users)),
        }
    }

    /// Mounts `/health` and the authenticated `/api` scope.
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.auth.clone())
            .app_data(self.tasks.clone())
            .app_data(
                web::JsonConfig::default()
                    .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
            )
            .app_data(
                web::QueryConfig::default()
                    .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
            )
            .service(routes::health::health)
            .service(
                web::scope("/api")
                    .wrap(AuthMiddleware::new(self.resolver.clone()))
                    .configure(routes::config),
            );
    }
}
