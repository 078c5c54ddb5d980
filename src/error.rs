//! The error every handler returns.
//!
//! [`AppError`] renders itself as `{"error": "..."}` with the matching status code.
//! Component errors (`StoreError`, `TokenError`, `Unauthenticated`, `TaskError`,
//! validation errors) convert into it through `From`, so handlers stay on `?`.

use actix_web::{error::ResponseError, http::header, http::StatusCode, HttpResponse};
use log::error;
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

use crate::auth::password::PasswordError;

/// Represents all possible errors that can occur within the application.
///
/// Each variant corresponds to a specific type of error, often carrying a message
/// detailing the issue. These errors are then converted into appropriate HTTP responses.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AppError {
    /// Authentication failed or is required but missing (HTTP 401).
    /// Messages are deliberately low-detail.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// Malformed request (HTTP 400).
    #[error("Bad Request: {0}")]
    BadRequest(String),
    /// Resource absent, or owned by someone else (HTTP 404).
    #[error("Not Found: {0}")]
    NotFound(String),
    /// Unique constraint conflict such as a duplicate email (HTTP 409).
    #[error("Conflict: {0}")]
    Conflict(String),
    /// Unexpected server-side error (HTTP 500).
    #[error("Internal Server Error: {0}")]
    InternalServerError(String),
    /// Store failure (HTTP 500). The detail is logged, never sent to the client.
    #[error("Database Error: {0}")]
    DatabaseError(String),
    /// Input validation failed (HTTP 422). Carries the per-field detail.
    #[error("Validation Error: {0}")]
    ValidationError(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        match self {
            AppError::Unauthorized(msg) => builder
                .insert_header((header::WWW_AUTHENTICATE, "Bearer"))
                .json(json!({ "error": msg })),
            AppError::InternalServerError(msg) | AppError::DatabaseError(msg) => {
                error!("request failed: {}", msg);
                builder.json(json!({ "error": "Internal server error" }))
            }
            AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::ValidationError(msg) => builder.json(json!({ "error": msg })),
        }
    }
}

/// Converts `sqlx::Error` into `AppError`.
///
/// `RowNotFound` becomes `NotFound`; everything else is an infrastructure failure.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match error {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".into()),
            _ => AppError::DatabaseError(error.to_string()),
        }
    }
}

/// Converts `validator::ValidationErrors` into `AppError::ValidationError`.
///
/// The detailed validation messages are preserved.
impl From<ValidationErrors> for AppError {
    fn from(error: ValidationErrors) -> AppError {
        AppError::ValidationError(error.to_string())
    }
}

/// An over-long password is the caller's mistake; anything bcrypt itself reports is ours.
impl From<PasswordError> for AppError {
    fn from(error: PasswordError) -> AppError {
        match error {
            PasswordError::TooLong => AppError::ValidationError(error.to_string()),
            PasswordError::Bcrypt(err) => {
                AppError::InternalServerError(format!("Failed to hash password: {}", err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_responses() {
        let error = AppError::Unauthorized("Invalid token".into());
        let response = error.error_response();
        assert_eq!(response.status(), 401);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );

        let error = AppError::BadRequest("Invalid input".into());
        assert_eq!(error.error_response().status(), 400);

        let error = AppError::NotFound("Resource not found".into());
        assert_eq!(error.error_response().status(), 404);

        let error = AppError::Conflict("Email already registered".into());
        assert_eq!(error.error_response().status(), 409);

        let error = AppError::ValidationError("title: length".into());
        assert_eq!(error.error_response().status(), 422);

        let error = AppError::InternalServerError("Server error".into());
        assert_eq!(error.error_response().status(), 500);
    }

    #[actix_rt::test]
    async fn test_database_error_detail_is_hidden() {
        let error = AppError::DatabaseError("connection refused on 10.0.0.5".into());
        let response = error.error_response();
        assert_eq!(response.status(), 500);

        let body = actix_web::body::to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Internal server error");
    }

    #[test]
    fn test_password_errors_split_by_blame() {
        let error: AppError = PasswordError::TooLong.into();
        assert_eq!(error.error_response().status(), 422);

        let error: AppError = PasswordError::Bcrypt(bcrypt::BcryptError::CostNotAllowed(1)).into();
        assert_eq!(error.error_response().status(), 500);
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let error: AppError = sqlx::Error::RowNotFound.into();
        assert_eq!(error, AppError::NotFound("Record not found".into()));
    }
}
