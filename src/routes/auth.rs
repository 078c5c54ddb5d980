use crate::{
    auth::{AuthService, AuthenticatedUser, LoginRequest, RegisterRequest},
    error::AppError,
};
use actix_web::{get, post, web, HttpResponse, Responder};

/// Register a new user
///
/// Creates the account and returns a session token for it right away.
///
/// ## Responses:
/// - `201 Created`: `AuthResponse` with the token and the new user's profile.
/// - `422 Unprocessable Entity`: malformed email, password shorter than 6 characters or longer than 72 bytes, bad username.
/// - `409 Conflict`: the email or username is already taken.
#[post("/register")]
pub async fn register(
    auth: web::Data<AuthService>,
    register_data: web::Json<RegisterRequest>,
) -> Result<impl Responder, AppError> {
    let response = auth.register(register_data.into_inner()).await?;
    Ok(HttpResponse::Created().json(response))
}

/// Login user
///
/// Exchanges email and password for a session token. Unknown email, wrong password and
/// deactivated account all answer with the same `401 Invalid credentials`.
#[post("/login")]
pub async fn login(
    auth: web::Data<AuthService>,
    login_data: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    let response = auth.login(login_data.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Public profile of the caller.
#[get("/profile")]
pub async fn profile(
    auth: web::Data<AuthService>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let profile = auth.profile(&user.0).await?;
    Ok(HttpResponse::Ok().json(profile))
}
