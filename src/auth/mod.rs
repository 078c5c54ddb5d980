pub mod extractors;
pub mod identity;
pub mod middleware;
pub mod password;
pub mod service;
pub mod token;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::UserProfile;
use password::validate_password_bytes;

pub use extractors::AuthenticatedUser;
pub use identity::{IdentityResolver, Unauthenticated, UserIdentity};
pub use middleware::AuthMiddleware;
pub use password::PasswordHasher;
pub use service::{AuthError, AuthService};
pub use token::{Claims, TokenCodec, TokenError};

lazy_static! {
    static ref USERNAME_REGEX: regex::Regex = regex::Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

/// Body of `POST /api/auth/login`.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6), custom = "validate_password_bytes")]
    pub password: String,
}

/// Body of `POST /api/auth/register`.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Email address for the new account. Stored trimmed and lowercased.
    #[validate(email)]
    pub email: String,
    /// Never stored; only its bcrypt digest is. At least 6 characters and at most
    /// 72 bytes once UTF-8 encoded.
    #[validate(length(min = 6), custom = "validate_password_bytes")]
    pub password: String,
    /// Optional handle, unique across users when present. 3 to 32 of `[a-zA-Z0-9_-]`.
    #[serde(default)]
    #[validate(
        length(min = 3, max = 32),
        regex(
            path = "USERNAME_REGEX",
            message = "Username must be alphanumeric, underscores, or hyphens"
        )
    )]
    pub username: Option<String>,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub first_name: Option<String>,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub last_name: Option<String>,
}

/// Returned by both register and login.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    /// HS256-signed session token.
    pub token: String,
    /// Always `bearer`.
    pub token_type: String,
    /// When the token stops being accepted.
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
}
