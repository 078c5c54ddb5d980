use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};
use thiserror::Error;
use validator::{Validate, ValidationErrors};

use super::identity::UserIdentity;
use super::password::{PasswordError, PasswordHasher};
use super::token::{TokenCodec, TokenError};
use super::{AuthResponse, LoginRequest, RegisterRequest};
use crate::error::AppError;
use crate::models::{NewUser, User, UserProfile};
use crate::store::{StoreError, UserStore};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Email already registered")]
    AlreadyRegistered,
    #[error("Username already taken")]
    UsernameTaken,
    /// Unknown email, wrong password and inactive account all end up here.
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// The token checked out but its user row is gone.
    #[error("User not found")]
    UserNotFound,
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Hashing(#[from] PasswordError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("background task failed: {0}")]
    Internal(String),
}

impl From<AuthError> for AppError {
    fn from(error: AuthError) -> AppError {
        match error {
            AuthError::AlreadyRegistered | AuthError::UsernameTaken => {
                AppError::Conflict(error.to_string())
            }
            AuthError::InvalidCredentials => AppError::Unauthorized(error.to_string()),
            AuthError::UserNotFound => AppError::NotFound(error.to_string()),
            AuthError::Validation(errors) => errors.into(),
            AuthError::Token(err) => err.into(),
            AuthError::Hashing(err) => err.into(),
            AuthError::Store(err) => err.into(),
            AuthError::Internal(msg) => AppError::InternalServerError(msg),
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Registration and login: credentials in, signed session token out.
pub struct AuthService {
    users: Arc<dyn UserStore>,
    codec: Arc<TokenCodec>,
    hasher: Arc<PasswordHasher>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        codec: Arc<TokenCodec>,
        hasher: Arc<PasswordHasher>,
    ) -> Self {
        Self {
            users,
            codec,
            hasher,
        }
    }

    pub async fn register(&self, mut request: RegisterRequest) -> Result<AuthResponse, AuthError> {
        request.email = normalize_email(&request.email);
        request.validate()?;

        if self
            .users
            .find_user_by_email(&request.email)
            .await?
            .is_some()
        {
            return Err(AuthError::AlreadyRegistered);
        }

        let password_hash = self.hash(request.password).await?;
        let user = self
            .users
            .create_user(NewUser {
                email: request.email,
                username: request.username,
                password_hash,
                first_name: request.first_name,
                last_name: request.last_name,
            })
            .await
            .map_err(|err| match err {
                // Lost a race with a concurrent registration.
                StoreError::Conflict(what) if what.contains("email") => {
                    AuthError::AlreadyRegistered
                }
                StoreError::Conflict(_) => AuthError::UsernameTaken,
                other => AuthError::Store(other),
            })?;

        info!("registered user {}", user.id);
        self.respond(&user)
    }

    pub async fn login(&self, mut request: LoginRequest) -> Result<AuthResponse, AuthError> {
        request.email = normalize_email(&request.email);
        request.validate()?;

        let found = self.users.find_user_by_email(&request.email).await?;
        let verified = match found {
            Some(user) => {
                let matches = self
                    .verify(request.password, user.password_hash.clone())
                    .await?;
                (matches && user.is_active).then_some(user)
            }
            None => {
                self.burn_verification(request.password).await?;
                None
            }
        };

        let Some(mut user) = verified else {
            warn!("failed login attempt for {}", request.email);
            return Err(AuthError::InvalidCredentials);
        };

        let now = Utc::now();
        self.users.record_login(user.id, now).await?;
        user.last_login_at = Some(now);

        info!("user {} logged in", user.id);
        self.respond(&user)
    }

    /// Public profile of an already-resolved caller.
    pub async fn profile(&self, identity: &UserIdentity) -> Result<UserProfile, AuthError> {
        self.users
            .find_user_by_id(identity.user_id)
            .await?
            .map(|user| UserProfile::from(&user))
            .ok_or(AuthError::UserNotFound)
    }

    fn respond(&self, user: &User) -> Result<AuthResponse, AuthError> {
        let issued = self.codec.issue(user.id, &user.email, Utc::now())?;
        Ok(AuthResponse {
            token: issued.token,
            token_type: "bearer".to_string(),
            expires_at: issued.expires_at,
            user: UserProfile::from(user),
        })
    }

    // bcrypt runs on the blocking pool so it never stalls the request workers.

    async fn hash(&self, password: String) -> Result<String, AuthError> {
        let hasher = Arc::clone(&self.hasher);
        let digest = tokio::task::spawn_blocking(move || hasher.hash_password(&password))
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))??;
        Ok(digest)
    }

    async fn verify(&self, password: String, digest: String) -> Result<bool, AuthError> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.verify_password(&password, &digest))
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))
    }

    async fn burn_verification(&self, password: String) -> Result<(), AuthError> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.verify_against_dummy(&password))
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))
    }
}
