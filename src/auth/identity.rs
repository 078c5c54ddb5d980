use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::token::TokenCodec;
use crate::error::AppError;
use crate::store::{StoreError, UserStore};

/// The caller behind a request, as resolved from its bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: Uuid,
    pub email: String,
}

/// Why a request could not be tied to a user. Each reason is reported as a 401.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum Unauthenticated {
    #[error("missing credentials")]
    MissingCredentials,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("malformed token payload")]
    MalformedPayload,
    #[error("user not found")]
    UserNotFound,
}

impl From<Unauthenticated> for AppError {
    fn from(reason: Unauthenticated) -> AppError {
        AppError::Unauthorized(reason.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Unauthenticated(#[from] Unauthenticated),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ResolveError> for AppError {
    fn from(error: ResolveError) -> AppError {
        match error {
            ResolveError::Unauthenticated(reason) => reason.into(),
            ResolveError::Store(err) => err.into(),
        }
    }
}

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let value = header?.trim();
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token)
}

/// Turns a raw `Authorization` header into a [`UserIdentity`].
///
/// Read-only: verifies the token, then re-reads the user so a token that outlives
/// its account (or its account's activation) stops working.
pub struct IdentityResolver {
    codec: Arc<TokenCodec>,
    users: Arc<dyn UserStore>,
}

impl IdentityResolver {
    pub fn new(codec: Arc<TokenCodec>, users: Arc<dyn UserStore>) -> Self {
        Self { codec, users }
    }

    pub async fn resolve(&self, header: Option<&str>) -> Result<UserIdentity, ResolveError> {
        self.resolve_at(header, Utc::now()).await
    }

    pub async fn resolve_at(
        &self,
        header: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<UserIdentity, ResolveError> {
        let token = bearer_token(header).ok_or(Unauthenticated::MissingCredentials)?;

        let claims = self
            .codec
            .verify_at(token, now)
            .map_err(|_| Unauthenticated::InvalidToken)?;

        let user_id = claims
            .user_id
            .as_deref()
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .ok_or(Unauthenticated::MalformedPayload)?;

        let user = match self.users.find_user_by_id(user_id).await? {
            Some(user) if user.is_active => user,
            _ => {
                debug!("token names missing or inactive user {}", user_id);
                return Err(Unauthenticated::UserNotFound.into());
            }
        };

        Ok(UserIdentity {
            user_id: user.id,
            email: user.email,
        })
    }
}
