use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::AppError;

/// Represents the claims encoded within a JWT (JSON Web Token).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject of the token: the user's email.
    pub sub: String,
    /// String-encoded user id. Optional on the way in so a token that lacks it
    /// reaches the identity resolver instead of failing as unparsable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Expiration timestamp (seconds since epoch).
    pub exp: i64,
    /// Issued-at timestamp (seconds since epoch).
    #[serde(default)]
    pub iat: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// Bad signature, unparsable payload or expired. Deliberately one variant.
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<TokenError> for AppError {
    fn from(error: TokenError) -> AppError {
        match error {
            TokenError::InvalidToken => AppError::Unauthorized(error.to_string()),
            TokenError::Signing(msg) => AppError::InternalServerError(msg),
        }
    }
}

/// A freshly signed token and the instant it stops being accepted.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies HS256 bearer tokens with a single shared secret.
///
/// The secret is handed in at construction; nothing here reads the environment.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    lifetime: Duration,
}

impl TokenCodec {
    pub fn new(secret: &str, lifetime: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the caller-supplied clock in `verify_at`.
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            lifetime,
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issues a token for `user_id`/`email` that expires `lifetime` after `now`.
    pub fn issue(
        &self,
        user_id: Uuid,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let expires_at = now + self.lifetime;
        let claims = Claims {
            sub: email.to_string(),
            user_id: Some(user_id.to_string()),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        Ok(IssuedToken { token, expires_at })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verifies signature and payload shape, then rejects tokens with `exp <= now`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("token rejected: {:?}", e.kind());
                TokenError::InvalidToken
            })?;

        if claims.exp <= now.timestamp() {
            debug!("token rejected: expired at {}", claims.exp);
            return Err(TokenError::InvalidToken);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn codec(secret: &str) -> TokenCodec {
        TokenCodec::new(secret, Duration::hours(24))
    }

    #[test]
    fn test_token_generation_and_verification() {
        let codec = codec("test_secret_for_gen_verify");
        let user_id = Uuid::new_v4();
        let now = Utc::now();

        let issued = codec.issue(user_id, "a@x.com", now).unwrap();
        let claims = codec.verify_at(&issued.token, now).unwrap();

        assert_eq!(claims.sub, "a@x.com");
        assert_eq!(claims.user_id, Some(user_id.to_string()));
        assert_eq!(claims.exp, (now + Duration::hours(24)).timestamp());
        assert_eq!(issued.expires_at.timestamp(), claims.exp);
    }

    #[test]
    fn test_token_expiration() {
        let codec = codec("test_secret_for_expiration");
        let issued_at = Utc::now();
        let issued = codec.issue(Uuid::new_v4(), "a@x.com", issued_at).unwrap();

        let just_before = issued_at + Duration::hours(24) - Duration::seconds(1);
        assert!(codec.verify_at(&issued.token, just_before).is_ok());

        let at_expiry = issued_at + Duration::hours(24);
        assert_eq!(
            codec.verify_at(&issued.token, at_expiry),
            Err(TokenError::InvalidToken)
        );

        // Wall-clock path rejects a token minted two days ago.
        let stale = codec
            .issue(Uuid::new_v4(), "a@x.com", Utc::now() - Duration::hours(48))
            .unwrap();
        assert_eq!(codec.verify(&stale.token), Err(TokenError::InvalidToken));
    }

    #[test]
    fn test_invalid_token_signature() {
        let issued = codec("one secret")
            .issue(Uuid::new_v4(), "a@x.com", Utc::now())
            .unwrap();

        assert_eq!(
            codec("a_completely_different_secret").verify(&issued.token),
            Err(TokenError::InvalidToken)
        );
    }

    #[test]
    fn test_tampered_and_garbage_tokens() {
        let codec = codec("secret");
        let issued = codec.issue(Uuid::new_v4(), "a@x.com", Utc::now()).unwrap();

        let mut parts: Vec<&str> = issued.token.split('.').collect();
        let forged_payload = {
            let other = codec.issue(Uuid::new_v4(), "evil@x.com", Utc::now()).unwrap();
            other.token.split('.').nth(1).unwrap().to_string()
        };
        parts[1] = &forged_payload;
        let tampered = parts.join(".");

        assert_eq!(codec.verify(&tampered), Err(TokenError::InvalidToken));
        assert_eq!(codec.verify("not-a-token"), Err(TokenError::InvalidToken));
        assert_eq!(codec.verify(""), Err(TokenError::InvalidToken));
    }

    #[test]
    fn test_payload_without_user_id_still_decodes() {
        let codec = codec("secret");
        let exp = (Utc::now() + Duration::hours(1)).timestamp();
        let token = encode(
            &Header::new(Algorithm::HS256),
            &json!({ "sub": "a@x.com", "exp": exp }),
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        let claims = codec.verify(&token).unwrap();
        assert_eq!(claims.user_id, None);
    }

    #[test]
    fn test_payload_missing_exp_is_invalid() {
        let codec = codec("secret");
        let token = encode(
            &Header::new(Algorithm::HS256),
            &json!({ "sub": "a@x.com", "user_id": Uuid::new_v4().to_string() }),
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        assert_eq!(codec.verify(&token), Err(TokenError::InvalidToken));
    }
}
