use std::sync::OnceLock;

use bcrypt::{hash, verify, BcryptError};
use log::warn;
use thiserror::Error;
use validator::ValidationError;

/// bcrypt only reads this many bytes of its input and silently drops the rest.
pub const MAX_PASSWORD_BYTES: usize = 72;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Password must be at most 72 bytes")]
    TooLong,
    #[error(transparent)]
    Bcrypt(#[from] BcryptError),
}

/// Validator hook for request bodies: the limit is on encoded bytes, not characters.
pub fn validate_password_bytes(password: &str) -> Result<(), ValidationError> {
    if password.len() > MAX_PASSWORD_BYTES {
        let mut err = ValidationError::new("length");
        err.add_param("max_bytes".into(), &MAX_PASSWORD_BYTES);
        return Err(err);
    }
    Ok(())
}

/// Salted, deliberately slow password hashing (bcrypt).
///
/// Every digest carries its own random salt and cost, so digests produced under an
/// older cost keep verifying after the cost is raised.
#[derive(Debug)]
pub struct PasswordHasher {
    cost: u32,
    dummy_digest: OnceLock<String>,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self {
            cost,
            dummy_digest: OnceLock::new(),
        }
    }

    /// Refuses input bcrypt would truncate, so two passwords that share their first
    /// 72 bytes never end up with interchangeable digests.
    pub fn hash_password(&self, password: &str) -> Result<String, PasswordError> {
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(PasswordError::TooLong);
        }
        Ok(hash(password, self.cost)?)
    }

    /// Checks `password` against a stored digest.
    ///
    /// A malformed digest verifies as `false`, as does any password too long to have
    /// been hashed. bcrypt compares in constant time.
    pub fn verify_password(&self, password: &str, digest: &str) -> bool {
        if password.len() > MAX_PASSWORD_BYTES {
            return false;
        }
        match verify(password, digest) {
            Ok(matches) => matches,
            Err(e) => {
                warn!("stored password digest could not be parsed: {}", e);
                false
            }
        }
    }

    /// Burns the same CPU as a real verification. Used when there is no user to check
    /// against, so an unknown email costs as much as a wrong password.
    pub fn verify_against_dummy(&self, password: &str) {
        let digest = self
            .dummy_digest
            .get_or_init(|| hash("dummy-password", self.cost).unwrap_or_default());
        let _ = verify(password, digest);
    }
}
