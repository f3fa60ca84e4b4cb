//! Password hashing primitives.
//!
//! Both functions are CPU-bound. Callers on the async runtime run them via
//! `tokio::task::spawn_blocking`.

use crate::config::{MAX_BCRYPT_COST, MIN_BCRYPT_COST};
use common::secret::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::instrument;

/// bcrypt only reads this many bytes of input. Longer passwords are refused
/// rather than silently truncated.
pub const MAX_PASSWORD_BYTES: usize = 72;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid bcrypt cost: {cost} (must be {min}-{max})")]
    InvalidCost { cost: u32, min: u32, max: u32 },

    #[error("Password exceeds {max} bytes")]
    PasswordTooLong { max: usize },

    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error("Password verification failed: {0}")]
    Verify(String),
}

/// Hash a password with bcrypt at the given cost. The salt is random per call.
///
/// # Errors
///
/// Returns `CryptoError::InvalidCost` if `cost` is outside
/// `MIN_BCRYPT_COST..=MAX_BCRYPT_COST`, `CryptoError::PasswordTooLong` past
/// [`MAX_PASSWORD_BYTES`], `CryptoError::Hash` if bcrypt fails.
#[instrument(skip_all)]
pub fn hash_password(password: &SecretString, cost: u32) -> Result<String, CryptoError> {
    if password.expose_secret().len() > MAX_PASSWORD_BYTES {
        return Err(CryptoError::PasswordTooLong {
            max: MAX_PASSWORD_BYTES,
        });
    }
    if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
        return Err(CryptoError::InvalidCost {
            cost,
            min: MIN_BCRYPT_COST,
            max: MAX_BCRYPT_COST,
        });
    }

    bcrypt::hash(password.expose_secret(), cost).map_err(|e| CryptoError::Hash(e.to_string()))
}

/// Compare a password to a stored bcrypt hash.
///
/// `Ok(false)` is a mismatch. `Err` means the stored hash could not be parsed.
/// A password longer than [`MAX_PASSWORD_BYTES`] never matches.
#[instrument(skip_all)]
pub fn verify_password(password: &SecretString, hash: &str) -> Result<bool, CryptoError> {
    if password.expose_secret().len() > MAX_PASSWORD_BYTES {
        return Ok(false);
    }
    bcrypt::verify(password.expose_secret(), hash).map_err(|e| CryptoError::Verify(e.to_string()))
}
