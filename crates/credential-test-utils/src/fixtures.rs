//! Fixed fixtures for reproducible tests.

use common::secret::SecretString;
use credential_service::config::MIN_BCRYPT_COST;
use credential_service::observability::CredentialMetrics;
use credential_service::policy::PasswordPolicy;
use credential_service::repositories::UserStore;
use credential_service::services::{CredentialService, TokenIssuer, TokenPolicy};
use jsonwebtoken::Algorithm;
use std::sync::Arc;
use std::time::Duration;

/// HMAC key used by every test issuer.
pub const TEST_SIGNING_KEY: &str = "test-signing-key-0123456789abcdef";
pub const TEST_ISSUER: &str = "credential-service-test";
pub const TEST_AUDIENCE: &str = "credential-service-test-clients";
pub const TEST_TOKEN_EXPIRY: Duration = Duration::from_secs(3600);

/// bcrypt cost for tests; the lowest the service accepts.
pub const TEST_BCRYPT_COST: u32 = MIN_BCRYPT_COST;

pub const ALICE: &str = "alice";
/// Satisfies [`strict_policy`].
pub const ALICE_PASSWORD: &str = "Secur3@pw";
pub const BOB: &str = "bob";
pub const BOB_PASSWORD: &str = "B0b!secret";

/// At least 8 characters with one uppercase, one digit and one special.
pub fn strict_policy() -> PasswordPolicy {
    PasswordPolicy {
        min_length: 8,
        min_numeric: 1,
        min_uppercase: 1,
        min_lowercase: 0,
        min_special: 1,
    }
}

pub fn test_token_policy() -> TokenPolicy {
    TokenPolicy {
        algorithm: Algorithm::HS256,
        signing_key: SecretString::from(TEST_SIGNING_KEY),
        issuer: TEST_ISSUER.to_string(),
        audience: TEST_AUDIENCE.to_string(),
        expiry: TEST_TOKEN_EXPIRY,
    }
}

/// Build a credential service over `store` with the strict policy and the
/// test signing key.
///
/// # Errors
///
/// Returns an error if the test token policy is rejected.
pub fn test_credential_service(
    store: Arc<dyn UserStore>,
) -> Result<CredentialService, anyhow::Error> {
    let issuer = TokenIssuer::new(test_token_policy())?;
    Ok(CredentialService::new(
        store,
        strict_policy(),
        issuer,
        TEST_BCRYPT_COST,
        CredentialMetrics::new(),
    ))
}
