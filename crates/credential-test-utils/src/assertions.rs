//! Custom test assertions for issued tokens.

use crate::fixtures::{TEST_AUDIENCE, TEST_ISSUER, TEST_SIGNING_KEY};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct JwtHeader {
    alg: String,
    #[serde(default)]
    typ: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JwtClaims {
    sub: String,
    iss: String,
    aud: String,
    exp: i64,
    iat: i64,
    jti: String,
}

fn segment<T: for<'de> Deserialize<'de>>(token: &str, index: usize, what: &str) -> T {
    let part = token
        .split('.')
        .nth(index)
        .unwrap_or_else(|| panic!("JWT has no {what} segment"));
    let bytes = URL_SAFE_NO_PAD
        .decode(part)
        .unwrap_or_else(|e| panic!("Failed to base64 decode JWT {what}: {e}"));
    serde_json::from_slice(&bytes).unwrap_or_else(|e| panic!("Failed to parse JWT {what}: {e}"))
}

fn claims(token: &str) -> JwtClaims {
    segment(token, 1, "payload")
}

/// Custom assertions for issued tokens
///
/// # Example
/// ```rust,ignore
/// token
///     .assert_valid_jwt()
///     .assert_for_subject("alice")
///     .assert_expires_in(3600);
/// ```
pub trait TokenAssertions {
    /// Assert three segments, an HS256 header and decodable claims.
    fn assert_valid_jwt(&self) -> &Self;

    /// Assert the signature, issuer and audience match the test fixtures.
    fn assert_signed_with_test_key(&self) -> &Self;

    /// Assert that the token is for the specified subject
    fn assert_for_subject(&self, subject: &str) -> &Self;

    /// Assert that the token expires within the specified seconds (5s tolerance)
    fn assert_expires_in(&self, seconds: u64) -> &Self;

    /// Assert that two tokens carry different token ids.
    fn assert_distinct_from(&self, other: &str) -> &Self;
}

impl TokenAssertions for String {
    fn assert_valid_jwt(&self) -> &Self {
        let parts = self.split('.').count();
        assert_eq!(
            parts, 3,
            "JWT must have 3 parts (header.payload.signature), got {parts}"
        );

        let header: JwtHeader = segment(self, 0, "header");
        assert_eq!(header.alg, "HS256", "Expected HS256 algorithm");
        if let Some(typ) = header.typ {
            assert_eq!(typ, "JWT", "Expected JWT type");
        }

        let claims = claims(self);
        assert!(claims.exp > claims.iat, "exp must be after iat");
        assert!(!claims.jti.is_empty(), "jti must be set");

        self
    }

    fn assert_signed_with_test_key(&self) -> &Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[TEST_ISSUER]);
        validation.set_audience(&[TEST_AUDIENCE]);

        let result = decode::<serde_json::Value>(
            self,
            &DecodingKey::from_secret(TEST_SIGNING_KEY.as_bytes()),
            &validation,
        );
        assert!(
            result.is_ok(),
            "Token failed verification with the test key: {:?}",
            result.err()
        );

        self
    }

    fn assert_for_subject(&self, subject: &str) -> &Self {
        let claims = claims(self);
        assert_eq!(
            claims.sub, subject,
            "Expected subject '{}', got '{}'",
            subject, claims.sub
        );
        assert_eq!(claims.iss, TEST_ISSUER);
        assert_eq!(claims.aud, TEST_AUDIENCE);

        self
    }

    fn assert_expires_in(&self, seconds: u64) -> &Self {
        let claims = claims(self);
        let expires_in = claims.exp - chrono::Utc::now().timestamp();
        let expected = i64::try_from(seconds).unwrap_or(i64::MAX);

        assert!(
            (expires_in - expected).abs() <= 5,
            "Expected token to expire in {seconds} seconds, but expires in {expires_in} seconds"
        );

        self
    }

    fn assert_distinct_from(&self, other: &str) -> &Self {
        assert_ne!(
            claims(self).jti,
            claims(other).jti,
            "Expected distinct token ids"
        );

        self
    }
}
