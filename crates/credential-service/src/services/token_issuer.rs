//! Bearer token issuance.
//!
//! Tokens are stateless JWTs. Nothing is recorded about issued tokens, so
//! validity ends only at `exp`.

use crate::config::TokenConfig;
use crate::models::Identity;
use chrono::{DateTime, Utc};
use common::secret::{ExposeSecret, SecretString};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid signing key for {algorithm:?}: {reason}")]
    InvalidKey { algorithm: Algorithm, reason: String },

    #[error("Invalid token policy: {0}")]
    InvalidPolicy(String),

    #[error("JWT signing operation failed: {0}")]
    Signing(String),
}

/// Signing parameters, fixed for the life of the process.
#[derive(Clone)]
pub struct TokenPolicy {
    pub algorithm: Algorithm,
    pub signing_key: SecretString,
    pub issuer: String,
    pub audience: String,
    pub expiry: Duration,
}

impl fmt::Debug for TokenPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPolicy")
            .field("algorithm", &self.algorithm)
            .field("signing_key", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("expiry", &self.expiry)
            .finish()
    }
}

impl TryFrom<&TokenConfig> for TokenPolicy {
    type Error = TokenError;

    fn try_from(config: &TokenConfig) -> Result<Self, Self::Error> {
        let algorithm = Algorithm::from_str(config.algorithm.trim())
            .map_err(|_| TokenError::UnsupportedAlgorithm(config.algorithm.clone()))?;

        Ok(TokenPolicy {
            algorithm,
            signing_key: config.signing_key.clone(),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            expiry: config.expiry,
        })
    }
}

/// Claims carried by every issued token.
///
/// Debug redacts `sub` and `jti`.
#[derive(Clone, Serialize, Deserialize)]
pub struct UserClaims {
    /// Subject (username)
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    /// Unique token identifier
    pub jti: String,
}

impl fmt::Debug for UserClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserClaims")
            .field("sub", &"[REDACTED]")
            .field("iss", &self.iss)
            .field("aud", &self.aud)
            .field("iat", &self.iat)
            .field("exp", &self.exp)
            .field("jti", &"[REDACTED]")
            .finish()
    }
}

/// A signed token and the instant it stops being valid.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: SecretString,
    pub expires_at: DateTime<Utc>,
}

/// Signs tokens for verified identities. Key material is parsed once.
#[derive(Clone)]
pub struct TokenIssuer {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    issuer: String,
    audience: String,
    expiry_secs: i64,
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("algorithm", &self.algorithm)
            .field("encoding_key", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("expiry_secs", &self.expiry_secs)
            .finish()
    }
}

impl TokenIssuer {
    /// Parse key material and sign a probe token so a bad key fails at startup.
    ///
    /// HMAC algorithms take the key as a raw secret; RSA, RSA-PSS, ECDSA and
    /// EdDSA take a PEM-encoded private key.
    pub fn new(policy: TokenPolicy) -> Result<Self, TokenError> {
        let expiry_secs = i64::try_from(policy.expiry.as_secs())
            .map_err(|_| TokenError::InvalidPolicy("expiry is too large".to_string()))?;
        if expiry_secs == 0 {
            return Err(TokenError::InvalidPolicy(
                "expiry must be at least one second".to_string(),
            ));
        }
        expires_at(Utc::now().timestamp().saturating_add(expiry_secs))?;

        let encoding_key = encoding_key(policy.algorithm, &policy.signing_key)?;

        let issuer = Self {
            algorithm: policy.algorithm,
            encoding_key,
            issuer: policy.issuer,
            audience: policy.audience,
            expiry_secs,
        };

        issuer
            .sign(&issuer.claims_for("startup-probe", Utc::now()))
            .map_err(|e| TokenError::InvalidKey {
                algorithm: issuer.algorithm,
                reason: e.to_string(),
            })?;

        Ok(issuer)
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Sign a token for `identity`, valid from now until now + expiry.
    #[instrument(skip_all)]
    pub fn issue(&self, identity: &Identity) -> Result<IssuedToken, TokenError> {
        let now = Utc::now();
        let claims = self.claims_for(&identity.username, now);
        let token = self.sign(&claims)?;

        Ok(IssuedToken {
            token: SecretString::from(token),
            expires_at: expires_at(claims.exp)?,
        })
    }

    fn claims_for(&self, subject: &str, now: DateTime<Utc>) -> UserClaims {
        let iat = now.timestamp();
        UserClaims {
            sub: subject.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat,
            exp: iat.saturating_add(self.expiry_secs),
            jti: Uuid::new_v4().to_string(),
        }
    }

    fn sign(&self, claims: &UserClaims) -> Result<String, TokenError> {
        let mut header = Header::new(self.algorithm);
        header.typ = Some("JWT".to_string());

        encode(&header, claims, &self.encoding_key).map_err(|e| TokenError::Signing(e.to_string()))
    }
}

fn expires_at(exp: i64) -> Result<DateTime<Utc>, TokenError> {
    DateTime::<Utc>::from_timestamp(exp, 0)
        .ok_or_else(|| TokenError::InvalidPolicy("expiry out of range".to_string()))
}

fn encoding_key(algorithm: Algorithm, key: &SecretString) -> Result<EncodingKey, TokenError> {
    let material = key.expose_secret().as_bytes();
    let invalid = |e: jsonwebtoken::errors::Error| TokenError::InvalidKey {
        algorithm,
        reason: e.to_string(),
    };

    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            if material.is_empty() {
                return Err(TokenError::InvalidKey {
                    algorithm,
                    reason: "HMAC secret is empty".to_string(),
                });
            }
            Ok(EncodingKey::from_secret(material))
        }
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => EncodingKey::from_rsa_pem(material).map_err(invalid),
        Algorithm::ES256 | Algorithm::ES384 => EncodingKey::from_ec_pem(material).map_err(invalid),
        Algorithm::EdDSA => EncodingKey::from_ed_pem(material).map_err(invalid),
    }
}
