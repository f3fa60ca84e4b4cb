//! Observability for the credential service.
//!
//! Log fields follow three rules:
//! - enum-like values (stage, outcome, backend) are logged as-is
//! - usernames are logged only through [`hash_for_correlation`]
//! - passwords, hashes and tokens are never logged

pub mod health;
pub mod metrics;

pub use self::health::{health_router, HealthState};
pub use self::metrics::CredentialMetrics;

use self::metrics::record_error;
use crate::errors::CredentialError;
use sha2::{Digest, Sha256};

/// Filter used when `RUST_LOG` is unset. Library events log under `cs.*`
/// targets, the binary under its crate name.
pub const DEFAULT_LOG_FILTER: &str = "credential_service=info,cs=info";

/// Hash a field value for correlation in logs (SHA-256, first 8 hex chars)
///
/// One-way and truncated. Suitable for correlating log lines, not for secrets.
pub fn hash_for_correlation(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    hex::encode(digest.get(..4).unwrap_or_default())
}

/// Error categories for metrics labels (bounded cardinality)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Caller sent something we refused (bad input, taken username)
    Client,
    /// Wrong password or unknown user
    Authentication,
    /// Store unreachable or errored
    Storage,
    /// Hashing or signing malfunction
    Internal,
    /// Deadline hit or server shutting down
    Cancelled,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Client => "client",
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::Storage => "storage",
            ErrorCategory::Internal => "internal",
            ErrorCategory::Cancelled => "cancelled",
        }
    }

    /// Whether errors in this category indicate a server-side problem.
    pub fn is_server_fault(&self) -> bool {
        matches!(self, ErrorCategory::Storage | ErrorCategory::Internal)
    }
}

impl From<&CredentialError> for ErrorCategory {
    fn from(err: &CredentialError) -> Self {
        match err {
            CredentialError::ValidationFailed(_) | CredentialError::AlreadyExists { .. } => {
                ErrorCategory::Client
            }
            CredentialError::AuthenticationFailed => ErrorCategory::Authentication,
            CredentialError::Storage { .. } => ErrorCategory::Storage,
            CredentialError::Internal { .. } => ErrorCategory::Internal,
            CredentialError::Cancelled { .. } => ErrorCategory::Cancelled,
        }
    }
}

/// Count a failed RPC under `cs_errors_total`.
pub fn record_rpc_error(operation: &str, err: &CredentialError) {
    let category = ErrorCategory::from(err);
    record_error(operation, category.as_str(), err.code() as i32);
}
