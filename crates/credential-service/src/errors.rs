//! Credential service error types.
//!
//! Each variant maps to one gRPC status code. Internal detail (stage, store
//! error text) stays in logs; clients only see `client_message()`.

use crate::policy::ValidationError;
use crate::repositories::StoreError;
use std::fmt;
use thiserror::Error;
use tonic::{Code, Status};

/// Pipeline step at which a request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validate,
    Lookup,
    Hash,
    Persist,
    Verify,
    Issue,
}

impl Stage {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Stage::Validate => "validate",
            Stage::Lookup => "lookup",
            Stage::Hash => "hash",
            Stage::Persist => "persist",
            Stage::Verify => "verify",
            Stage::Issue => "issue",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a failed register or authenticate call.
///
/// Messages carry the stage and username, never the password.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error(transparent)]
    ValidationFailed(ValidationError),

    #[error("user {username} already exists")]
    AlreadyExists { username: String },

    /// Unknown user and wrong password are deliberately the same variant.
    #[error("invalid username or password")]
    AuthenticationFailed,

    #[error("storage failure during {stage} for user {username}: {source}")]
    Storage {
        stage: Stage,
        username: String,
        #[source]
        source: StoreError,
    },

    #[error("internal failure during {stage} for user {username}: {reason}")]
    Internal {
        stage: Stage,
        username: String,
        reason: String,
    },

    #[error("request cancelled during {stage}")]
    Cancelled { stage: Stage },
}

impl CredentialError {
    /// gRPC status code for this outcome.
    pub fn code(&self) -> Code {
        match self {
            CredentialError::ValidationFailed(_) => Code::InvalidArgument,
            CredentialError::AlreadyExists { .. } => Code::AlreadyExists,
            CredentialError::AuthenticationFailed => Code::Unauthenticated,
            CredentialError::Storage { .. } | CredentialError::Internal { .. } => Code::Internal,
            CredentialError::Cancelled { .. } => Code::Cancelled,
        }
    }

    /// Short, stable text safe to return to callers.
    pub fn client_message(&self) -> String {
        match self {
            CredentialError::ValidationFailed(e) => e.to_string(),
            CredentialError::AlreadyExists { username } => {
                format!("user {username} already exists")
            }
            CredentialError::AuthenticationFailed => "invalid username or password".to_string(),
            CredentialError::Storage { .. } => "storage unavailable".to_string(),
            CredentialError::Internal { .. } => "internal error".to_string(),
            CredentialError::Cancelled { .. } => "request cancelled".to_string(),
        }
    }

    /// Stable label for metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            CredentialError::ValidationFailed(_) => "validation_failed",
            CredentialError::AlreadyExists { .. } => "already_exists",
            CredentialError::AuthenticationFailed => "authentication_failed",
            CredentialError::Storage { .. } => "storage_failure",
            CredentialError::Internal { .. } => "internal_failure",
            CredentialError::Cancelled { .. } => "cancelled",
        }
    }

    /// Stage the pipeline reached, when known.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            CredentialError::ValidationFailed(_) => Some(Stage::Validate),
            CredentialError::Storage { stage, .. }
            | CredentialError::Internal { stage, .. }
            | CredentialError::Cancelled { stage } => Some(*stage),
            CredentialError::AlreadyExists { .. } | CredentialError::AuthenticationFailed => None,
        }
    }
}

impl From<CredentialError> for Status {
    fn from(err: CredentialError) -> Self {
        Status::new(err.code(), err.client_message())
    }
}
