//! Password policy validation.
//!
//! Each character is classified by its Unicode general category into exactly
//! one bucket, first match wins: numeric (N*), uppercase (Lu), special (P* and
//! S*), then letter-or-space (L* or ' ', counted as lowercase). Marks, format
//! and control characters only add to the length.
//! Every unmet minimum is reported; validation never stops at the first one.

use crate::crypto::MAX_PASSWORD_BYTES;
use crate::models::CredentialRequest;
use common::secret::ExposeSecret;
use std::fmt;
use thiserror::Error;
use unicode_general_category::{get_general_category, GeneralCategory};

/// Configured minimums for candidate passwords. Zero leaves a class unconstrained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub min_numeric: usize,
    pub min_uppercase: usize,
    pub min_lowercase: usize,
    pub min_special: usize,
}

/// The full list of minimums a password failed to meet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyViolation {
    pub reasons: Vec<String>,
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "password validation error: {}", self.reasons.join(", "))
    }
}

impl std::error::Error for PolicyViolation {}

/// Rejected credential request, before any storage access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0}")]
    Missing(&'static str),

    #[error("password must be at most {max} bytes")]
    TooLong { max: usize },

    #[error(transparent)]
    Policy(#[from] PolicyViolation),
}

#[derive(Debug, Default)]
struct CharCounts {
    length: usize,
    numeric: usize,
    uppercase: usize,
    lowercase: usize,
    special: usize,
}

impl CharCounts {
    fn tally(password: &str) -> Self {
        let mut counts = CharCounts::default();
        for c in password.chars() {
            counts.length += 1;
            match CharClass::of(c) {
                Some(CharClass::Numeric) => counts.numeric += 1,
                Some(CharClass::Uppercase) => counts.uppercase += 1,
                Some(CharClass::Special) => counts.special += 1,
                Some(CharClass::Lowercase) => counts.lowercase += 1,
                None => {}
            }
        }
        counts
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Numeric,
    Uppercase,
    Special,
    Lowercase,
}

impl CharClass {
    fn of(c: char) -> Option<Self> {
        use GeneralCategory as G;

        match get_general_category(c) {
            G::DecimalNumber | G::LetterNumber | G::OtherNumber => Some(Self::Numeric),
            G::UppercaseLetter => Some(Self::Uppercase),
            G::ConnectorPunctuation
            | G::DashPunctuation
            | G::OpenPunctuation
            | G::ClosePunctuation
            | G::InitialPunctuation
            | G::FinalPunctuation
            | G::OtherPunctuation
            | G::MathSymbol
            | G::CurrencySymbol
            | G::ModifierSymbol
            | G::OtherSymbol => Some(Self::Special),
            G::LowercaseLetter | G::TitlecaseLetter | G::ModifierLetter | G::OtherLetter => {
                Some(Self::Lowercase)
            }
            _ if c == ' ' => Some(Self::Lowercase),
            _ => None,
        }
    }
}

impl PasswordPolicy {
    /// Check `password` against every configured minimum.
    pub fn validate(&self, password: &str) -> Result<(), PolicyViolation> {
        let counts = CharCounts::tally(password);
        let mut reasons = Vec::new();

        if counts.length < self.min_length {
            reasons.push(format!("must be at least {} characters", self.min_length));
        }

        for (have, want, class) in [
            (counts.numeric, self.min_numeric, "numeric"),
            (counts.uppercase, self.min_uppercase, "uppercase"),
            (counts.lowercase, self.min_lowercase, "lowercase"),
            (counts.special, self.min_special, "special"),
        ] {
            if have < want {
                reasons.push(format!("must contain at least {want} {class} characters"));
            }
        }

        if reasons.is_empty() {
            Ok(())
        } else {
            Err(PolicyViolation { reasons })
        }
    }
}

/// Structural check of a credential request followed by the password policy.
pub fn validate_credentials(
    request: &CredentialRequest,
    policy: &PasswordPolicy,
) -> Result<(), ValidationError> {
    if request.username.is_empty() {
        return Err(ValidationError::Missing("username is required"));
    }
    let password = request.password.expose_secret();
    if password.is_empty() {
        return Err(ValidationError::Missing("password is required"));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(ValidationError::TooLong {
            max: MAX_PASSWORD_BYTES,
        });
    }
    policy.validate(password)?;
    Ok(())
}
