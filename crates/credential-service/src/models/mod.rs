use common::secret::SecretString;
use sqlx::FromRow;
use std::fmt;

/// Stored user record (maps to users table)
///
/// `password_hash` is a bcrypt string, never the plaintext.
#[derive(Clone, PartialEq, Eq, FromRow)]
pub struct User {
    pub username: String,
    pub password_hash: String,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("username", &self.username)
            .field("password_hash", &"[REDACTED]")
            .finish()
    }
}

/// Row handed to `UserStore::create`.
#[derive(Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("password_hash", &"[REDACTED]")
            .finish()
    }
}

impl From<NewUser> for User {
    fn from(user: NewUser) -> Self {
        User {
            username: user.username,
            password_hash: user.password_hash,
        }
    }
}

/// Username/password pair for one register or authenticate call.
///
/// Debug output redacts the password.
#[derive(Debug, Clone)]
pub struct CredentialRequest {
    pub username: String,
    pub password: SecretString,
}

impl CredentialRequest {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// A verified principal, the input to token issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
}
