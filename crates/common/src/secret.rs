//! Secret wrappers for passwords, signing keys and issued tokens.
//!
//! Re-exports [`secrecy`] so every crate in the workspace names the same
//! types. `SecretString` redacts itself in `Debug`, so a request struct that
//! derives `Debug` can be logged without leaking the password it carries.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct CreateUser {
//!     username: String,
//!     password: SecretString,
//! }
//!
//! let req = CreateUser {
//!     username: "alice".to_string(),
//!     password: SecretString::from("Passw0rd!"),
//! };
//!
//! assert!(!format!("{req:?}").contains("Passw0rd!"));
//! assert_eq!(req.password.expose_secret(), "Passw0rd!");
//! ```
//!
//! Use `SecretString` for user passwords, HMAC signing keys, PEM private keys
//! and issued bearer tokens.

pub use secrecy::{ExposeSecret, SecretString};

/// Returns a new secret with leading and trailing whitespace removed.
///
/// The trimmed copy never leaves a `SecretString`, so inbound passwords can be
/// normalized without an unwrapped `String` outliving the call.
#[must_use]
pub fn trim_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().trim())
}
