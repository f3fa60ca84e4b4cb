pub mod credential_service;
pub mod token_issuer;

pub use credential_service::CredentialService;
pub use token_issuer::{IssuedToken, TokenError, TokenIssuer, TokenPolicy, UserClaims};
