//! # Credential Test Utilities
//!
//! Shared test utilities for the credential service.
//!
//! This crate provides:
//! - Fixed fixtures (signing key, policies, sample credentials)
//! - Server test harness (`TestCredentialServer` for gRPC tests)
//! - Custom assertions (`TokenAssertions` trait)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use credential_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let server = TestCredentialServer::spawn_in_memory().await?;
//!     let mut client = server.client().await?;
//!
//!     let token = client.authenticate(/* ... */).await?.into_inner().token;
//!     token.assert_valid_jwt().assert_for_subject(ALICE);
//!     Ok(())
//! }
//! ```

pub mod assertions;
pub mod fixtures;
pub mod server_harness;

pub use assertions::*;
pub use fixtures::*;
pub use server_harness::*;
