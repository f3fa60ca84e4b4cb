//! Credential Service Library
//!
//! Registers username/password credentials and exchanges valid credentials
//! for signed, time-limited bearer tokens over gRPC.
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `crypto` - bcrypt password hashing and verification
//! - `errors` - `CredentialError` and its gRPC status mapping
//! - `grpc` - `Auth` service adapter, TLS, server assembly
//! - `models` - User records and credential requests
//! - `observability` - Health endpoints, metrics, correlation hashing
//! - `policy` - Password policy validation
//! - `repositories` - `UserStore` with Postgres, SQLite and in-memory backends
//! - `services` - Register/authenticate pipelines and token issuance

pub mod config;
pub mod crypto;
pub mod errors;
pub mod grpc;
pub mod models;
pub mod observability;
pub mod policy;
pub mod repositories;
pub mod services;
