//! Generated Protocol Buffer code for the credential service.
//!
//! This crate contains the compiled `credentials.v1` definitions shared by
//! the gRPC server, the command-line client and the integration tests.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)] // Generated code has various doc formatting

// Re-export prost traits for convenience
pub use prost::Message;

// Generated protobuf modules
pub mod credentials {
    //! Username/password registration and authentication
    #![allow(clippy::all, clippy::pedantic)]
    tonic::include_proto!("credentials.v1");
}
