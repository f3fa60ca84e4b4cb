//! gRPC transport for the credential service.
//!
//! - `auth_service` - `Auth` service implementation (CreateUser, Authenticate)
//! - `tls` - server TLS and optional client-certificate verification

pub mod auth_service;
pub mod tls;

pub use auth_service::AuthGrpcService;
pub use tls::server_tls_config;

use proto_gen::credentials::auth_server::AuthServer;
use std::time::Duration;
use tonic::transport::server::Router;
use tonic::transport::{Server, ServerTlsConfig};

/// Assemble the gRPC server.
///
/// `request_timeout` is the per-request deadline. A client `grpc-timeout`
/// header shortens it but never extends it. A request that hits the deadline
/// is dropped, which cancels its pipeline.
pub fn build_server(
    service: AuthGrpcService,
    request_timeout: Duration,
    tls: Option<ServerTlsConfig>,
) -> Result<Router, tonic::transport::Error> {
    let mut builder = Server::builder().timeout(request_timeout);
    if let Some(tls) = tls {
        builder = builder.tls_config(tls)?;
    }
    Ok(builder.add_service(AuthServer::new(service)))
}
