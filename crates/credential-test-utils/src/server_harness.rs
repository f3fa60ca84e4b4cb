//! Test server harness for gRPC tests
//!
//! Provides `TestCredentialServer` for running the real `Auth` service on an
//! ephemeral port.

use crate::fixtures::test_credential_service;
use credential_service::grpc::{build_server, AuthGrpcService};
use credential_service::repositories::{InMemoryUserStore, SqliteUserStore, UserStore};
use credential_service::services::CredentialService;
use proto_gen::credentials::auth_client::AuthClient;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::Channel;

/// Default per-request deadline for harness servers.
pub const TEST_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Test harness for running the credential service over gRPC
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_auth_flow() -> anyhow::Result<()> {
///     let server = TestCredentialServer::spawn_in_memory().await?;
///     let mut client = server.client().await?;
///
///     let response = client.create_user(CreateUserRequest { .. }).await?;
///     assert!(response.into_inner().success);
///     Ok(())
/// }
/// ```
pub struct TestCredentialServer {
    addr: SocketAddr,
    service: Arc<CredentialService>,
    shutdown: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl TestCredentialServer {
    /// Spawn a server backed by `store`.
    ///
    /// Binds 127.0.0.1:0 and serves in the background until `shutdown` is
    /// called or the harness is dropped.
    pub async fn spawn(store: Arc<dyn UserStore>) -> Result<Self, anyhow::Error> {
        let service = Arc::new(test_credential_service(store)?);
        Self::spawn_with_service(service, TEST_REQUEST_TIMEOUT).await
    }

    pub async fn spawn_in_memory() -> Result<Self, anyhow::Error> {
        Self::spawn(Arc::new(InMemoryUserStore::new())).await
    }

    pub async fn spawn_sqlite() -> Result<Self, anyhow::Error> {
        let store = SqliteUserStore::open_in_memory()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to open SQLite store: {}", e))?;
        Self::spawn(Arc::new(store)).await
    }

    /// Spawn a server around an already-built service.
    pub async fn spawn_with_service(
        service: Arc<CredentialService>,
        request_timeout: Duration,
    ) -> Result<Self, anyhow::Error> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let shutdown = CancellationToken::new();
        let router = build_server(
            AuthGrpcService::new(Arc::clone(&service), shutdown.clone()),
            request_timeout,
            None,
        )?;

        let server_shutdown = shutdown.child_token();
        let handle = tokio::spawn(async move {
            let incoming = TcpListenerStream::new(listener);
            let result = router
                .serve_with_incoming_shutdown(incoming, async move {
                    server_shutdown.cancelled().await;
                })
                .await;
            if let Err(e) = result {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            service,
            shutdown,
            handle: Some(handle),
        })
    }

    /// Get the base URL of the test server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The service behind the server, for inspecting metrics.
    pub fn service(&self) -> &Arc<CredentialService> {
        &self.service
    }

    /// Connect a new client to the server.
    pub async fn client(&self) -> Result<AuthClient<Channel>, anyhow::Error> {
        let channel = Channel::from_shared(self.url())?
            .timeout(TEST_REQUEST_TIMEOUT)
            .connect()
            .await?;
        Ok(AuthClient::new(channel))
    }

    /// Cancel in-flight requests and wait for the server to stop.
    pub async fn shutdown(mut self) -> Result<(), anyhow::Error> {
        self.shutdown.cancel();
        if let Some(handle) = self.handle.take() {
            handle.await?;
        }
        Ok(())
    }
}

impl Drop for TestCredentialServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
