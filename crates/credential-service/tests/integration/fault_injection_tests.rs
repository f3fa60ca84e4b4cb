//! Fault injection tests for storage loss and cancellation
//!
//! These are programmatic fault injection tests: the store's pool is closed
//! underneath a running server to simulate database unavailability.
//!
//! They validate that:
//! - Storage failures surface as `INTERNAL` with a generic message
//! - Error messages don't leak connection or driver details
//! - Server shutdown cancels work and refuses further requests

use credential_service::repositories::{SqliteUserStore, UserStore};
use credential_test_utils::*;
use proto_gen::credentials::{AuthenticateRequest, CreateUserRequest};
use std::sync::Arc;
use tonic::Code;

#[tokio::test]
async fn test_storage_loss_returns_internal_without_detail() -> Result<(), anyhow::Error> {
    // Arrange - server on a healthy SQLite store with one user
    let store = Arc::new(SqliteUserStore::open_in_memory().await?);
    let server = TestCredentialServer::spawn(Arc::clone(&store) as Arc<dyn UserStore>).await?;
    let mut client = server.client().await?;

    client
        .create_user(CreateUserRequest {
            username: ALICE.to_string(),
            password: ALICE_PASSWORD.to_string(),
        })
        .await?;

    // Act - close the pool
    store.close().await;

    // Assert - both RPCs fail with a generic internal status
    let create = client
        .create_user(CreateUserRequest {
            username: BOB.to_string(),
            password: BOB_PASSWORD.to_string(),
        })
        .await
        .expect_err("store is closed");
    assert_eq!(create.code(), Code::Internal);
    assert_eq!(create.message(), "storage unavailable");

    let auth = client
        .authenticate(AuthenticateRequest {
            username: ALICE.to_string(),
            password: ALICE_PASSWORD.to_string(),
        })
        .await
        .expect_err("store is closed");
    assert_eq!(auth.code(), Code::Internal);
    assert_eq!(auth.message(), "storage unavailable");
    assert!(!auth.message().to_lowercase().contains("pool"));
    assert!(!auth.message().contains(ALICE_PASSWORD));

    Ok(())
}

#[tokio::test]
async fn test_storage_loss_not_counted_as_token_issue() -> Result<(), anyhow::Error> {
    let store = Arc::new(SqliteUserStore::open_in_memory().await?);
    let server = TestCredentialServer::spawn(Arc::clone(&store) as Arc<dyn UserStore>).await?;
    let mut client = server.client().await?;

    store.close().await;
    let _ = client
        .authenticate(AuthenticateRequest {
            username: ALICE.to_string(),
            password: ALICE_PASSWORD.to_string(),
        })
        .await;

    let snapshot = server.service().metrics().snapshot();
    assert_eq!(snapshot.authentications_failed, 1);
    assert_eq!(snapshot.tokens_issued, 0);

    Ok(())
}

#[tokio::test]
async fn test_requests_fail_after_shutdown() -> Result<(), anyhow::Error> {
    let server = TestCredentialServer::spawn_in_memory().await?;
    let url = server.url();
    server.shutdown().await?;

    // Nothing is listening any more.
    let connect = proto_gen::credentials::auth_client::AuthClient::connect(url).await;
    assert!(connect.is_err(), "server should no longer accept connections");

    Ok(())
}
