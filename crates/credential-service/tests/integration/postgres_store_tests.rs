//! PostgreSQL store tests.
//!
//! Enabled with `--features postgres-tests`; `#[sqlx::test]` creates an
//! isolated database per test from `DATABASE_URL`.

use credential_service::errors::CredentialError;
use credential_service::models::{CredentialRequest, NewUser};
use credential_service::repositories::{PostgresUserStore, StoreError, UserStore};
use credential_test_utils::*;
use proto_gen::credentials::{AuthenticateRequest, CreateUserRequest};
use sqlx::PgPool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tonic::Code;

fn new_user(username: &str, hash: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        password_hash: hash.to_string(),
    }
}

#[sqlx::test(migrations = "../../migrations/postgres")]
async fn test_create_then_get(pool: PgPool) -> Result<(), anyhow::Error> {
    let store = PostgresUserStore::from_pool(pool);

    store.create(&new_user(ALICE, "hash-1")).await?;

    let user = store.get(ALICE).await?.expect("user exists");
    assert_eq!(user.username, ALICE);
    assert_eq!(user.password_hash, "hash-1");
    assert!(store.get("nobody").await?.is_none());

    Ok(())
}

#[sqlx::test(migrations = "../../migrations/postgres")]
async fn test_duplicate_is_rejected_by_constraint(pool: PgPool) -> Result<(), anyhow::Error> {
    let store = PostgresUserStore::from_pool(pool);
    store.create(&new_user(ALICE, "hash-1")).await?;

    let err = store
        .create(&new_user(ALICE, "hash-2"))
        .await
        .expect_err("duplicate username");
    assert!(matches!(err, StoreError::Duplicate { ref username } if username == ALICE));

    let user = store.get(ALICE).await?.expect("user exists");
    assert_eq!(user.password_hash, "hash-1");

    Ok(())
}

#[sqlx::test(migrations = "../../migrations/postgres")]
async fn test_usernames_are_case_sensitive(pool: PgPool) -> Result<(), anyhow::Error> {
    let store = PostgresUserStore::from_pool(pool);
    store.create(&new_user("alice", "h1")).await?;
    store.create(&new_user("Alice", "h2")).await?;
    Ok(())
}

#[sqlx::test(migrations = "../../migrations/postgres")]
async fn test_service_flow(pool: PgPool) -> Result<(), anyhow::Error> {
    let service = test_credential_service(Arc::new(PostgresUserStore::from_pool(pool)))?;
    let cancel = CancellationToken::new();

    service
        .register(CredentialRequest::new(ALICE, ALICE_PASSWORD), &cancel)
        .await?;
    let duplicate = service
        .register(CredentialRequest::new(ALICE, "Different1!"), &cancel)
        .await
        .expect_err("duplicate");
    assert!(matches!(duplicate, CredentialError::AlreadyExists { .. }));

    service
        .authenticate(CredentialRequest::new(ALICE, ALICE_PASSWORD), &cancel)
        .await?;

    Ok(())
}

#[sqlx::test(migrations = "../../migrations/postgres")]
async fn test_closed_pool_returns_internal(pool: PgPool) -> Result<(), anyhow::Error> {
    let store = Arc::new(PostgresUserStore::from_pool(pool));
    let server = TestCredentialServer::spawn(Arc::clone(&store) as Arc<dyn UserStore>).await?;
    let mut client = server.client().await?;

    client
        .create_user(CreateUserRequest {
            username: ALICE.to_string(),
            password: ALICE_PASSWORD.to_string(),
        })
        .await?;

    store.close().await;

    let status = client
        .authenticate(AuthenticateRequest {
            username: ALICE.to_string(),
            password: ALICE_PASSWORD.to_string(),
        })
        .await
        .expect_err("pool closed");
    assert_eq!(status.code(), Code::Internal);
    assert_eq!(status.message(), "storage unavailable");

    Ok(())
}
