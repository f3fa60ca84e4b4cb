//! Backend parity tests.
//!
//! The same register/authenticate flow runs against every store that works
//! without external infrastructure.

use common::secret::{ExposeSecret, SecretString};
use credential_service::config::{DatabaseConfig, DatabaseKind};
use credential_service::errors::CredentialError;
use credential_service::models::CredentialRequest;
use credential_service::repositories::{
    connect_store, InMemoryUserStore, SqliteUserStore, UserStore,
};
use credential_test_utils::*;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

async fn backends() -> Result<Vec<Arc<dyn UserStore>>, anyhow::Error> {
    let memory: Arc<dyn UserStore> = Arc::new(InMemoryUserStore::new());
    let sqlite: Arc<dyn UserStore> = Arc::new(SqliteUserStore::open_in_memory().await?);
    Ok(vec![memory, sqlite])
}

#[tokio::test]
async fn test_flow_is_identical_across_backends() -> Result<(), anyhow::Error> {
    for store in backends().await? {
        let backend = store.backend();
        let service = test_credential_service(Arc::clone(&store))?;
        let cancel = CancellationToken::new();

        service
            .register(CredentialRequest::new(ALICE, ALICE_PASSWORD), &cancel)
            .await?;

        let duplicate = service
            .register(CredentialRequest::new(ALICE, "Different1!"), &cancel)
            .await
            .expect_err("duplicate registration");
        assert!(
            matches!(duplicate, CredentialError::AlreadyExists { .. }),
            "{backend}: {duplicate:?}"
        );

        let stored = store.get(ALICE).await?.expect("user stored");
        assert!(stored.password_hash.starts_with("$2"), "{backend}");
        assert_ne!(stored.password_hash, ALICE_PASSWORD, "{backend}");

        let token = service
            .authenticate(CredentialRequest::new(ALICE, ALICE_PASSWORD), &cancel)
            .await?
            .token;
        token
            .expose_secret()
            .to_string()
            .assert_valid_jwt()
            .assert_for_subject(ALICE);

        let wrong = service
            .authenticate(CredentialRequest::new(ALICE, "wrong"), &cancel)
            .await
            .expect_err("wrong password");
        assert!(
            matches!(wrong, CredentialError::AuthenticationFailed),
            "{backend}: {wrong:?}"
        );
    }

    Ok(())
}

#[tokio::test]
async fn test_grpc_over_sqlite() -> Result<(), anyhow::Error> {
    use proto_gen::credentials::{AuthenticateRequest, CreateUserRequest};

    let server = TestCredentialServer::spawn_sqlite().await?;
    let mut client = server.client().await?;

    client
        .create_user(CreateUserRequest {
            username: BOB.to_string(),
            password: BOB_PASSWORD.to_string(),
        })
        .await?;

    client
        .authenticate(AuthenticateRequest {
            username: BOB.to_string(),
            password: BOB_PASSWORD.to_string(),
        })
        .await?
        .into_inner()
        .token
        .assert_signed_with_test_key()
        .assert_for_subject(BOB);

    Ok(())
}

#[tokio::test]
async fn test_connect_store_selects_backend() -> Result<(), anyhow::Error> {
    let memory = connect_store(&DatabaseConfig {
        kind: DatabaseKind::Memory,
        url: SecretString::from(String::new()),
        max_connections: 1,
    })
    .await?;
    assert_eq!(memory.backend(), "memory");

    let sqlite = connect_store(&DatabaseConfig {
        kind: DatabaseKind::Sqlite,
        url: SecretString::from("sqlite::memory:"),
        max_connections: 1,
    })
    .await?;
    assert_eq!(sqlite.backend(), "sqlite");

    Ok(())
}

#[tokio::test]
async fn test_sqlite_file_survives_reopen() -> Result<(), anyhow::Error> {
    let path = std::env::temp_dir().join(format!("credential-it-{}.db", std::process::id()));
    let _ = std::fs::remove_file(&path);
    let url = format!("sqlite://{}", path.display());
    let cancel = CancellationToken::new();

    {
        let store: Arc<dyn UserStore> = Arc::new(SqliteUserStore::open(&url, 2).await?);
        test_credential_service(store)?
            .register(CredentialRequest::new(ALICE, ALICE_PASSWORD), &cancel)
            .await?;
    }

    let store: Arc<dyn UserStore> = Arc::new(SqliteUserStore::open(&url, 2).await?);
    test_credential_service(store)?
        .authenticate(CredentialRequest::new(ALICE, ALICE_PASSWORD), &cancel)
        .await?;

    let _ = std::fs::remove_file(&path);
    Ok(())
}
