//! End-to-end tests for the `Auth` gRPC service.
//!
//! Each test spawns a real server on an ephemeral port and talks to it with
//! the generated client.
//!
//! ## Test Naming
//!
//! Tests follow the convention: `test_<rpc>_<scenario>_<expected_result>`

use credential_service::config::DEFAULT_BCRYPT_COST;
use credential_service::repositories::InMemoryUserStore;
use credential_test_utils::*;
use proto_gen::credentials::{AuthenticateRequest, CreateUserRequest};
use std::sync::Arc;
use tonic::Code;

fn create_request(username: &str, password: &str) -> CreateUserRequest {
    CreateUserRequest {
        username: username.to_string(),
        password: password.to_string(),
    }
}

fn auth_request(username: &str, password: &str) -> AuthenticateRequest {
    AuthenticateRequest {
        username: username.to_string(),
        password: password.to_string(),
    }
}

// ============================================================================
// Registration and authentication flow
// ============================================================================

#[tokio::test]
async fn test_alice_full_flow() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestCredentialServer::spawn_in_memory().await?;
    let mut client = server.client().await?;

    // Act / Assert: first registration succeeds
    let created = client
        .create_user(create_request(ALICE, ALICE_PASSWORD))
        .await?
        .into_inner();
    assert!(created.success);

    // Re-registration with a different password is rejected
    let duplicate = client
        .create_user(create_request(ALICE, "Different1!"))
        .await
        .expect_err("second registration should fail");
    assert_eq!(duplicate.code(), Code::AlreadyExists);

    // Original password still authenticates
    let token = client
        .authenticate(auth_request(ALICE, ALICE_PASSWORD))
        .await?
        .into_inner()
        .token;
    token
        .assert_valid_jwt()
        .assert_signed_with_test_key()
        .assert_for_subject(ALICE)
        .assert_expires_in(TEST_TOKEN_EXPIRY.as_secs());

    // Wrong password fails
    let wrong = client
        .authenticate(auth_request(ALICE, "wrong"))
        .await
        .expect_err("wrong password should fail");
    assert_eq!(wrong.code(), Code::Unauthenticated);

    server.shutdown().await
}

#[tokio::test]
async fn test_authenticate_twice_issues_distinct_tokens() -> Result<(), anyhow::Error> {
    let server = TestCredentialServer::spawn_in_memory().await?;
    let mut client = server.client().await?;
    client.create_user(create_request(BOB, BOB_PASSWORD)).await?;

    let first = client
        .authenticate(auth_request(BOB, BOB_PASSWORD))
        .await?
        .into_inner()
        .token;
    let second = client
        .authenticate(auth_request(BOB, BOB_PASSWORD))
        .await?
        .into_inner()
        .token;

    first.assert_for_subject(BOB).assert_distinct_from(&second);
    Ok(())
}

#[tokio::test]
async fn test_create_user_trims_whitespace() -> Result<(), anyhow::Error> {
    let server = TestCredentialServer::spawn_in_memory().await?;
    let mut client = server.client().await?;

    client
        .create_user(create_request("  bob  ", &format!("\t{BOB_PASSWORD} ")))
        .await?;

    let token = client
        .authenticate(auth_request(BOB, BOB_PASSWORD))
        .await?
        .into_inner()
        .token;
    token.assert_for_subject(BOB);

    // Padded input on authenticate resolves to the same user.
    client
        .authenticate(auth_request(" bob", &format!("{BOB_PASSWORD}\n")))
        .await?;

    Ok(())
}

// ============================================================================
// Status codes
// ============================================================================

#[tokio::test]
async fn test_create_user_policy_violation_invalid_argument() -> Result<(), anyhow::Error> {
    let server = TestCredentialServer::spawn_in_memory().await?;
    let mut client = server.client().await?;

    let status = client
        .create_user(create_request("carol", "pAssword5"))
        .await
        .expect_err("password without special character");

    assert_eq!(status.code(), Code::InvalidArgument);
    assert!(status.message().starts_with("password validation error: "));
    assert!(status.message().contains("special"));
    assert!(!status.message().contains("pAssword5"));

    // Nothing was stored.
    let lookup = client
        .authenticate(auth_request("carol", "pAssword5"))
        .await
        .expect_err("user should not exist");
    assert_eq!(lookup.code(), Code::Unauthenticated);

    Ok(())
}

#[tokio::test]
async fn test_create_user_blank_fields_invalid_argument() -> Result<(), anyhow::Error> {
    let server = TestCredentialServer::spawn_in_memory().await?;
    let mut client = server.client().await?;

    for (username, password) in [("", ALICE_PASSWORD), ("   ", ALICE_PASSWORD), (ALICE, "  ")] {
        let status = client
            .create_user(create_request(username, password))
            .await
            .expect_err("blank field");
        assert_eq!(status.code(), Code::InvalidArgument, "{username:?}");
    }

    // Authenticate has no validation stage; a blank username is just unknown.
    let status = client
        .authenticate(auth_request("", ALICE_PASSWORD))
        .await
        .expect_err("blank username");
    assert_eq!(status.code(), Code::Unauthenticated);

    Ok(())
}

#[tokio::test]
async fn test_authenticate_unknown_user_indistinguishable() -> Result<(), anyhow::Error> {
    let server = TestCredentialServer::spawn_in_memory().await?;
    let mut client = server.client().await?;
    client
        .create_user(create_request(ALICE, ALICE_PASSWORD))
        .await?;

    let unknown = client
        .authenticate(auth_request("mallory", ALICE_PASSWORD))
        .await
        .expect_err("unknown user");
    let wrong = client
        .authenticate(auth_request(ALICE, "Wr0ng!pass"))
        .await
        .expect_err("wrong password");

    assert_eq!(unknown.code(), Code::Unauthenticated);
    assert_eq!(unknown.code(), wrong.code());
    assert_eq!(unknown.message(), wrong.message());

    Ok(())
}

#[tokio::test]
async fn test_concurrent_registration_single_winner() -> Result<(), anyhow::Error> {
    let server = TestCredentialServer::spawn_in_memory().await?;

    let mut tasks = Vec::new();
    for i in 0..8 {
        let mut client = server.client().await?;
        tasks.push(tokio::spawn(async move {
            client
                .create_user(create_request(ALICE, &format!("Secur3@pw{i}")))
                .await
        }));
    }

    let mut succeeded = 0;
    for task in tasks {
        match task.await? {
            Ok(_) => succeeded += 1,
            Err(status) => assert_eq!(status.code(), Code::AlreadyExists),
        }
    }
    assert_eq!(succeeded, 1, "exactly one registration should win");

    Ok(())
}

// ============================================================================
// Metrics
// ============================================================================

#[tokio::test]
async fn test_outcomes_are_counted() -> Result<(), anyhow::Error> {
    let server = TestCredentialServer::spawn_in_memory().await?;
    let mut client = server.client().await?;

    client
        .create_user(create_request(ALICE, ALICE_PASSWORD))
        .await?;
    let _ = client
        .create_user(create_request(ALICE, ALICE_PASSWORD))
        .await;
    client
        .authenticate(auth_request(ALICE, ALICE_PASSWORD))
        .await?;
    let _ = client.authenticate(auth_request(ALICE, "nope")).await;

    let snapshot = server.service().metrics().snapshot();
    assert_eq!(snapshot.registrations_succeeded, 1);
    assert_eq!(snapshot.registrations_failed, 1);
    assert_eq!(snapshot.authentications_succeeded, 1);
    assert_eq!(snapshot.authentications_failed, 1);
    assert_eq!(snapshot.tokens_issued, 1);

    Ok(())
}

// ============================================================================
// Server configuration
// ============================================================================

#[tokio::test]
async fn test_server_with_default_cost_service() -> Result<(), anyhow::Error> {
    let service = credential_service::services::CredentialService::new(
        Arc::new(InMemoryUserStore::new()),
        strict_policy(),
        credential_service::services::TokenIssuer::new(test_token_policy())?,
        DEFAULT_BCRYPT_COST,
        credential_service::observability::CredentialMetrics::new(),
    );
    let server =
        TestCredentialServer::spawn_with_service(Arc::new(service), TEST_REQUEST_TIMEOUT).await?;
    let mut client = server.client().await?;

    client
        .create_user(create_request(ALICE, ALICE_PASSWORD))
        .await?;
    client
        .authenticate(auth_request(ALICE, ALICE_PASSWORD))
        .await?
        .into_inner()
        .token
        .assert_valid_jwt();

    Ok(())
}
