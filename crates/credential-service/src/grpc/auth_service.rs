//! `Auth` gRPC service.
//!
//! Trims surrounding whitespace from username and password, runs the
//! matching pipeline and maps its outcome to a status code:
//!
//! | Outcome | Code |
//! |---|---|
//! | ValidationFailed | `INVALID_ARGUMENT` |
//! | AlreadyExists | `ALREADY_EXISTS` |
//! | AuthenticationFailed | `UNAUTHENTICATED` |
//! | Storage / Internal | `INTERNAL` |
//! | Cancelled | `CANCELLED` |

use crate::errors::CredentialError;
use crate::models::CredentialRequest;
use crate::observability::{hash_for_correlation, record_rpc_error, ErrorCategory};
use crate::services::CredentialService;
use common::secret::{trim_secret, ExposeSecret, SecretString};
use proto_gen::credentials::auth_server::Auth;
use proto_gen::credentials::{
    AuthenticateRequest, AuthenticateResponse, CreateUserRequest, CreateUserResponse,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};
use tracing::{debug, error, info, instrument};

pub struct AuthGrpcService {
    service: Arc<CredentialService>,
    /// Parent of every per-request token; cancelled on server shutdown.
    shutdown: CancellationToken,
}

impl AuthGrpcService {
    #[must_use]
    pub fn new(service: Arc<CredentialService>, shutdown: CancellationToken) -> Self {
        Self { service, shutdown }
    }

    fn credentials(username: &str, password: String) -> CredentialRequest {
        CredentialRequest {
            username: username.trim().to_string(),
            password: trim_secret(&SecretString::from(password)),
        }
    }

    fn reject(rpc: &'static str, username: &str, err: CredentialError) -> Status {
        record_rpc_error(rpc, &err);
        let category = ErrorCategory::from(&err);

        if category.is_server_fault() {
            error!(
                target: "cs.grpc.auth_service",
                rpc,
                user = %hash_for_correlation(username),
                stage = err.stage().map(|s| s.as_str()).unwrap_or("unknown"),
                error_category = category.as_str(),
                error = %err,
                "Request failed"
            );
        } else {
            debug!(
                target: "cs.grpc.auth_service",
                rpc,
                user = %hash_for_correlation(username),
                outcome = err.outcome(),
                "Request rejected"
            );
        }

        Status::from(err)
    }
}

#[tonic::async_trait]
impl Auth for AuthGrpcService {
    #[instrument(skip_all, fields(rpc = "CreateUser"))]
    async fn create_user(
        &self,
        request: Request<CreateUserRequest>,
    ) -> Result<Response<CreateUserResponse>, Status> {
        let inner = request.into_inner();
        let credentials = Self::credentials(&inner.username, inner.password);
        let username = credentials.username.clone();

        let cancel = self.shutdown.child_token();
        // Dropping the handler (deadline exceeded) cancels the pipeline.
        let _cancel_on_drop = cancel.clone().drop_guard();

        match self.service.register(credentials, &cancel).await {
            Ok(()) => {
                info!(
                    target: "cs.grpc.auth_service",
                    user = %hash_for_correlation(&username),
                    "User created"
                );
                Ok(Response::new(CreateUserResponse { success: true }))
            }
            Err(e) => Err(Self::reject("CreateUser", &username, e)),
        }
    }

    #[instrument(skip_all, fields(rpc = "Authenticate"))]
    async fn authenticate(
        &self,
        request: Request<AuthenticateRequest>,
    ) -> Result<Response<AuthenticateResponse>, Status> {
        let inner = request.into_inner();
        let credentials = Self::credentials(&inner.username, inner.password);
        let username = credentials.username.clone();

        let cancel = self.shutdown.child_token();
        let _cancel_on_drop = cancel.clone().drop_guard();

        match self.service.authenticate(credentials, &cancel).await {
            Ok(issued) => {
                debug!(
                    target: "cs.grpc.auth_service",
                    user = %hash_for_correlation(&username),
                    expires_at = %issued.expires_at,
                    "Token issued"
                );
                Ok(Response::new(AuthenticateResponse {
                    token: issued.token.expose_secret().to_string(),
                }))
            }
            Err(e) => Err(Self::reject("Authenticate", &username, e)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_BCRYPT_COST;
    use crate::observability::CredentialMetrics;
    use crate::policy::PasswordPolicy;
    use crate::repositories::InMemoryUserStore;
    use crate::services::{TokenIssuer, TokenPolicy};
    use jsonwebtoken::Algorithm;
    use std::time::Duration;
    use tonic::Code;

    fn grpc_service(shutdown: CancellationToken) -> AuthGrpcService {
        let issuer = TokenIssuer::new(TokenPolicy {
            algorithm: Algorithm::HS256,
            signing_key: SecretString::from("grpc-test-key"),
            issuer: "issuer".to_string(),
            audience: "audience".to_string(),
            expiry: Duration::from_secs(60),
        })
        .expect("issuer");
        let policy = PasswordPolicy {
            min_length: 8,
            min_uppercase: 1,
            min_numeric: 1,
            min_special: 1,
            ..PasswordPolicy::default()
        };
        let service = CredentialService::new(
            Arc::new(InMemoryUserStore::new()),
            policy,
            issuer,
            DEFAULT_BCRYPT_COST,
            CredentialMetrics::new(),
        );
        AuthGrpcService::new(Arc::new(service), shutdown)
    }

    fn create(username: &str, password: &str) -> Request<CreateUserRequest> {
        Request::new(CreateUserRequest {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    fn auth(username: &str, password: &str) -> Request<AuthenticateRequest> {
        Request::new(AuthenticateRequest {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    #[test]
    fn test_credentials_are_trimmed() {
        let request = AuthGrpcService::credentials("  bob \t", "\n Secur3@pw  ".to_string());
        assert_eq!(request.username, "bob");
        assert_eq!(request.password.expose_secret(), "Secur3@pw");
    }

    #[tokio::test]
    async fn test_create_then_authenticate() {
        let svc = grpc_service(CancellationToken::new());

        let created = svc
            .create_user(create("alice", "Secur3@pw"))
            .await
            .expect("create");
        assert!(created.into_inner().success);

        let token = svc
            .authenticate(auth("alice", "Secur3@pw"))
            .await
            .expect("authenticate")
            .into_inner()
            .token;
        assert_eq!(token.split('.').count(), 3);
    }

    #[tokio::test]
    async fn test_whitespace_padded_registration_authenticates_trimmed() {
        let svc = grpc_service(CancellationToken::new());

        svc.create_user(create("  bob  ", " Secur3@pw "))
            .await
            .expect("create");
        svc.authenticate(auth("bob", "Secur3@pw"))
            .await
            .expect("trimmed credentials authenticate");
    }

    #[tokio::test]
    async fn test_status_codes() {
        let svc = grpc_service(CancellationToken::new());
        svc.create_user(create("alice", "Secur3@pw"))
            .await
            .expect("create");

        let duplicate = svc
            .create_user(create("alice", "Different1!"))
            .await
            .expect_err("duplicate");
        assert_eq!(duplicate.code(), Code::AlreadyExists);

        let invalid = svc
            .create_user(create("carol", "pAssword5"))
            .await
            .expect_err("invalid");
        assert_eq!(invalid.code(), Code::InvalidArgument);
        assert!(invalid.message().contains("special"));

        let blank = svc
            .create_user(create("   ", "Secur3@pw"))
            .await
            .expect_err("blank username");
        assert_eq!(blank.code(), Code::InvalidArgument);

        let wrong = svc
            .authenticate(auth("alice", "wrong"))
            .await
            .expect_err("wrong password");
        assert_eq!(wrong.code(), Code::Unauthenticated);

        let unknown = svc
            .authenticate(auth("nobody", "Secur3@pw"))
            .await
            .expect_err("unknown user");
        assert_eq!(unknown.code(), Code::Unauthenticated);
        assert_eq!(unknown.message(), wrong.message());
    }

    #[tokio::test]
    async fn test_shutdown_cancels_requests() {
        let shutdown = CancellationToken::new();
        let svc = grpc_service(shutdown.clone());
        shutdown.cancel();

        let status = svc
            .create_user(create("alice", "Secur3@pw"))
            .await
            .expect_err("cancelled");
        assert_eq!(status.code(), Code::Cancelled);
    }
}
