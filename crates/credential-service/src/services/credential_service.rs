//! Registration and authentication pipelines.
//!
//! Register: validate, look up, hash, persist. Authenticate: look up, verify,
//! issue. Nothing is retried. Each stage checks the request's cancellation
//! token first, and store calls and bcrypt tasks race against it, so a
//! cancelled registration never reaches `create`.

use crate::crypto;
use crate::errors::{CredentialError, Stage};
use crate::models::{CredentialRequest, Identity, NewUser};
use crate::observability::hash_for_correlation;
use crate::observability::metrics::CredentialMetrics;
use crate::policy::{validate_credentials, PasswordPolicy};
use crate::repositories::{StoreError, UserStore};
use crate::services::token_issuer::{IssuedToken, TokenIssuer};
use common::secret::SecretString;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

const DECOY_PASSWORD: &str = "decoy-password";

/// Stateless between calls; safe to share across concurrent requests.
pub struct CredentialService {
    store: Arc<dyn UserStore>,
    policy: PasswordPolicy,
    issuer: TokenIssuer,
    bcrypt_cost: u32,
    metrics: Arc<CredentialMetrics>,
    /// Hash verified for unknown usernames so both failure paths pay for bcrypt.
    decoy_hash: OnceCell<String>,
}

impl CredentialService {
    pub fn new(
        store: Arc<dyn UserStore>,
        policy: PasswordPolicy,
        issuer: TokenIssuer,
        bcrypt_cost: u32,
        metrics: Arc<CredentialMetrics>,
    ) -> Self {
        Self {
            store,
            policy,
            issuer,
            bcrypt_cost,
            metrics,
            decoy_hash: OnceCell::new(),
        }
    }

    pub fn metrics(&self) -> &Arc<CredentialMetrics> {
        &self.metrics
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Register a new user. No token is issued.
    #[instrument(skip_all, fields(user = %hash_for_correlation(&request.username)))]
    pub async fn register(
        &self,
        request: CredentialRequest,
        cancel: &CancellationToken,
    ) -> Result<(), CredentialError> {
        let result = self.run_register(request, cancel).await;
        let outcome = match &result {
            Ok(()) => "success",
            Err(e) => e.outcome(),
        };
        self.metrics.record_registration(outcome);
        result
    }

    /// Verify a credential and issue a token for it.
    #[instrument(skip_all, fields(user = %hash_for_correlation(&request.username)))]
    pub async fn authenticate(
        &self,
        request: CredentialRequest,
        cancel: &CancellationToken,
    ) -> Result<IssuedToken, CredentialError> {
        let result = self.run_authenticate(request, cancel).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.outcome(),
        };
        self.metrics.record_authentication(outcome);
        result
    }

    async fn run_register(
        &self,
        request: CredentialRequest,
        cancel: &CancellationToken,
    ) -> Result<(), CredentialError> {
        ensure_active(cancel, Stage::Validate)?;
        validate_credentials(&request, &self.policy).map_err(CredentialError::ValidationFailed)?;

        let CredentialRequest { username, password } = request;

        ensure_active(cancel, Stage::Lookup)?;
        let existing = race(cancel, Stage::Lookup, self.store.get(&username))
            .await?
            .map_err(|source| storage(Stage::Lookup, &username, source))?;
        if existing.is_some() {
            tracing::debug!(target: "cs.services.credential", "Username already registered");
            return Err(CredentialError::AlreadyExists { username });
        }

        ensure_active(cancel, Stage::Hash)?;
        let password_hash = self.hash(password, &username, cancel).await?;

        ensure_active(cancel, Stage::Persist)?;
        let new_user = NewUser {
            username,
            password_hash,
        };
        match race(cancel, Stage::Persist, self.store.create(&new_user)).await? {
            Ok(()) => {
                tracing::info!(target: "cs.services.credential", "User registered");
                Ok(())
            }
            // Lost a race with a concurrent registration after the pre-check passed.
            Err(StoreError::Duplicate { .. }) => Err(CredentialError::AlreadyExists {
                username: new_user.username,
            }),
            Err(source) => Err(storage(Stage::Persist, &new_user.username, source)),
        }
    }

    async fn run_authenticate(
        &self,
        request: CredentialRequest,
        cancel: &CancellationToken,
    ) -> Result<IssuedToken, CredentialError> {
        let CredentialRequest { username, password } = request;

        ensure_active(cancel, Stage::Lookup)?;
        let user = race(cancel, Stage::Lookup, self.store.get(&username))
            .await?
            .map_err(|source| storage(Stage::Lookup, &username, source))?;

        ensure_active(cancel, Stage::Verify)?;
        let Some(user) = user else {
            self.verify_decoy(password, cancel).await?;
            return Err(CredentialError::AuthenticationFailed);
        };

        if !self
            .verify(password, user.password_hash, &username, cancel)
            .await?
        {
            return Err(CredentialError::AuthenticationFailed);
        }

        ensure_active(cancel, Stage::Issue)?;
        let issued = self
            .issuer
            .issue(&Identity {
                username: username.clone(),
            })
            .map_err(|e| {
                self.metrics.record_token_failed();
                internal(Stage::Issue, &username, e.to_string())
            })?;
        self.metrics.record_token_issued();

        tracing::info!(target: "cs.services.credential", "User authenticated");
        Ok(issued)
    }

    async fn hash(
        &self,
        password: SecretString,
        username: &str,
        cancel: &CancellationToken,
    ) -> Result<String, CredentialError> {
        let cost = self.bcrypt_cost;
        let start = Instant::now();
        let joined = race(
            cancel,
            Stage::Hash,
            tokio::task::spawn_blocking(move || crypto::hash_password(&password, cost)),
        )
        .await?;
        self.metrics.record_bcrypt("hash", start.elapsed());

        joined
            .map_err(|e| internal(Stage::Hash, username, format!("hashing task failed: {e}")))?
            .map_err(|e| internal(Stage::Hash, username, e.to_string()))
    }

    async fn verify(
        &self,
        password: SecretString,
        hash: String,
        username: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, CredentialError> {
        let start = Instant::now();
        let joined = race(
            cancel,
            Stage::Verify,
            tokio::task::spawn_blocking(move || crypto::verify_password(&password, &hash)),
        )
        .await?;
        self.metrics.record_bcrypt("verify", start.elapsed());

        joined
            .map_err(|e| internal(Stage::Verify, username, format!("verify task failed: {e}")))?
            .map_err(|e| internal(Stage::Verify, username, e.to_string()))
    }

    /// Spend a bcrypt verification on an unknown username. The result is discarded.
    async fn verify_decoy(
        &self,
        password: SecretString,
        cancel: &CancellationToken,
    ) -> Result<(), CredentialError> {
        let cost = self.bcrypt_cost;
        let decoy = race(
            cancel,
            Stage::Verify,
            self.decoy_hash.get_or_try_init(|| async move {
                match tokio::task::spawn_blocking(move || {
                    crypto::hash_password(&SecretString::from(DECOY_PASSWORD), cost)
                })
                .await
                {
                    Ok(hashed) => hashed.map_err(|e| e.to_string()),
                    Err(e) => Err(format!("decoy hashing task failed: {e}")),
                }
            }),
        )
        .await?;

        let hash = match decoy {
            Ok(hash) => hash.clone(),
            Err(reason) => {
                tracing::warn!(
                    target: "cs.services.credential",
                    error = %reason,
                    "Decoy hash unavailable, unknown username skips bcrypt"
                );
                return Ok(());
            }
        };

        let start = Instant::now();
        let _verified = race(
            cancel,
            Stage::Verify,
            tokio::task::spawn_blocking(move || crypto::verify_password(&password, &hash)),
        )
        .await?;
        self.metrics.record_bcrypt("verify", start.elapsed());
        Ok(())
    }
}

fn ensure_active(cancel: &CancellationToken, stage: Stage) -> Result<(), CredentialError> {
    if cancel.is_cancelled() {
        tracing::debug!(target: "cs.services.credential", stage = %stage, "Request cancelled");
        return Err(CredentialError::Cancelled { stage });
    }
    Ok(())
}

/// Await `fut` unless the request is cancelled first.
async fn race<F: Future>(
    cancel: &CancellationToken,
    stage: Stage,
    fut: F,
) -> Result<F::Output, CredentialError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => {
            tracing::debug!(target: "cs.services.credential", stage = %stage, "Request cancelled");
            Err(CredentialError::Cancelled { stage })
        }
        out = fut => Ok(out),
    }
}

fn storage(stage: Stage, username: &str, source: StoreError) -> CredentialError {
    CredentialError::Storage {
        stage,
        username: username.to_string(),
        source,
    }
}

fn internal(stage: Stage, username: &str, reason: String) -> CredentialError {
    CredentialError::Internal {
        stage,
        username: username.to_string(),
        reason,
    }
}
