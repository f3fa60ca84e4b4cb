//! Metrics for the credential service.
//!
//! All metrics use the `cs_` prefix. Counters end in `_total`, durations in
//! `_seconds`. Label values are bounded:
//! - `status`: success, already_exists, validation_failed, authentication_failed,
//!   storage_failure, internal_failure, cancelled
//! - `operation`: get, create (store); hash, verify (bcrypt)
//! - `backend`: postgres, sqlite, memory

use metrics::{counter, histogram};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Record a finished registration.
///
/// Metric: `cs_registrations_total`
/// Labels: `status`
pub fn record_registration(status: &str) {
    counter!("cs_registrations_total", "status" => status.to_string()).increment(1);
}

/// Record a finished authentication.
///
/// Metric: `cs_authentications_total`
/// Labels: `status`
pub fn record_authentication(status: &str) {
    counter!("cs_authentications_total", "status" => status.to_string()).increment(1);
}

/// Record bcrypt operation duration
///
/// Metric: `cs_bcrypt_duration_seconds`
/// Labels: `operation` (hash, verify)
pub fn record_bcrypt_duration(operation: &str, duration: Duration) {
    histogram!("cs_bcrypt_duration_seconds", "operation" => operation.to_string())
        .record(duration.as_secs_f64());
}

/// Record token signing outcome
///
/// Metric: `cs_token_issuance_total`
/// Labels: `status`
pub fn record_token_issuance(status: &str) {
    counter!("cs_token_issuance_total", "status" => status.to_string()).increment(1);
}

/// Record a user store call.
///
/// Metric: `cs_store_operation_duration_seconds`
/// Labels: `backend`, `operation`, `status`
pub fn record_store_operation(backend: &str, operation: &str, status: &str, duration: Duration) {
    histogram!("cs_store_operation_duration_seconds",
        "backend" => backend.to_string(),
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a failed RPC by category.
///
/// Metric: `cs_errors_total`
/// Labels: `operation`, `error_category`, `grpc_code`
pub fn record_error(operation: &str, error_category: &str, grpc_code: i32) {
    counter!("cs_errors_total",
        "operation" => operation.to_string(),
        "error_category" => error_category.to_string(),
        "grpc_code" => grpc_code.to_string()
    )
    .increment(1);
}

/// Pipeline outcome counters, shared by handle.
///
/// Each `record_*` call bumps a local atomic and emits to the `metrics`
/// facade, so tests can read counts without a global recorder.
#[derive(Debug, Default)]
pub struct CredentialMetrics {
    registrations_succeeded: AtomicU64,
    registrations_failed: AtomicU64,
    authentications_succeeded: AtomicU64,
    authentications_failed: AtomicU64,
    tokens_issued: AtomicU64,
}

/// Point-in-time copy of [`CredentialMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialMetricsSnapshot {
    pub registrations_succeeded: u64,
    pub registrations_failed: u64,
    pub authentications_succeeded: u64,
    pub authentications_failed: u64,
    pub tokens_issued: u64,
}

impl CredentialMetrics {
    /// Create a new shared metrics instance.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_registration(&self, status: &str) {
        let counter = if status == "success" {
            &self.registrations_succeeded
        } else {
            &self.registrations_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
        record_registration(status);
    }

    pub fn record_authentication(&self, status: &str) {
        let counter = if status == "success" {
            &self.authentications_succeeded
        } else {
            &self.authentications_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
        record_authentication(status);
    }

    pub fn record_token_issued(&self) {
        self.tokens_issued.fetch_add(1, Ordering::Relaxed);
        record_token_issuance("success");
    }

    pub fn record_token_failed(&self) {
        record_token_issuance("error");
    }

    pub fn record_bcrypt(&self, operation: &str, duration: Duration) {
        record_bcrypt_duration(operation, duration);
    }

    #[must_use]
    pub fn snapshot(&self) -> CredentialMetricsSnapshot {
        CredentialMetricsSnapshot {
            registrations_succeeded: self.registrations_succeeded.load(Ordering::Relaxed),
            registrations_failed: self.registrations_failed.load(Ordering::Relaxed),
            authentications_succeeded: self.authentications_succeeded.load(Ordering::Relaxed),
            authentications_failed: self.authentications_failed.load(Ordering::Relaxed),
            tokens_issued: self.tokens_issued.load(Ordering::Relaxed),
        }
    }
}
