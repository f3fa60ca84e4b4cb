//! User store backends.
//!
//! Every backend enforces username uniqueness itself. `create` on a taken
//! username returns [`StoreError::Duplicate`] even when a caller's earlier
//! `get` saw nothing.

mod memory;
mod postgres;
mod sqlite;

pub use memory::InMemoryUserStore;
pub use postgres::PostgresUserStore;
pub use sqlite::SqliteUserStore;

use crate::config::{DatabaseConfig, DatabaseKind};
use crate::models::{NewUser, User};
use crate::observability::metrics::record_store_operation;
use async_trait::async_trait;
use common::secret::ExposeSecret;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("User already exists: {username}")]
    Duplicate { username: String },

    #[error("Database error: {0}")]
    Database(String),
}

/// Persistence for user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fetch a user. A missing user is `Ok(None)`, not an error.
    async fn get(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Insert a new user, rejecting a taken username with `StoreError::Duplicate`.
    async fn create(&self, user: &NewUser) -> Result<(), StoreError>;

    /// Backend label for logs and metrics.
    fn backend(&self) -> &'static str;
}

/// Open the store selected by configuration.
pub async fn connect_store(config: &DatabaseConfig) -> Result<Arc<dyn UserStore>, StoreError> {
    let store: Arc<dyn UserStore> = match config.kind {
        DatabaseKind::Postgres => Arc::new(
            PostgresUserStore::connect(config.url.expose_secret(), config.max_connections).await?,
        ),
        DatabaseKind::Sqlite => Arc::new(
            SqliteUserStore::open(config.url.expose_secret(), config.max_connections).await?,
        ),
        DatabaseKind::Memory => Arc::new(InMemoryUserStore::new()),
    };

    tracing::info!(
        target: "cs.repositories",
        backend = store.backend(),
        "User store ready"
    );

    Ok(store)
}

/// Run one store call and record its duration and outcome.
pub(crate) async fn timed<T, F>(
    backend: &'static str,
    operation: &'static str,
    call: F,
) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    let start = Instant::now();
    let result = call.await;
    let status = match &result {
        Ok(_) => "success",
        Err(StoreError::Duplicate { .. }) => "duplicate",
        Err(StoreError::Database(_)) => "error",
    };
    record_store_operation(backend, operation, status, start.elapsed());
    result
}
