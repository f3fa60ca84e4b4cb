use super::{timed, StoreError, UserStore};
use crate::models::{NewUser, User};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::instrument;

/// User store on SQLite, either a file or an in-process memory database.
#[derive(Debug, Clone)]
pub struct SqliteUserStore {
    pool: SqlitePool,
}

impl SqliteUserStore {
    /// Open `url`, creating the database file if missing, and apply the schema.
    ///
    /// An in-memory database lives only as long as its connection, so the
    /// pool is pinned to one connection that never expires.
    pub async fn open(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Database(format!("Invalid SQLite URL: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool_options = if is_in_memory(url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to open SQLite database: {e}")))?;

        sqlx::migrate!("../../migrations/sqlite")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to apply schema: {e}")))?;

        Ok(Self { pool })
    }

    /// Open a fresh in-memory database.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open("sqlite::memory:", 1).await
    }

    /// Close the pool. Later calls fail with `StoreError::Database`.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

#[async_trait]
impl UserStore for SqliteUserStore {
    #[instrument(skip_all)]
    async fn get(&self, username: &str) -> Result<Option<User>, StoreError> {
        timed(self.backend(), "get", async {
            sqlx::query_as::<_, User>(
                r#"
                SELECT username, password_hash
                FROM users
                WHERE username = ?1
                "#,
            )
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to fetch user: {e}")))
        })
        .await
    }

    #[instrument(skip_all)]
    async fn create(&self, user: &NewUser) -> Result<(), StoreError> {
        timed(self.backend(), "create", async {
            sqlx::query(
                r#"
                INSERT INTO users (username, password_hash)
                VALUES (?1, ?2)
                "#,
            )
            .bind(&user.username)
            .bind(&user.password_hash)
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate {
                    username: user.username.clone(),
                },
                _ => StoreError::Database(format!("Failed to create user: {e}")),
            })
        })
        .await
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}
