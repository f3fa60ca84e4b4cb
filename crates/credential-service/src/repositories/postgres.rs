use super::{timed, StoreError, UserStore};
use crate::models::{NewUser, User};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::instrument;

/// SQLSTATE for `unique_violation`.
const PG_UNIQUE_VIOLATION: &str = "23505";

/// User store on PostgreSQL.
#[derive(Debug, Clone)]
pub struct PostgresUserStore {
    pool: PgPool,
}

impl PostgresUserStore {
    /// Connect and bring the schema up to date.
    ///
    /// Fails if the database is unreachable or the migrations cannot be applied.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to connect to PostgreSQL: {e}")))?;

        sqlx::migrate!("../../migrations/postgres")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to apply schema: {e}")))?;

        Ok(Self { pool })
    }

    /// Wrap a pool whose schema is already in place.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl UserStore for PostgresUserStore {
    #[instrument(skip_all)]
    async fn get(&self, username: &str) -> Result<Option<User>, StoreError> {
        timed(self.backend(), "get", async {
            sqlx::query_as::<_, User>(
                r#"
                SELECT username, password_hash
                FROM users
                WHERE username = $1
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
                VALUES ($1, $2)
                "#,
            )
            .bind(&user.username)
            .bind(&user.password_hash)
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| map_insert_error(e, &user.username))
        })
        .await
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

fn map_insert_error(err: sqlx::Error, username: &str) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(PG_UNIQUE_VIOLATION) || db.is_unique_violation() {
            return StoreError::Duplicate {
                username: username.to_string(),
            };
        }
    }
    StoreError::Database(format!("Failed to create user: {err}"))
}
