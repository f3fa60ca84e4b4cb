use crate::policy::PasswordPolicy;
use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default gRPC listener address.
pub const DEFAULT_GRPC_BIND_ADDRESS: &str = "0.0.0.0:50051";

/// Default health/metrics HTTP listener address.
pub const DEFAULT_HEALTH_BIND_ADDRESS: &str = "0.0.0.0:8081";

/// Default per-request deadline applied by the gRPC server.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 10;

/// Default SQLite database file.
pub const DEFAULT_SQLITE_URL: &str = "sqlite://credentials.db";

/// Default size of the database connection pool.
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

/// Default bcrypt work factor (2^10 rounds).
pub const DEFAULT_BCRYPT_COST: u32 = 10;

/// Lowest bcrypt cost the service accepts.
pub const MIN_BCRYPT_COST: u32 = 10;

/// Highest bcrypt cost the service accepts. Above this, hashing latency exceeds a second.
pub const MAX_BCRYPT_COST: u32 = 14;

/// Default JWT signing algorithm.
pub const DEFAULT_TOKEN_ALGORITHM: &str = "HS256";

/// Default token lifetime.
pub const DEFAULT_TOKEN_EXPIRY_MINUTES: u64 = 60;

/// Default `iss` claim.
pub const DEFAULT_TOKEN_ISSUER: &str = "credential-service";

/// Default `aud` claim.
pub const DEFAULT_TOKEN_AUDIENCE: &str = "credential-service";

/// Which user store backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseKind {
    Postgres,
    Sqlite,
    Memory,
}

impl DatabaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseKind::Postgres => "postgres",
            DatabaseKind::Sqlite => "sqlite",
            DatabaseKind::Memory => "memory",
        }
    }
}

impl std::str::FromStr for DatabaseKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(DatabaseKind::Postgres),
            "sqlite" | "sqlite3" => Ok(DatabaseKind::Sqlite),
            "memory" | "in-memory" | "inmemory" => Ok(DatabaseKind::Memory),
            other => Err(ConfigError::InvalidValue {
                var: "CS_DATABASE_TYPE".to_string(),
                reason: format!("unknown database type '{other}' (expected postgres, sqlite or memory)"),
            }),
        }
    }
}

/// Store connection settings.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub kind: DatabaseKind,
    /// Connection URL. May embed a password, so it is kept secret.
    pub url: SecretString,
    pub max_connections: u32,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("kind", &self.kind)
            .field("url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// Signing settings for issued tokens.
#[derive(Clone)]
pub struct TokenConfig {
    pub algorithm: String,
    pub signing_key: SecretString,
    pub issuer: String,
    pub audience: String,
    pub expiry: Duration,
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("algorithm", &self.algorithm)
            .field("signing_key", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Transport security for the gRPC listener.
///
/// When `ca_file` is set, clients must present a certificate signed by it.
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    pub enabled: bool,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    pub ca_file: Option<PathBuf>,
}

/// Service configuration, loaded from `CS_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub grpc_bind_address: String,
    pub health_bind_address: String,
    pub request_timeout: Duration,
    pub database: DatabaseConfig,
    pub password_policy: PasswordPolicy,
    pub token: TokenConfig,
    pub bcrypt_cost: u32,
    pub tls: TlsConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing)
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let grpc_bind_address = vars
            .get("CS_GRPC_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_GRPC_BIND_ADDRESS.to_string());

        let health_bind_address = vars
            .get("CS_HEALTH_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HEALTH_BIND_ADDRESS.to_string());

        let timeout_secs = parse_or(
            vars,
            "CS_REQUEST_TIMEOUT_SECONDS",
            DEFAULT_REQUEST_TIMEOUT_SECONDS,
        )?;
        if timeout_secs == 0 {
            return Err(invalid("CS_REQUEST_TIMEOUT_SECONDS", "must be greater than 0"));
        }

        let database = database_from_vars(vars)?;

        let password_policy = PasswordPolicy {
            min_length: parse_or(vars, "CS_PASSWORD_MIN_LENGTH", 0)?,
            min_numeric: parse_or(vars, "CS_PASSWORD_MIN_NUMERIC", 0)?,
            min_uppercase: parse_or(vars, "CS_PASSWORD_MIN_UPPERCASE", 0)?,
            min_lowercase: parse_or(vars, "CS_PASSWORD_MIN_LOWERCASE", 0)?,
            min_special: parse_or(vars, "CS_PASSWORD_MIN_SPECIAL", 0)?,
        };

        let token = token_from_vars(vars)?;

        let bcrypt_cost = parse_or(vars, "CS_BCRYPT_COST", DEFAULT_BCRYPT_COST)?;
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&bcrypt_cost) {
            return Err(invalid(
                "CS_BCRYPT_COST",
                &format!("{bcrypt_cost} is outside {MIN_BCRYPT_COST}..={MAX_BCRYPT_COST}"),
            ));
        }

        let tls = tls_from_vars(vars)?;

        Ok(Config {
            grpc_bind_address,
            health_bind_address,
            request_timeout: Duration::from_secs(timeout_secs),
            database,
            password_policy,
            token,
            bcrypt_cost,
            tls,
        })
    }
}

fn database_from_vars(vars: &HashMap<String, String>) -> Result<DatabaseConfig, ConfigError> {
    let kind = match vars.get("CS_DATABASE_TYPE") {
        Some(value) => value.parse()?,
        None => DatabaseKind::Sqlite,
    };

    let url = match (kind, vars.get("DATABASE_URL")) {
        (_, Some(url)) => url.clone(),
        (DatabaseKind::Postgres, None) => {
            return Err(ConfigError::MissingEnvVar("DATABASE_URL".to_string()))
        }
        (DatabaseKind::Sqlite, None) => DEFAULT_SQLITE_URL.to_string(),
        (DatabaseKind::Memory, None) => String::new(),
    };

    let max_connections = parse_or(vars, "CS_DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?;
    if max_connections == 0 {
        return Err(invalid("CS_DB_MAX_CONNECTIONS", "must be greater than 0"));
    }

    Ok(DatabaseConfig {
        kind,
        url: SecretString::from(url),
        max_connections,
    })
}

fn token_from_vars(vars: &HashMap<String, String>) -> Result<TokenConfig, ConfigError> {
    let signing_key = vars
        .get("CS_TOKEN_SIGNING_KEY")
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar("CS_TOKEN_SIGNING_KEY".to_string()))?;

    let expiry_minutes = parse_or(vars, "CS_TOKEN_EXPIRY_MINUTES", DEFAULT_TOKEN_EXPIRY_MINUTES)?;
    if expiry_minutes == 0 {
        return Err(invalid("CS_TOKEN_EXPIRY_MINUTES", "must be greater than 0"));
    }

    Ok(TokenConfig {
        algorithm: vars
            .get("CS_TOKEN_SIGNING_ALGORITHM")
            .cloned()
            .unwrap_or_else(|| DEFAULT_TOKEN_ALGORITHM.to_string()),
        signing_key: SecretString::from(signing_key.clone()),
        issuer: vars
            .get("CS_TOKEN_ISSUER")
            .cloned()
            .unwrap_or_else(|| DEFAULT_TOKEN_ISSUER.to_string()),
        audience: vars
            .get("CS_TOKEN_AUDIENCE")
            .cloned()
            .unwrap_or_else(|| DEFAULT_TOKEN_AUDIENCE.to_string()),
        expiry: Duration::from_secs(expiry_minutes.saturating_mul(60)),
    })
}

fn tls_from_vars(vars: &HashMap<String, String>) -> Result<TlsConfig, ConfigError> {
    let enabled = match vars.get("CS_TLS_ENABLED") {
        Some(value) => parse_bool("CS_TLS_ENABLED", value)?,
        None => false,
    };
    let path = |var: &str| {
        vars.get(var)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
    };

    let tls = TlsConfig {
        enabled,
        cert_file: path("CS_TLS_CERT_FILE"),
        key_file: path("CS_TLS_KEY_FILE"),
        ca_file: path("CS_TLS_CA_FILE"),
    };

    if tls.enabled {
        if tls.cert_file.is_none() {
            return Err(ConfigError::MissingEnvVar("CS_TLS_CERT_FILE".to_string()));
        }
        if tls.key_file.is_none() {
            return Err(ConfigError::MissingEnvVar("CS_TLS_KEY_FILE".to_string()));
        }
    }

    Ok(tls)
}

fn parse_or<T>(vars: &HashMap<String, String>, var: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match vars.get(var) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| invalid(var, &format!("'{raw}': {e}"))),
        None => Ok(default),
    }
}

fn parse_bool(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(invalid(var, &format!("'{raw}' is not a boolean"))),
    }
}

fn invalid(var: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        var: var.to_string(),
        reason: reason.to_string(),
    }
}
