/// Configuration management for the API server
///
/// Configuration is read once at startup into [`Config`] and passed down
/// through `AppState`; nothing else reads the environment.
///
/// # Environment Variables
///
/// - `APP_ENV`: `development` (default) or `production`
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT` / `PORT`: Port to bind to (default: 4000)
/// - `CORS_ORIGINS`: Comma-separated allowed origins, `*` for any (default: `*`)
/// - `STORE_BACKEND`: `postgres` or `memory` (default: `postgres` when
///   `DATABASE_URL` is set, otherwise `memory`)
/// - `DATABASE_URL`: PostgreSQL connection string
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `JWT_SECRET`: Token signing secret, at least 32 characters; required in
///   production, generated per process otherwise
/// - `UPLOAD_DIR`: Attachment directory (default: `uploads`)
/// - `MAX_UPLOAD_BYTES`: Request body limit for uploads (default: 10 MiB)
/// - `PASSWORD_HASH_MEMORY_KIB`, `PASSWORD_HASH_ITERATIONS`: Argon2id cost
///
/// # Example
///
/// ```no_run
/// use dtask_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use anyhow::{anyhow, bail};
use dtask_shared::auth::password::HashParams;
use rand::{distributions::Alphanumeric, Rng};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Minimum signing secret length
pub const MIN_SECRET_LEN: usize = 32;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,

    /// API server configuration
    pub api: ApiConfig,

    /// Which store backs the services
    pub store: StoreBackend,

    /// Present when `store` is `Postgres`
    pub database: Option<DatabaseConfig>,

    /// JWT configuration
    pub jwt: JwtConfig,

    /// Attachment uploads
    pub uploads: UploadConfig,

    /// Argon2id cost parameters
    pub password: HashParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Postgres => f.write_str("postgres"),
            StoreBackend::Memory => f.write_str("memory"),
        }
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Enables production-only response headers (HSTS)
    pub production: bool,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    pub secret: String,

    /// True when the secret was generated for this process; tokens will not
    /// survive a restart
    pub ephemeral: bool,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("ephemeral", &self.ephemeral)
            .finish()
    }
}

/// Upload configuration
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Directory attachments are written to and served from
    pub dir: PathBuf,

    /// Maximum request body size for task posts
    pub max_bytes: usize,
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> anyhow::Result<T> {
    match value {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow!("{} has an invalid value: {}", key, raw)),
        None => Ok(default),
    }
}

fn generate_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

impl Config {
    /// Loads configuration from environment variables, reading `.env` first
    /// if present
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds configuration from any key lookup
    ///
    /// Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns an error if a value does not parse, `DATABASE_URL` is missing
    /// for the postgres store, or the signing secret is absent or too short
    /// in production
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = match get("APP_ENV").as_deref().map(str::trim) {
            None | Some("development") | Some("dev") => Environment::Development,
            Some("production") | Some("prod") => Environment::Production,
            Some(other) => bail!("APP_ENV has an invalid value: {}", other),
        };
        let production = environment == Environment::Production;

        let host = get("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match get("API_PORT") {
            Some(port) => parse_or(Some(port), "API_PORT", 4000u16)?,
            None => parse_or(get("PORT"), "PORT", 4000u16)?,
        };

        let cors_origins: Vec<String> = get("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let database_url = get("DATABASE_URL");
        let store = match get("STORE_BACKEND").as_deref().map(str::trim) {
            Some("postgres") => StoreBackend::Postgres,
            Some("memory") => StoreBackend::Memory,
            Some(other) => bail!("STORE_BACKEND has an invalid value: {}", other),
            None if database_url.is_some() => StoreBackend::Postgres,
            None => StoreBackend::Memory,
        };

        let database = match store {
            StoreBackend::Postgres => Some(DatabaseConfig {
                url: database_url
                    .ok_or_else(|| anyhow!("DATABASE_URL is required for the postgres store"))?,
                max_connections: parse_or(
                    get("DATABASE_MAX_CONNECTIONS"),
                    "DATABASE_MAX_CONNECTIONS",
                    10u32,
                )?,
            }),
            StoreBackend::Memory => None,
        };

        let jwt = match get("JWT_SECRET") {
            Some(secret) if secret.len() < MIN_SECRET_LEN => {
                bail!("JWT_SECRET must be at least {} characters long", MIN_SECRET_LEN)
            }
            Some(secret) => JwtConfig {
                secret,
                ephemeral: false,
            },
            None if production => bail!("JWT_SECRET is required in production"),
            None => JwtConfig {
                secret: generate_secret(),
                ephemeral: true,
            },
        };

        let uploads = UploadConfig {
            dir: PathBuf::from(get("UPLOAD_DIR").unwrap_or_else(|| "uploads".to_string())),
            max_bytes: parse_or(
                get("MAX_UPLOAD_BYTES"),
                "MAX_UPLOAD_BYTES",
                DEFAULT_MAX_UPLOAD_BYTES,
            )?,
        };

        let defaults = HashParams::default();
        let password = HashParams {
            memory_kib: parse_or(
                get("PASSWORD_HASH_MEMORY_KIB"),
                "PASSWORD_HASH_MEMORY_KIB",
                defaults.memory_kib,
            )?,
            iterations: parse_or(
                get("PASSWORD_HASH_ITERATIONS"),
                "PASSWORD_HASH_ITERATIONS",
                defaults.iterations,
            )?,
            parallelism: defaults.parallelism,
        };

        Ok(Self {
            environment,
            api: ApiConfig {
                host,
                port,
                cors_origins,
                production,
            },
            store,
            database,
            jwt,
            uploads,
            password,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_development_defaults() {
        let config = load(&[]).unwrap();

        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.bind_address(), "0.0.0.0:4000");
        assert_eq!(config.store, StoreBackend::Memory);
        assert!(config.database.is_none());
        assert!(config.jwt.ephemeral);
        assert!(config.jwt.secret.len() >= MIN_SECRET_LEN);
        assert_eq!(config.api.cors_origins, vec!["*"]);
        assert_eq!(config.uploads.dir, PathBuf::from("uploads"));
        assert_eq!(config.password, HashParams::default());
    }

    #[test]
    fn test_generated_secrets_differ() {
        let a = load(&[]).unwrap();
        let b = load(&[]).unwrap();
        assert_ne!(a.jwt.secret, b.jwt.secret);
    }

    #[test]
    fn test_database_url_selects_postgres() {
        let config = load(&[
            ("DATABASE_URL", "postgresql://localhost/dtask"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
        ])
        .unwrap();

        assert_eq!(config.store, StoreBackend::Postgres);
        let database = config.database.unwrap();
        assert_eq!(database.url, "postgresql://localhost/dtask");
        assert_eq!(database.max_connections, 4);
    }

    #[test]
    fn test_postgres_requires_database_url() {
        let err = load(&[("STORE_BACKEND", "postgres")]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn test_production_requires_secret() {
        let err = load(&[("APP_ENV", "production")]).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));

        let err = load(&[("APP_ENV", "production"), ("JWT_SECRET", "short")]).unwrap_err();
        assert!(err.to_string().contains("at least 32"));

        let config = load(&[
            ("APP_ENV", "production"),
            ("JWT_SECRET", "0123456789abcdef0123456789abcdef"),
        ])
        .unwrap();
        assert!(config.api.production);
        assert!(!config.jwt.ephemeral);
    }

    #[test]
    fn test_port_fallback_and_overrides() {
        let config = load(&[
            ("PORT", "5000"),
            ("CORS_ORIGINS", "http://localhost:3000, https://dtask.app"),
            ("PASSWORD_HASH_MEMORY_KIB", "4096"),
        ])
        .unwrap();
        assert_eq!(config.api.port, 5000);
        assert_eq!(
            config.api.cors_origins,
            vec!["http://localhost:3000", "https://dtask.app"]
        );
        assert_eq!(config.password.memory_kib, 4096);

        let config = load(&[("PORT", "5000"), ("API_PORT", "6000")]).unwrap();
        assert_eq!(config.api.port, 6000);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(load(&[("API_PORT", "eighty")]).is_err());
        assert!(load(&[("STORE_BACKEND", "redis")]).is_err());
        assert!(load(&[("APP_ENV", "staging")]).is_err());
    }

    #[test]
    fn test_secret_is_redacted_in_debug() {
        let config = load(&[("JWT_SECRET", "0123456789abcdef0123456789abcdef")]).unwrap();
        assert!(!format!("{:?}", config).contains("0123456789abcdef"));
    }
}
