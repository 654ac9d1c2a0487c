//! Configuration management

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8000;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/unitver";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 2;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default database idle timeout in seconds (10 minutes).
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default CORS allowed origin for local development.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:3000";

// ============================================================================
// Versioning Constants
// ============================================================================

/// How long a deploy or rollback waits for the per-unit lock.
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;

/// Upper bound for any single statement inside a versioning transaction.
pub const DEFAULT_STATEMENT_TIMEOUT_MS: u64 = 30_000;

/// Largest accepted snapshot blob (10 MiB).
pub const DEFAULT_MAX_SNAPSHOT_BYTES: usize = 10 * 1024 * 1024;

/// Attempts made by the caller-side retry wrapper, first call included.
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;

/// Linear backoff base between retries (`base * attempt`).
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 100;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreBackend,
    pub database: DatabaseConfig,
    pub versioning: VersioningConfig,
    pub cors: CorsConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

/// Which [`crate::db::VersionStore`] implementation backs the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Postgres,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            _ => Err(anyhow::anyhow!("Invalid store backend: {}", s)),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// Deploy/rollback engine tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersioningConfig {
    pub lock_timeout_ms: u64,
    pub statement_timeout_ms: u64,
    pub max_snapshot_bytes: usize,
    pub retry_max_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl VersioningConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            statement_timeout_ms: DEFAULT_STATEMENT_TIMEOUT_MS,
            max_snapshot_bytes: DEFAULT_MAX_SNAPSHOT_BYTES,
            retry_max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from `.env`, the environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let store = match std::env::var("UNITVER_STORE") {
            Ok(raw) => raw.parse()?,
            Err(_) => StoreBackend::default(),
        };

        let config = Config {
            server: ServerConfig {
                host: std::env::var("UNITVER_HOST")
                    .unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
                port: env_or("UNITVER_PORT", DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: env_or(
                    "UNITVER_SHUTDOWN_TIMEOUT",
                    DEFAULT_SHUTDOWN_TIMEOUT_SECS,
                ),
            },
            store,
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                max_connections: env_or(
                    "DATABASE_MAX_CONNECTIONS",
                    DEFAULT_DATABASE_MAX_CONNECTIONS,
                ),
                min_connections: env_or(
                    "DATABASE_MIN_CONNECTIONS",
                    DEFAULT_DATABASE_MIN_CONNECTIONS,
                ),
                connect_timeout_secs: env_or(
                    "DATABASE_CONNECT_TIMEOUT",
                    DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                ),
                idle_timeout_secs: env_or(
                    "DATABASE_IDLE_TIMEOUT",
                    DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
                ),
            },
            versioning: VersioningConfig {
                lock_timeout_ms: env_or("VERSIONING_LOCK_TIMEOUT_MS", DEFAULT_LOCK_TIMEOUT_MS),
                statement_timeout_ms: env_or(
                    "VERSIONING_STATEMENT_TIMEOUT_MS",
                    DEFAULT_STATEMENT_TIMEOUT_MS,
                ),
                max_snapshot_bytes: env_or(
                    "VERSIONING_MAX_SNAPSHOT_BYTES",
                    DEFAULT_MAX_SNAPSHOT_BYTES,
                ),
                retry_max_attempts: env_or(
                    "VERSIONING_RETRY_MAX_ATTEMPTS",
                    DEFAULT_RETRY_MAX_ATTEMPTS,
                ),
                retry_backoff_ms: env_or("VERSIONING_RETRY_BACKOFF_MS", DEFAULT_RETRY_BACKOFF_MS),
            },
            cors: CorsConfig {
                allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| DEFAULT_CORS_ALLOWED_ORIGIN.to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                allow_credentials: env_or("CORS_ALLOW_CREDENTIALS", true),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.store == StoreBackend::Postgres {
            if self.database.url.is_empty() {
                anyhow::bail!("Database URL cannot be empty");
            }

            if self.database.max_connections == 0 {
                anyhow::bail!("Database max_connections must be greater than 0");
            }

            if self.database.min_connections > self.database.max_connections {
                anyhow::bail!(
                    "Database min_connections ({}) cannot be greater than max_connections ({})",
                    self.database.min_connections,
                    self.database.max_connections
                );
            }
        }

        if self.versioning.lock_timeout_ms == 0 {
            anyhow::bail!("Versioning lock timeout must be greater than 0");
        }

        if self.versioning.retry_max_attempts == 0 {
            anyhow::bail!("Retry max attempts must be at least 1");
        }

        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - all origins will be allowed");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            store: StoreBackend::default(),
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                idle_timeout_secs: DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
            },
            versioning: VersioningConfig::default(),
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
                allow_credentials: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.versioning.retry_max_attempts, 3);
        assert_eq!(config.versioning.retry_backoff(), Duration::from_millis(100));
    }

    #[test]
    fn test_validate_rejects_inverted_pool_bounds() {
        let mut config = Config::default();
        config.database.min_connections = 20;
        assert!(config.validate().is_err());

        // Pool settings are irrelevant without a database
        config.store = StoreBackend::Memory;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_retry_attempts() {
        let mut config = Config::default();
        config.versioning.retry_max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_store_backend_from_str() {
        assert_eq!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!("PostgreSQL".parse::<StoreBackend>().unwrap(), StoreBackend::Postgres);
        assert!("sqlite".parse::<StoreBackend>().is_err());
    }

    #[test]
    #[serial]
    fn test_load_reads_versioning_env() {
        std::env::set_var("UNITVER_STORE", "memory");
        std::env::set_var("VERSIONING_LOCK_TIMEOUT_MS", "250");
        std::env::set_var("VERSIONING_MAX_SNAPSHOT_BYTES", "4096");

        let config = Config::load().unwrap();
        assert_eq!(config.store, StoreBackend::Memory);
        assert_eq!(config.versioning.lock_timeout(), Duration::from_millis(250));
        assert_eq!(config.versioning.max_snapshot_bytes, 4096);

        std::env::remove_var("UNITVER_STORE");
        std::env::remove_var("VERSIONING_LOCK_TIMEOUT_MS");
        std::env::remove_var("VERSIONING_MAX_SNAPSHOT_BYTES");
    }

    #[test]
    #[serial]
    fn test_load_rejects_unknown_store() {
        std::env::set_var("UNITVER_STORE", "cassandra");
        assert!(Config::load().is_err());
        std::env::remove_var("UNITVER_STORE");
    }
}
