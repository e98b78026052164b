//! Configuration loader for the `drive-temp-history` service.
//!
//! All runtime configuration values and their defaults are loaded here from
//! environment variables (with optional `.env` file support provided by the
//! caller), so the rest of the crate never calls `env::var` directly.
//!
use std::env;

use anyhow::{anyhow, Result};

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u32 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// PostgreSQL connection string.
    pub db_url: String,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// TCP port the HTTP server binds on all interfaces.
    pub listen_port: u16,

    /// Seconds before an in-flight store request is cancelled.
    pub store_timeout_secs: u32,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `DATABASE_URL` – PostgreSQL connection string
///
/// Optional:
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `LISTEN_PORT` – HTTP port (default: 8080)
/// - `STORE_TIMEOUT_SECS` – store request deadline (default: 30)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let db_url = require_env!("DATABASE_URL");
    let db_pool_max = parse_env_u32!("DB_POOL_MAX", 5);
    let listen_port = u16::try_from(parse_env_u32!("LISTEN_PORT", 8080))
        .map_err(|e| anyhow!("Invalid LISTEN_PORT: {}", e))?;
    let store_timeout_secs = parse_env_u32!("STORE_TIMEOUT_SECS", 30);

    if store_timeout_secs == 0 {
        return Err(anyhow!("Invalid STORE_TIMEOUT_SECS: must be at least 1"));
    }

    Ok(Config {
        db_url,
        db_pool_max,
        listen_port,
        store_timeout_secs,
    })
}

impl Config {
    /// Database URL with the password replaced by `****`.
    pub fn masked_db_url(&self) -> String {
        // ---
        if let Some(at_pos) = self.db_url.rfind('@') {
            if let Some(colon_pos) = self.db_url[..at_pos].rfind(':') {
                return format!(
                    "{}:****{}",
                    &self.db_url[..colon_pos],
                    &self.db_url[at_pos..]
                );
            }
        }
        self.db_url.clone()
    }

    /// Log the loaded configuration, masking the database password.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL       : {}", self.masked_db_url());
        tracing::info!("  DB_POOL_MAX        : {}", self.db_pool_max);
        tracing::info!("  LISTEN_PORT        : {}", self.listen_port);
        tracing::info!("  STORE_TIMEOUT_SECS : {}", self.store_timeout_secs);
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn config(db_url: &str) -> Config {
        Config {
            db_url: db_url.to_string(),
            db_pool_max: 5,
            listen_port: 8080,
            store_timeout_secs: 30,
        }
    }

    #[test]
    fn test_password_is_masked() {
        // ---
        let cfg = config("postgres://scrutiny:hunter2@db:5432/temps");
        assert_eq!(cfg.masked_db_url(), "postgres://scrutiny:****@db:5432/temps");
    }

    #[test]
    fn test_url_without_credentials_is_unchanged() {
        // ---
        let cfg = config("postgres://db:5432/temps");
        assert_eq!(cfg.masked_db_url(), "postgres://db:5432/temps");
    }
}
