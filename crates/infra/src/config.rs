//! Process configuration, read from the environment.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use custodia_observability::LogFormat;

const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(name: &'static str, value: &str, reason: impl ToString) -> Self {
        Self::Invalid {
            name,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    /// How long a unit of work waits for a resource row lock.
    pub lock_timeout: Duration,
    /// Postgres connection string; absent means in-memory stores.
    pub database_url: Option<String>,
    pub log_format: LogFormat,
    /// Most recent activity entries kept for `/activity`.
    pub activity_capacity: usize,
    /// Seed administrator created at startup when both are set.
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

impl core::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("token_ttl", &self.token_ttl)
            .field("lock_timeout", &self.lock_timeout)
            .field("database", &self.database_url.is_some())
            .field("log_format", &self.log_format)
            .field("activity_capacity", &self.activity_capacity)
            .field("admin_username", &self.admin_username)
            .finish_non_exhaustive()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_ttl: chrono::Duration::minutes(60),
            lock_timeout: Duration::from_millis(2000),
            database_url: None,
            log_format: LogFormat::Json,
            activity_capacity: 500,
            admin_username: None,
            admin_password: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; unset or blank variables keep their
    /// defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(v) = get("BIND_ADDR") {
            config.bind_addr = v
                .parse()
                .map_err(|e| ConfigError::invalid("BIND_ADDR", &v, e))?;
        }
        if let Some(v) = get("JWT_SECRET") {
            config.jwt_secret = v;
        }
        if let Some(v) = get("TOKEN_TTL_MINUTES") {
            let minutes: i64 = v
                .parse()
                .map_err(|e| ConfigError::invalid("TOKEN_TTL_MINUTES", &v, e))?;
            if minutes <= 0 {
                return Err(ConfigError::invalid("TOKEN_TTL_MINUTES", &v, "must be positive"));
            }
            config.token_ttl = chrono::Duration::minutes(minutes);
        }
        if let Some(v) = get("LOCK_TIMEOUT_MS") {
            let millis: u64 = v
                .parse()
                .map_err(|e| ConfigError::invalid("LOCK_TIMEOUT_MS", &v, e))?;
            config.lock_timeout = Duration::from_millis(millis);
        }
        config.database_url = get("DATABASE_URL");
        if let Some(v) = get("LOG_FORMAT") {
            config.log_format = v
                .parse()
                .map_err(|e| ConfigError::invalid("LOG_FORMAT", &v, e))?;
        }
        if let Some(v) = get("ACTIVITY_LOG_CAPACITY") {
            config.activity_capacity = v
                .parse()
                .map_err(|e| ConfigError::invalid("ACTIVITY_LOG_CAPACITY", &v, e))?;
        }
        config.admin_username = get("ADMIN_USERNAME");
        config.admin_password = lookup("ADMIN_PASSWORD").filter(|v| !v.trim().is_empty());
        Ok(config)
    }

    /// True when no `JWT_SECRET` was configured.
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}
