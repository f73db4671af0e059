// src/config.rs

use std::env;
use std::fmt;

use dotenvy::dotenv;

/// Default token lifetime: one day.
const DEFAULT_JWT_EXPIRATION: u64 = 86_400;

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. Without it the service runs on the in-memory store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    /// Key for paper signatures (HMAC-SHA256).
    pub signing_secret: String,
    pub rust_log: String,
    pub bind_addr: String,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

/// A required environment variable is missing or malformed.
#[derive(Debug)]
pub struct ConfigError(pub String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "configuration error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url = non_empty("DATABASE_URL");

        let jwt_secret = non_empty("JWT_SECRET")
            .ok_or_else(|| ConfigError("JWT_SECRET must be set".to_string()))?;

        let signing_secret = non_empty("SIGNING_SECRET")
            .ok_or_else(|| ConfigError("SIGNING_SECRET must be set".to_string()))?;

        let jwt_expiration = match non_empty("JWT_EXPIRATION") {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| ConfigError(format!("JWT_EXPIRATION is not a number: {}", raw)))?,
            None => DEFAULT_JWT_EXPIRATION,
        };

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            signing_secret,
            rust_log,
            bind_addr,
            admin_username: non_empty("ADMIN_USERNAME"),
            admin_password: non_empty("ADMIN_PASSWORD"),
        })
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}
