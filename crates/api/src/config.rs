//! Runtime configuration read from the environment.

use std::net::SocketAddr;
use std::str::FromStr;

use thiserror::Error;

use tasklane_observability::LogFormat;

const DEV_JWT_SECRET: &str = "tasklane-dev-secret-change-me";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    /// Set when `JWT_SECRET` was absent and the dev secret is in use.
    pub jwt_secret_defaulted: bool,
    pub token_ttl_minutes: i64,
    pub bcrypt_cost: u32,
    pub precheck_duplicates: bool,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_url: "sqlite://tasklane.db?mode=rwc".to_string(),
            db_max_connections: 5,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_secret_defaulted: true,
            token_ttl_minutes: 30,
            bcrypt_cost: 12,
            precheck_duplicates: true,
            log_format: LogFormat::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut cfg = Config::default();

        if let Some(v) = lookup("TASKLANE_BIND_ADDR") {
            cfg.bind_addr = parse("TASKLANE_BIND_ADDR", v)?;
        }
        if let Some(v) = lookup("DATABASE_URL") {
            cfg.database_url = v;
        }
        if let Some(v) = lookup("TASKLANE_DB_MAX_CONNECTIONS") {
            cfg.db_max_connections = parse("TASKLANE_DB_MAX_CONNECTIONS", v)?;
        }
        if let Some(v) = lookup("JWT_SECRET").filter(|v| !v.is_empty()) {
            cfg.jwt_secret = v;
            cfg.jwt_secret_defaulted = false;
        }
        if let Some(v) = lookup("TASKLANE_TOKEN_TTL_MINUTES") {
            cfg.token_ttl_minutes = parse("TASKLANE_TOKEN_TTL_MINUTES", v)?;
        }
        if let Some(v) = lookup("TASKLANE_BCRYPT_COST") {
            cfg.bcrypt_cost = parse("TASKLANE_BCRYPT_COST", v)?;
        }
        if let Some(v) = lookup("TASKLANE_PRECHECK_DUPLICATES") {
            cfg.precheck_duplicates = parse_bool("TASKLANE_PRECHECK_DUPLICATES", v)?;
        }
        if let Some(v) = lookup("TASKLANE_LOG_FORMAT") {
            cfg.log_format = parse("TASKLANE_LOG_FORMAT", v)?;
        }

        Ok(cfg)
    }
}

fn parse<T>(var: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        var,
        reason: e.to_string(),
        value,
    })
}

fn parse_bool(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value,
            reason: "expected a boolean".to_string(),
        }),
    }
}
