use std::env;
use std::ops::RangeInclusive;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// Token lifetimes beyond a year are refused; larger values overflow the
/// duration arithmetic used when signing tokens and cookies.
const TOKEN_TTL_HOURS: RangeInclusive<i64> = 1..=8760;

/// Runtime settings, read from the environment (and `.env` via dotenvy).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// No URL means the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub allow_future_expense_dates: bool,
    pub seed_demo_data: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", 3000)?,
            database_url: lookup("DATABASE_URL").filter(|s| !s.is_empty()),
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?,
            jwt_secret,
            token_ttl_hours: parse_within(&lookup, "TOKEN_TTL_HOURS", 24, TOKEN_TTL_HOURS)?,
            allow_future_expense_dates: parse_or(&lookup, "ALLOW_FUTURE_EXPENSE_DATES", false)?,
            seed_demo_data: parse_or(&lookup, "SEED_DEMO_DATA", false)?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

fn parse_within<F>(lookup: &F, key: &'static str, default: i64, range: RangeInclusive<i64>) -> Result<i64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = parse_or(lookup, key, default)?;
    if !range.contains(&value) {
        return Err(ConfigError::Invalid { key, value: value.to_string() });
    }
    Ok(value)
}
