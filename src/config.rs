// src/config.rs
use std::{env, fmt::Display, str::FromStr};

use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid {key} value: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<String>),
}

#[derive(Clone, Debug)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    pub debug: bool,
    pub allowed_origins: AllowedOrigins,
    pub token_ttl_hours: i64,
    pub report_max_days: i64,
    pub db_max_connections: u32,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Config {
    /// Reads the process environment. Call after `dotenvy::dotenv()`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let bootstrap_admin = match (lookup("ADMIN_EMAIL"), lookup("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) if !email.trim().is_empty() => Some(BootstrapAdmin {
                email: email.trim().to_string(),
                password,
            }),
            _ => None,
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&lookup, "PORT", 3000)?,
            debug: parse_or(&lookup, "DEBUG", false)?,
            allowed_origins: parse_origins(lookup("ALLOWED_ORIGINS").as_deref()),
            token_ttl_hours: parse_or(&lookup, "TOKEN_TTL_HOURS", 8)?,
            report_max_days: parse_or(&lookup, "REPORT_MAX_DAYS", 31)?,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            bootstrap_admin,
        })
    }

    /// Default `tracing` filter when `RUST_LOG` is not set.
    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "stock21=debug,tower_http=debug,sqlx=info"
        } else {
            "stock21=info,tower_http=info,sqlx=warn"
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                message: e.to_string(),
            })
        }
        _ => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

fn parse_origins(raw: Option<&str>) -> AllowedOrigins {
    match raw.map(str::trim) {
        None | Some("") | Some("*") => AllowedOrigins::Any,
        Some(list) => AllowedOrigins::List(
            list.split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
        ),
    }
}
