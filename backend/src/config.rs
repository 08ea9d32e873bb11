use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;
use chrono_tz::Tz;
use cron::Schedule;
use shared::constants::DEFAULT_DAILY_SPIN_ALLOWANCE;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub bind_addr: SocketAddr,
    pub timezone: Tz,
    pub daily_spin_allowance: i32,
    pub storage_timeout: Duration,
    pub max_code_attempts: u32,
    pub jwt_secret: String,
    pub staff_secret: String,
    pub daily_reset_schedule: Schedule,
    pub notify_schedule: Schedule,
    pub cors_origins: Vec<HeaderValue>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let daily_spin_allowance: i32 = parse_or(&lookup, "DAILY_SPIN_ALLOWANCE", DEFAULT_DAILY_SPIN_ALLOWANCE)?;
        if daily_spin_allowance < 1 {
            return Err(invalid("DAILY_SPIN_ALLOWANCE", daily_spin_allowance, "must be at least 1"));
        }

        let storage_timeout_ms: u64 = parse_or(&lookup, "STORAGE_TIMEOUT_MS", 5_000)?;
        if storage_timeout_ms == 0 {
            return Err(invalid("STORAGE_TIMEOUT_MS", storage_timeout_ms, "must be positive"));
        }

        let max_code_attempts: u32 = parse_or(&lookup, "MAX_CODE_ATTEMPTS", 5)?;
        if max_code_attempts == 0 {
            return Err(invalid("MAX_CODE_ATTEMPTS", max_code_attempts, "must be at least 1"));
        }

        let timezone_name = lookup("WHEEL_TIMEZONE").unwrap_or_else(|| "UTC".to_string());
        let timezone = Tz::from_str(timezone_name.trim())
            .map_err(|e| invalid("WHEEL_TIMEZONE", &timezone_name, e))?;

        let cors_origins = lookup("CORS_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(|origin| {
                origin
                    .parse::<HeaderValue>()
                    .map_err(|e| invalid("CORS_ORIGINS", origin, e))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            bind_addr: parse_or(&lookup, "BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 3000)))?,
            timezone,
            daily_spin_allowance,
            storage_timeout: Duration::from_millis(storage_timeout_ms),
            max_code_attempts,
            jwt_secret: required("JWT_SECRET_KEY")?,
            staff_secret: required("STAFF_SECRET")?,
            daily_reset_schedule: parse_schedule(&lookup, "DAILY_RESET_SCHEDULE", "0 0 0 * * *")?,
            notify_schedule: parse_schedule(&lookup, "NOTIFY_SCHEDULE", "0 * * * * *")?,
            cors_origins,
        })
    }
}

fn invalid(name: &'static str, value: impl ToString, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: ToString,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| invalid(name, &raw, e)),
        None => Ok(default),
    }
}

fn parse_schedule<F>(lookup: &F, name: &'static str, default: &str) -> Result<Schedule, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let expression = lookup(name).unwrap_or_else(|| default.to_string());
    Schedule::from_str(expression.trim()).map_err(|e| invalid(name, &expression, e))
}

#[cfg(test)]
impl AppConfig {
    pub fn for_tests() -> Self {
        Self::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgres://localhost/wheel_test".to_string()),
            "JWT_SECRET_KEY" => Some("test-jwt-secret".to_string()),
            "STAFF_SECRET" => Some("test-staff-secret".to_string()),
            "WHEEL_TIMEZONE" => Some("Europe/Paris".to_string()),
            _ => None,
        })
        .expect("test configuration is valid")
    }
}
