use std::collections::HashMap;

use crate::app_config::{AppConfig, Environment};
use crate::cache::DEFAULT_CACHE_MAX_AGE_SECS;
use crate::events::DEFAULT_CONVERSION_WEIGHT;
use crate::selection::DEFAULT_LOW_IMPRESSION_COUNT;
use crate::{ConfigError, ConversionWeights, PlacementArea};

const ADMIN_API_KEYS_VAR: &str = "BILLBOARD_ADMIN_API_KEYS";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

fn invalid(var: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason: reason.to_string(),
    }
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can use a plain `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::str::FromStr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    fn parse_as<T>(var: &str, raw: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        raw.trim().parse::<T>().map_err(|e| invalid(var, e))
    }

    let non_negative = |var: &str, default: i64| -> Result<i64, ConfigError> {
        let value: i64 = parse_as(var, &or_default(var, &default.to_string()))?;
        if value < 0 {
            return Err(invalid(var, "must not be negative"));
        }
        Ok(value)
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("BILLBOARD_ENV", "development"))?;

    let bind_addr: SocketAddr = parse_as(
        "BILLBOARD_BIND_ADDR",
        &or_default("BILLBOARD_BIND_ADDR", "0.0.0.0:3000"),
    )?;
    let log_level = or_default("BILLBOARD_LOG_LEVEL", "info");

    let db_max_connections: u32 = parse_as(
        "BILLBOARD_DB_MAX_CONNECTIONS",
        &or_default("BILLBOARD_DB_MAX_CONNECTIONS", "10"),
    )?;
    let db_min_connections: u32 = parse_as(
        "BILLBOARD_DB_MIN_CONNECTIONS",
        &or_default("BILLBOARD_DB_MIN_CONNECTIONS", "1"),
    )?;
    let db_acquire_timeout_secs: u64 = parse_as(
        "BILLBOARD_DB_ACQUIRE_TIMEOUT_SECS",
        &or_default("BILLBOARD_DB_ACQUIRE_TIMEOUT_SECS", "10"),
    )?;
    let cache_max_age_secs: u64 = parse_as(
        "BILLBOARD_CACHE_MAX_AGE_SECS",
        &or_default(
            "BILLBOARD_CACHE_MAX_AGE_SECS",
            &DEFAULT_CACHE_MAX_AGE_SECS.to_string(),
        ),
    )?;

    let conversion_weights = ConversionWeights {
        conversion: non_negative("BILLBOARD_CONVERSION_WEIGHT", DEFAULT_CONVERSION_WEIGHT)?,
        signup: non_negative("BILLBOARD_SIGNUP_WEIGHT", DEFAULT_CONVERSION_WEIGHT)?,
    };

    let low_impression_count =
        non_negative("BILLBOARD_LOW_IMPRESSION_COUNT", DEFAULT_LOW_IMPRESSION_COUNT)?;
    let mut low_impression_overrides = HashMap::new();
    for area in PlacementArea::ALL {
        let var = low_impression_override_var(area);
        if lookup(&var).is_ok() {
            low_impression_overrides.insert(area, non_negative(&var, low_impression_count)?);
        }
    }

    let admin_api_keys = parse_api_keys(&or_default(ADMIN_API_KEYS_VAR, ""));
    if admin_api_keys.is_empty() && env != Environment::Development {
        return Err(ConfigError::MissingEnvVar(ADMIN_API_KEYS_VAR.to_string()));
    }

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        cache_max_age_secs,
        conversion_weights,
        low_impression_count,
        low_impression_overrides,
        admin_api_keys,
    })
}

/// Comma-separated bearer tokens; blank entries are dropped.
fn parse_api_keys(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Env var overriding the new-billboard impression threshold for one area,
/// e.g. `BILLBOARD_LOW_IMPRESSION_COUNT_FOR_SIDEBAR_LEFT`.
fn low_impression_override_var(area: PlacementArea) -> String {
    format!(
        "BILLBOARD_LOW_IMPRESSION_COUNT_FOR_{}",
        area.as_str().to_ascii_uppercase()
    )
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(invalid(
            "BILLBOARD_ENV",
            format!("expected development, test, or production; got '{other}'"),
        )),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
