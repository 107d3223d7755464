use std::collections::HashMap;
use std::net::SocketAddr;

use crate::{ConversionWeights, PlacementArea};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub cache_max_age_secs: u64,
    pub conversion_weights: ConversionWeights,
    pub low_impression_count: i64,
    pub low_impression_overrides: HashMap<PlacementArea, i64>,
    /// Bearer tokens that mark a request as elevated.
    pub admin_api_keys: Vec<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("cache_max_age_secs", &self.cache_max_age_secs)
            .field("conversion_weights", &self.conversion_weights)
            .field("low_impression_count", &self.low_impression_count)
            .field("low_impression_overrides", &self.low_impression_overrides)
            .field(
                "admin_api_keys",
                &format!("[{} redacted]", self.admin_api_keys.len()),
            )
            .finish()
    }
}
