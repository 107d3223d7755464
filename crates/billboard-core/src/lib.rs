//! Pure domain logic for billboard targeting, selection, sampling, and
//! tabulation. Nothing in this crate performs I/O.

pub mod app_config;
pub mod billboards;
pub mod cache;
pub mod config;
pub mod events;
pub mod geo;
pub mod roles;
pub mod sampling;
pub mod selection;
pub mod tabulation;
pub mod targeting;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use billboards::{Billboard, DisplayTo, PlacementArea};
pub use cache::{cache_directives, CacheDirectives};
pub use config::{load_app_config, load_app_config_from_env};
pub use events::{ContextType, ConversionWeights, EventCategory};
pub use geo::Geolocation;
pub use roles::RoleName;
pub use sampling::{should_tabulate, FixedSampler, Sampler, ThreadRngSampler};
pub use selection::{choose_billboard, SelectionStrategy, SelectionWeights};
pub use tabulation::{CategoryCounts, Counters, StoredCounters};
pub use targeting::{eligible, Viewer};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid {field}: {value}")]
    Validation { field: &'static str, value: String },
}

impl CoreError {
    pub(crate) fn validation(field: &'static str, value: impl Into<String>) -> Self {
        Self::Validation {
            field,
            value: value.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
