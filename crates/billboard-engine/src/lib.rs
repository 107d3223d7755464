//! Billboard selection, event recording, and counter tabulation against
//! Postgres.

pub mod error;
pub mod recorder;
pub mod selector;
pub mod tabulator;

use std::collections::HashMap;

use billboard_core::{AppConfig, ConversionWeights, PlacementArea};

pub use error::EngineError;
pub use recorder::{record, EventInput};
pub use selector::{select, Selection, SelectionRequest, TestOverride};
pub use tabulator::{
    tabulate, tabulate_all, tabulate_logged, TabulationOutcome, TabulationSummary,
};

/// The slice of application config the engine reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub conversion_weights: ConversionWeights,
    pub low_impression_count: i64,
    pub low_impression_overrides: HashMap<PlacementArea, i64>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            conversion_weights: ConversionWeights::default(),
            low_impression_count: billboard_core::selection::DEFAULT_LOW_IMPRESSION_COUNT,
            low_impression_overrides: HashMap::new(),
        }
    }
}

impl EngineSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            conversion_weights: config.conversion_weights,
            low_impression_count: config.low_impression_count,
            low_impression_overrides: config.low_impression_overrides.clone(),
        }
    }

    #[must_use]
    pub fn low_impression_count_for(&self, area: PlacementArea) -> i64 {
        self.low_impression_overrides
            .get(&area)
            .copied()
            .unwrap_or(self.low_impression_count)
    }
}
