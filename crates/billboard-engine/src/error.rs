use billboard_core::CoreError;
use billboard_db::DbError;
use thiserror::Error;

/// SQLSTATEs that mean "another transaction got there first"; worth retrying.
const RETRYABLE_SQLSTATES: [&str; 3] = [
    "40001", // serialization_failure
    "40P01", // deadlock_detected
    "55P03", // lock_not_available
];

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid {field}: {value}")]
    Validation { field: &'static str, value: String },

    #[error("billboard {0} not found")]
    NotFound(i64),

    #[error("tabulation failed for billboard {billboard_id}: {source}")]
    TabulationFailure {
        billboard_id: i64,
        #[source]
        source: DbError,
    },

    #[error("lock conflict while tabulating billboard {0}")]
    ConcurrencyConflict(i64),

    #[error("database error: {0}")]
    Db(#[from] DbError),
}

impl From<CoreError> for EngineError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::Validation { field, value } => Self::Validation { field, value },
        }
    }
}

impl EngineError {
    /// Classify a database error raised while tabulating `billboard_id`.
    pub(crate) fn from_tabulation(billboard_id: i64, error: DbError) -> Self {
        if matches!(error, DbError::NotFound) {
            return Self::NotFound(billboard_id);
        }
        match error.sqlstate() {
            Some(code) if RETRYABLE_SQLSTATES.contains(&code.as_str()) => {
                Self::ConcurrencyConflict(billboard_id)
            }
            _ => Self::TabulationFailure {
                billboard_id,
                source: error,
            },
        }
    }

    /// Map a database error raised while handling `billboard_id`, turning a
    /// missing row into [`EngineError::NotFound`].
    pub(crate) fn for_billboard(billboard_id: i64, error: DbError) -> Self {
        match error {
            DbError::NotFound => Self::NotFound(billboard_id),
            other => Self::Db(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_preserved_during_tabulation() {
        let err = EngineError::from_tabulation(9, DbError::NotFound);
        assert!(matches!(err, EngineError::NotFound(9)));
    }

    #[test]
    fn non_database_errors_are_tabulation_failures() {
        let err = EngineError::from_tabulation(
            3,
            DbError::InvalidRow {
                column: "category",
                reason: "bogus".to_string(),
            },
        );
        assert!(matches!(
            err,
            EngineError::TabulationFailure {
                billboard_id: 3,
                ..
            }
        ));
    }

    #[test]
    fn core_validation_maps_to_engine_validation() {
        let err: EngineError = "nope"
            .parse::<billboard_core::EventCategory>()
            .unwrap_err()
            .into();
        assert!(matches!(
            err,
            EngineError::Validation {
                field: "category",
                ..
            }
        ));
    }
}
