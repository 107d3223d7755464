//! Appends billboard events and keeps click counters fresh between
//! tabulations.

use billboard_core::{ContextType, ConversionWeights, EventCategory, Geolocation};
use billboard_db::NewBillboardEvent;
use sqlx::PgPool;

use crate::EngineError;

/// A validated event ready to record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventInput {
    pub billboard_id: i64,
    pub category: EventCategory,
    pub context_type: ContextType,
    pub user_id: Option<i64>,
    pub article_id: Option<i64>,
    pub geolocation: Option<Geolocation>,
}

impl EventInput {
    /// Build an input from raw request values.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] for an unknown category or
    /// context type.
    pub fn parse(
        billboard_id: i64,
        category: &str,
        context_type: &str,
    ) -> Result<Self, EngineError> {
        Ok(Self {
            billboard_id,
            category: category.trim().parse()?,
            context_type: context_type.trim().parse()?,
            user_id: None,
            article_id: None,
            geolocation: None,
        })
    }
}

/// Record one event and return its id.
///
/// Clicks and conversion-class events bump the billboard's counters in the
/// same transaction as the insert. Impressions only take a shared lock and
/// leave counting to the tabulator. Callers trigger tabulation themselves
/// once this returns.
///
/// # Errors
///
/// Returns [`EngineError::NotFound`] if the billboard does not exist, or
/// [`EngineError::Db`] if the write fails.
pub async fn record(
    pool: &PgPool,
    weights: &ConversionWeights,
    event: &EventInput,
) -> Result<i64, EngineError> {
    let billboard_id = event.billboard_id;
    let mut tx = pool.begin().await.map_err(billboard_db::DbError::from)?;

    match fast_path_amounts(event.category, weights) {
        Some((clicks, conversion_value)) => {
            billboard_db::apply_fast_path(&mut tx, billboard_id, clicks, conversion_value)
                .await
                .map_err(|e| EngineError::for_billboard(billboard_id, e))?;
        }
        None => {
            if !billboard_db::lock_billboard_for_event(&mut tx, billboard_id).await? {
                return Err(EngineError::NotFound(billboard_id));
            }
        }
    }

    // Stamped by the database clock now that the row lock is held.
    let id = billboard_db::insert_billboard_event(
        &mut tx,
        &NewBillboardEvent {
            billboard_id,
            category: event.category,
            context_type: event.context_type,
            user_id: event.user_id,
            article_id: event.article_id,
            geolocation: event.geolocation.clone(),
            created_at: None,
        },
    )
    .await?;

    tx.commit().await.map_err(billboard_db::DbError::from)?;

    tracing::debug!(
        billboard_id,
        event_id = id,
        category = %event.category,
        "billboard event recorded"
    );
    Ok(id)
}

/// Click and conversion value a `category` event adds to the counters right
/// away, or `None` when it is left to the tabulator.
fn fast_path_amounts(category: EventCategory, weights: &ConversionWeights) -> Option<(i64, i64)> {
    if category == EventCategory::Click {
        Some((1, 0))
    } else if category.is_conversion_class() {
        Some((0, weights.weight_of(category)))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_known_values() {
        let input = EventInput::parse(4, " click ", "article").unwrap();
        assert_eq!(input.category, EventCategory::Click);
        assert_eq!(input.context_type, ContextType::Article);
        assert_eq!(input.billboard_id, 4);
    }

    #[test]
    fn fast_path_covers_clicks_and_conversion_class_events() {
        let weights = ConversionWeights {
            conversion: 25,
            signup: 10,
        };
        assert_eq!(fast_path_amounts(EventCategory::Click, &weights), Some((1, 0)));
        assert_eq!(
            fast_path_amounts(EventCategory::Conversion, &weights),
            Some((0, 25))
        );
        assert_eq!(fast_path_amounts(EventCategory::Signup, &weights), Some((0, 10)));
        assert_eq!(fast_path_amounts(EventCategory::Impression, &weights), None);
    }

    #[test]
    fn parse_rejects_unknown_category() {
        let err = EventInput::parse(4, "hover", "home").unwrap_err();
        assert!(matches!(err, EngineError::Validation { field: "category", .. }));
    }

    #[test]
    fn parse_rejects_unknown_context_type() {
        let err = EventInput::parse(4, "impression", "sidebar").unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation {
                field: "context_type",
                ..
            }
        ));
    }
}
