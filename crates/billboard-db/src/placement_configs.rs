//! Per-placement delivery rates and selection weights.

use billboard_core::{PlacementArea, SelectionWeights};
use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgPool};

use crate::DbError;

/// A row from the `billboard_placement_area_configs` table.
///
/// Rates are percentages of requests that should receive a billboard at all.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlacementAreaConfigRow {
    pub id: i64,
    pub placement_area: String,
    pub signed_in_rate: i16,
    pub signed_out_rate: i16,
    pub selection_weights: Json<SelectionWeights>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PlacementAreaConfigRow {
    #[must_use]
    pub fn delivery_rate(&self, signed_in: bool) -> i16 {
        if signed_in {
            self.signed_in_rate
        } else {
            self.signed_out_rate
        }
    }

    #[must_use]
    pub fn selection_weights(&self) -> SelectionWeights {
        self.selection_weights.0
    }
}

/// Fetches the config for `placement_area`, if one has been stored.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails or the stored weights do
/// not decode.
pub async fn get_placement_area_config(
    pool: &PgPool,
    placement_area: PlacementArea,
) -> Result<Option<PlacementAreaConfigRow>, DbError> {
    let row = sqlx::query_as::<_, PlacementAreaConfigRow>(
        "SELECT id, placement_area, signed_in_rate, signed_out_rate, selection_weights, \
                created_at, updated_at \
         FROM billboard_placement_area_configs \
         WHERE placement_area = $1",
    )
    .bind(placement_area.as_str())
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Inserts or replaces the config for `placement_area`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails, including a check
/// violation for rates outside `0..=100`.
pub async fn upsert_placement_area_config(
    pool: &PgPool,
    placement_area: PlacementArea,
    signed_in_rate: i16,
    signed_out_rate: i16,
    selection_weights: &SelectionWeights,
) -> Result<PlacementAreaConfigRow, DbError> {
    let row = sqlx::query_as::<_, PlacementAreaConfigRow>(
        "INSERT INTO billboard_placement_area_configs \
             (placement_area, signed_in_rate, signed_out_rate, selection_weights) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (placement_area) DO UPDATE SET \
             signed_in_rate = EXCLUDED.signed_in_rate, \
             signed_out_rate = EXCLUDED.signed_out_rate, \
             selection_weights = EXCLUDED.selection_weights, \
             updated_at = NOW() \
         RETURNING id, placement_area, signed_in_rate, signed_out_rate, selection_weights, \
                   created_at, updated_at",
    )
    .bind(placement_area.as_str())
    .bind(signed_in_rate)
    .bind(signed_out_rate)
    .bind(Json(selection_weights))
    .fetch_one(pool)
    .await?;

    Ok(row)
}
