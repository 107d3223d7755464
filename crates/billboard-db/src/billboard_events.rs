//! Database operations for the `billboard_events` table.

use billboard_core::{CategoryCounts, ContextType, EventCategory, Geolocation};
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::DbError;

/// A row from the `billboard_events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BillboardEventRow {
    pub id: i64,
    pub billboard_id: i64,
    pub category: String,
    pub context_type: String,
    pub user_id: Option<i64>,
    pub article_id: Option<i64>,
    pub geolocation: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An event about to be appended.
///
/// With `created_at = None` the row is stamped with the database clock at
/// insert time, which must happen after the billboard row lock is held.
#[derive(Debug, Clone)]
pub struct NewBillboardEvent {
    pub billboard_id: i64,
    pub category: EventCategory,
    pub context_type: ContextType,
    pub user_id: Option<i64>,
    pub article_id: Option<i64>,
    pub geolocation: Option<Geolocation>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Appends an event and returns its id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails, including a foreign-key
/// violation when the billboard does not exist.
pub async fn insert_billboard_event(
    conn: &mut PgConnection,
    event: &NewBillboardEvent,
) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO billboard_events \
             (billboard_id, category, context_type, user_id, article_id, geolocation, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, clock_timestamp())) \
         RETURNING id",
    )
    .bind(event.billboard_id)
    .bind(event.category.as_str())
    .bind(event.context_type.as_str())
    .bind(event.user_id)
    .bind(event.article_id)
    .bind(event.geolocation.as_ref().map(Geolocation::to_iso3166))
    .bind(event.created_at)
    .fetch_one(conn)
    .await?;

    Ok(id)
}

/// Counts a billboard's events per category in the half-open window
/// `(after, up_to]`. `after = None` scans from the beginning of history.
///
/// # Errors
///
/// Returns [`DbError::InvalidRow`] if a stored category is unknown, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn count_events_by_category(
    conn: &mut PgConnection,
    billboard_id: i64,
    after: Option<DateTime<Utc>>,
    up_to: DateTime<Utc>,
) -> Result<CategoryCounts, DbError> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT category, COUNT(*)::BIGINT \
         FROM billboard_events \
         WHERE billboard_id = $1 \
           AND ($2::TIMESTAMPTZ IS NULL OR created_at > $2) \
           AND created_at <= $3 \
         GROUP BY category",
    )
    .bind(billboard_id)
    .bind(after)
    .bind(up_to)
    .fetch_all(conn)
    .await?;

    rows.into_iter()
        .map(|(category, count)| {
            category
                .parse::<EventCategory>()
                .map(|category| (category, count))
                .map_err(|e| DbError::InvalidRow {
                    column: "category",
                    reason: e.to_string(),
                })
        })
        .collect()
}

/// Lists a billboard's events, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_billboard_events(
    pool: &PgPool,
    billboard_id: i64,
) -> Result<Vec<BillboardEventRow>, DbError> {
    let rows = sqlx::query_as::<_, BillboardEventRow>(
        "SELECT id, billboard_id, category, context_type, user_id, article_id, \
                geolocation, created_at \
         FROM billboard_events \
         WHERE billboard_id = $1 \
         ORDER BY created_at, id",
    )
    .bind(billboard_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
