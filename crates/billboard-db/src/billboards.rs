//! Database operations for the `billboards` table.

use billboard_core::{
    Billboard, Counters, DisplayTo, Geolocation, PlacementArea, RoleName, StoredCounters,
};
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `billboards` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BillboardRow {
    pub id: i64,
    pub name: Option<String>,
    pub placement_area: String,
    pub display_to: String,
    pub target_role_names: Vec<String>,
    pub exclude_role_names: Vec<String>,
    pub target_geolocations: Vec<String>,
    pub approved: bool,
    pub published: bool,
    pub priority: bool,
    pub weight: i32,
    pub processed_html: Option<String>,
    pub impressions_count: i64,
    pub clicks_count: i64,
    pub conversion_value: i64,
    pub success_rate: f64,
    pub counts_tabulated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<BillboardRow> for Billboard {
    type Error = DbError;

    fn try_from(row: BillboardRow) -> Result<Self, Self::Error> {
        let placement_area = row
            .placement_area
            .parse::<PlacementArea>()
            .map_err(|e| DbError::InvalidRow {
                column: "placement_area",
                reason: e.to_string(),
            })?;
        let display_to = row
            .display_to
            .parse::<DisplayTo>()
            .map_err(|e| DbError::InvalidRow {
                column: "display_to",
                reason: e.to_string(),
            })?;
        let target_geolocations = row
            .target_geolocations
            .iter()
            .map(|code| Geolocation::parse(code))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DbError::InvalidRow {
                column: "target_geolocations",
                reason: e.to_string(),
            })?;

        Ok(Billboard {
            id: row.id,
            name: row.name,
            placement_area,
            display_to,
            target_role_names: RoleName::set_from(&row.target_role_names),
            exclude_role_names: RoleName::set_from(&row.exclude_role_names),
            target_geolocations,
            approved: row.approved,
            published: row.published,
            priority: row.priority,
            weight: row.weight,
            processed_html: row.processed_html,
            impressions_count: row.impressions_count,
            clicks_count: row.clicks_count,
            success_rate: row.success_rate,
            counts_tabulated_at: row.counts_tabulated_at,
        })
    }
}

/// Fields needed to author a billboard. Authoring normally happens in an
/// external admin tool; this exists for seeding and tests.
#[derive(Debug, Clone)]
pub struct NewBillboard {
    pub name: Option<String>,
    pub placement_area: PlacementArea,
    pub display_to: DisplayTo,
    pub target_role_names: Vec<RoleName>,
    pub exclude_role_names: Vec<RoleName>,
    pub target_geolocations: Vec<Geolocation>,
    pub approved: bool,
    pub published: bool,
    pub priority: bool,
    pub weight: i32,
    pub body_markdown: Option<String>,
}

impl NewBillboard {
    #[must_use]
    pub fn new(placement_area: PlacementArea) -> Self {
        Self {
            name: None,
            placement_area,
            display_to: DisplayTo::All,
            target_role_names: Vec::new(),
            exclude_role_names: Vec::new(),
            target_geolocations: Vec::new(),
            approved: true,
            published: true,
            priority: false,
            weight: 1,
            body_markdown: None,
        }
    }
}

/// Counter columns read under a row lock during tabulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockedCounters {
    pub stored: StoredCounters,
    pub counts_tabulated_at: Option<DateTime<Utc>>,
}

const BILLBOARD_COLUMNS: &str = "id, name, placement_area, display_to, target_role_names, \
     exclude_role_names, target_geolocations, approved, published, priority, weight, \
     processed_html, impressions_count, clicks_count, conversion_value, success_rate, \
     counts_tabulated_at, created_at, updated_at";

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Returns approved, published billboards for `placement_area`, ordered by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_serving_billboards(
    pool: &PgPool,
    placement_area: PlacementArea,
) -> Result<Vec<BillboardRow>, DbError> {
    let rows = sqlx::query_as::<_, BillboardRow>(&format!(
        "SELECT {BILLBOARD_COLUMNS} \
         FROM billboards \
         WHERE placement_area = $1 AND approved AND published \
         ORDER BY id"
    ))
    .bind(placement_area.as_str())
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Fetches a single billboard regardless of approval or publish state.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_billboard(pool: &PgPool, id: i64) -> Result<Option<BillboardRow>, DbError> {
    let row = sqlx::query_as::<_, BillboardRow>(&format!(
        "SELECT {BILLBOARD_COLUMNS} FROM billboards WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Takes a `FOR KEY SHARE` lock on the billboard row and reports whether it
/// exists.
///
/// Impressions do not touch the counters, so they only need to wait out a
/// running tabulation (which holds `FOR UPDATE`). Shared locks do not block
/// each other.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn lock_billboard_for_event(conn: &mut PgConnection, id: i64) -> Result<bool, DbError> {
    let row = sqlx::query_scalar::<_, i64>("SELECT id FROM billboards WHERE id = $1 FOR KEY SHARE")
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(row.is_some())
}

/// Unlocked read of the stored impression count, used by the sampling gate.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the billboard does not exist, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn impressions_count(pool: &PgPool, id: i64) -> Result<i64, DbError> {
    sqlx::query_scalar::<_, i64>("SELECT impressions_count FROM billboards WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Returns every billboard id, ordered ascending.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_billboard_ids(pool: &PgPool) -> Result<Vec<i64>, DbError> {
    let ids = sqlx::query_scalar::<_, i64>("SELECT id FROM billboards ORDER BY id")
        .fetch_all(pool)
        .await?;

    Ok(ids)
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Inserts a billboard and returns the stored row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_billboard(pool: &PgPool, new: &NewBillboard) -> Result<BillboardRow, DbError> {
    let target_roles: Vec<&str> = new.target_role_names.iter().map(RoleName::as_str).collect();
    let exclude_roles: Vec<&str> = new.exclude_role_names.iter().map(RoleName::as_str).collect();
    let geolocations: Vec<String> = new
        .target_geolocations
        .iter()
        .map(Geolocation::to_iso3166)
        .collect();

    let row = sqlx::query_as::<_, BillboardRow>(&format!(
        "INSERT INTO billboards (name, placement_area, display_to, target_role_names, \
             exclude_role_names, target_geolocations, approved, published, priority, weight, \
             body_markdown, processed_html) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11) \
         RETURNING {BILLBOARD_COLUMNS}"
    ))
    .bind(new.name.as_deref())
    .bind(new.placement_area.as_str())
    .bind(new.display_to.as_str())
    .bind(&target_roles)
    .bind(&exclude_roles)
    .bind(&geolocations)
    .bind(new.approved)
    .bind(new.published)
    .bind(new.priority)
    .bind(new.weight)
    .bind(new.body_markdown.as_deref())
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Relative increment of the click/conversion counters performed while an
/// event is recorded. Also tracks the increment in the `fast_path_*`
/// columns so the next tabulation can back it out.
///
/// Takes the billboard's row lock until the surrounding transaction ends.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the billboard does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn apply_fast_path(
    conn: &mut PgConnection,
    id: i64,
    clicks: i64,
    conversion_value: i64,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE billboards \
         SET clicks_count = clicks_count + $2, \
             fast_path_clicks = fast_path_clicks + $2, \
             conversion_value = conversion_value + $3, \
             fast_path_conversion_value = fast_path_conversion_value + $3 \
         WHERE id = $1",
    )
    .bind(id)
    .bind(clicks)
    .bind(conversion_value)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Locks the billboard row (`FOR UPDATE`) and returns its counters.
///
/// Must run inside a transaction; the lock serializes tabulation and the
/// recorder fast path for this billboard until commit or rollback.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the billboard does not exist, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn lock_counters(conn: &mut PgConnection, id: i64) -> Result<LockedCounters, DbError> {
    let row: (i64, i64, i64, i64, i64, Option<DateTime<Utc>>) = sqlx::query_as(
        "SELECT impressions_count, clicks_count, conversion_value, \
                fast_path_clicks, fast_path_conversion_value, counts_tabulated_at \
         FROM billboards \
         WHERE id = $1 \
         FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or(DbError::NotFound)?;

    let (impressions_count, clicks_count, conversion_value, fp_clicks, fp_value, tabulated_at) =
        row;
    Ok(LockedCounters {
        stored: StoredCounters {
            impressions_count,
            clicks_count,
            conversion_value,
            fast_path_clicks: fp_clicks,
            fast_path_conversion_value: fp_value,
        },
        counts_tabulated_at: tabulated_at,
    })
}

/// Writes tabulated counters, clears the fast-path trackers, and advances
/// `counts_tabulated_at`. Call only while holding the lock from [`lock_counters`].
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the billboard does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn write_tabulated_counters(
    conn: &mut PgConnection,
    id: i64,
    counters: &Counters,
    tabulated_at: DateTime<Utc>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE billboards \
         SET impressions_count = $2, \
             clicks_count = $3, \
             conversion_value = $4, \
             success_rate = $5, \
             fast_path_clicks = 0, \
             fast_path_conversion_value = 0, \
             counts_tabulated_at = $6, \
             updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(counters.impressions_count)
    .bind(counters.clicks_count)
    .bind(counters.conversion_value)
    .bind(counters.success_rate)
    .bind(tabulated_at)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Current database time. Event timestamps and tabulation cutoffs both come
/// from this clock so that application hosts with skewed clocks agree.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn database_now(conn: &mut PgConnection) -> Result<DateTime<Utc>, DbError> {
    let now = sqlx::query_scalar::<_, DateTime<Utc>>("SELECT clock_timestamp()")
        .fetch_one(conn)
        .await?;

    Ok(now)
}
