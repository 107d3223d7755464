//! Recomputes a billboard's aggregate counters from its event log.
//!
//! The first pass scans the whole history; later passes only scan events
//! newer than `counts_tabulated_at`. Each pass holds the billboard's row
//! lock, so concurrent passes for the same billboard serialize and never
//! count an event twice.

use std::time::Duration;

use billboard_core::tabulation::{full, incremental};
use billboard_core::{should_tabulate, ConversionWeights, Counters, Sampler};
use sqlx::PgPool;

use crate::EngineError;

/// Attempts made when a pass loses a lock race.
pub const MAX_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(50);
/// Upper bound on waiting for the billboard's row lock within one attempt.
const LOCK_TIMEOUT: &str = "5s";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TabulationOutcome {
    /// The sampling gate declined this attempt.
    Skipped,
    /// First tabulation, counted from the complete event history.
    Full(Counters),
    /// Counters advanced by the events since the previous tabulation.
    Incremental(Counters),
}

impl TabulationOutcome {
    #[must_use]
    pub fn counters(&self) -> Option<&Counters> {
        match self {
            Self::Skipped => None,
            Self::Full(counters) | Self::Incremental(counters) => Some(counters),
        }
    }
}

/// Tally of a [`tabulate_all`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TabulationSummary {
    pub full: usize,
    pub incremental: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Tabulate `billboard_id` if the sampling gate allows it.
///
/// # Errors
///
/// Returns [`EngineError::NotFound`] for an unknown billboard,
/// [`EngineError::ConcurrencyConflict`] if every attempt lost a lock race, or
/// [`EngineError::TabulationFailure`] for any other failure. Nothing is
/// written when an error is returned.
#[tracing::instrument(skip(pool, weights, sampler))]
pub async fn tabulate(
    pool: &PgPool,
    billboard_id: i64,
    weights: &ConversionWeights,
    sampler: &dyn Sampler,
) -> Result<TabulationOutcome, EngineError> {
    let impressions = billboard_db::impressions_count(pool, billboard_id)
        .await
        .map_err(|e| EngineError::from_tabulation(billboard_id, e))?;
    if !should_tabulate(impressions, sampler.draw()) {
        tracing::debug!(impressions, "sampling gate skipped tabulation");
        return Ok(TabulationOutcome::Skipped);
    }

    let mut attempt = 1;
    loop {
        match tabulate_once(pool, billboard_id, weights).await {
            Err(EngineError::ConcurrencyConflict(_)) if attempt < MAX_ATTEMPTS => {
                tracing::debug!(attempt, "tabulation lost a lock race, retrying");
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

async fn tabulate_once(
    pool: &PgPool,
    billboard_id: i64,
    weights: &ConversionWeights,
) -> Result<TabulationOutcome, EngineError> {
    let classify = |e: billboard_db::DbError| EngineError::from_tabulation(billboard_id, e);
    let db = |e: sqlx::Error| classify(billboard_db::DbError::from(e));

    let mut tx = pool.begin().await.map_err(db)?;
    sqlx::query(&format!("SET LOCAL lock_timeout = '{LOCK_TIMEOUT}'"))
        .execute(&mut *tx)
        .await
        .map_err(db)?;

    let locked = billboard_db::lock_counters(&mut tx, billboard_id)
        .await
        .map_err(classify)?;
    // The cutoff must be read after the lock: any event committed before it
    // is then visible, and any later event is stamped after it.
    let now = billboard_db::database_now(&mut tx).await.map_err(classify)?;

    let outcome = match locked.counts_tabulated_at {
        None => {
            let history = billboard_db::count_events_by_category(&mut tx, billboard_id, None, now)
                .await
                .map_err(classify)?;
            TabulationOutcome::Full(full(&history, weights))
        }
        Some(previous) => {
            let window =
                billboard_db::count_events_by_category(&mut tx, billboard_id, Some(previous), now)
                    .await
                    .map_err(classify)?;
            TabulationOutcome::Incremental(incremental(&locked.stored, &window, weights))
        }
    };

    if let Some(counters) = outcome.counters() {
        billboard_db::write_tabulated_counters(&mut tx, billboard_id, counters, now)
            .await
            .map_err(classify)?;
    }
    tx.commit().await.map_err(db)?;

    if let Some(counters) = outcome.counters() {
        tracing::info!(
            impressions = counters.impressions_count,
            clicks = counters.clicks_count,
            success_rate = counters.success_rate,
            full = matches!(outcome, TabulationOutcome::Full(_)),
            "billboard tabulated"
        );
    }
    Ok(outcome)
}

/// [`tabulate`], with failures logged and swallowed. Used after recording an
/// event, where tabulation must never fail the caller.
pub async fn tabulate_logged(
    pool: &PgPool,
    billboard_id: i64,
    weights: &ConversionWeights,
    sampler: &dyn Sampler,
) -> Option<TabulationOutcome> {
    match tabulate(pool, billboard_id, weights, sampler).await {
        Ok(outcome) => Some(outcome),
        Err(error) => {
            tracing::warn!(billboard_id, error = %error, "tabulation failed");
            None
        }
    }
}

/// Tabulate every billboard in id order. Individual failures are logged and
/// counted; they do not stop the run.
///
/// # Errors
///
/// Returns [`EngineError::Db`] only if the billboard ids cannot be listed.
pub async fn tabulate_all(
    pool: &PgPool,
    weights: &ConversionWeights,
    sampler: &dyn Sampler,
) -> Result<TabulationSummary, EngineError> {
    let ids = billboard_db::list_billboard_ids(pool).await?;
    let mut summary = TabulationSummary::default();

    for id in ids {
        match tabulate_logged(pool, id, weights, sampler).await {
            Some(TabulationOutcome::Full(_)) => summary.full += 1,
            Some(TabulationOutcome::Incremental(_)) => summary.incremental += 1,
            Some(TabulationOutcome::Skipped) => summary.skipped += 1,
            None => summary.failed += 1,
        }
    }

    tracing::info!(
        full = summary.full,
        incremental = summary.incremental,
        skipped = summary.skipped,
        failed = summary.failed,
        "tabulated all billboards"
    );
    Ok(summary)
}
