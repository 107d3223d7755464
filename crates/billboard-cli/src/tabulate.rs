//! Tabulation command handlers for the CLI.
//!
//! These run the same tabulator the server dispatches after each event, but
//! synchronously, so an operator can reconcile counters after a backfill.

use billboard_core::{AppConfig, FixedSampler, Sampler, ThreadRngSampler};
use billboard_engine::TabulationOutcome;

/// `--force` pins the draw to zero, which always passes the sampling gate.
fn sampler_for(force: bool) -> Box<dyn Sampler> {
    if force {
        Box::new(FixedSampler(0.0))
    } else {
        Box::new(ThreadRngSampler)
    }
}

pub(crate) fn describe(outcome: &TabulationOutcome) -> String {
    let kind = match outcome {
        TabulationOutcome::Skipped => return "skipped by sampling gate".to_string(),
        TabulationOutcome::Full(_) => "full",
        TabulationOutcome::Incremental(_) => "incremental",
    };
    match outcome.counters() {
        Some(c) => format!(
            "{kind}: impressions={} clicks={} conversion_value={} success_rate={:.4}",
            c.impressions_count, c.clicks_count, c.conversion_value, c.success_rate
        ),
        None => kind.to_string(),
    }
}

/// Tabulate one billboard and print the resulting counters.
///
/// # Errors
///
/// Returns an error if the billboard does not exist or the tabulation
/// transaction fails after retries.
pub(crate) async fn run_tabulate(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    billboard_id: i64,
    force: bool,
) -> anyhow::Result<()> {
    let sampler = sampler_for(force);
    let outcome = billboard_engine::tabulate(
        pool,
        billboard_id,
        &config.conversion_weights,
        sampler.as_ref(),
    )
    .await?;

    println!("billboard {billboard_id}: {}", describe(&outcome));
    Ok(())
}

/// Tabulate every billboard. Per-billboard failures are logged and counted.
///
/// # Errors
///
/// Returns an error only if the billboard ids cannot be listed.
pub(crate) async fn run_tabulate_all(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    force: bool,
) -> anyhow::Result<()> {
    let sampler = sampler_for(force);
    let summary =
        billboard_engine::tabulate_all(pool, &config.conversion_weights, sampler.as_ref()).await?;

    tracing::info!(
        full = summary.full,
        incremental = summary.incremental,
        skipped = summary.skipped,
        failed = summary.failed,
        "tabulate-all finished"
    );
    println!(
        "full={} incremental={} skipped={} failed={}",
        summary.full, summary.incremental, summary.skipped, summary.failed
    );
    if summary.failed > 0 {
        anyhow::bail!("{} billboard(s) failed to tabulate", summary.failed);
    }
    Ok(())
}
