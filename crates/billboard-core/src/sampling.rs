//! Tiered sampling gate that bounds tabulation frequency for busy billboards.

/// Above this many impressions a billboard tabulates on roughly half its events.
pub const BUSY_IMPRESSIONS: i64 = 100_000;
/// Above this many impressions a billboard tabulates on roughly a third of its events.
pub const VERY_BUSY_IMPRESSIONS: i64 = 500_000;

/// Source of uniform draws in `[0, 1)`.
pub trait Sampler: Send + Sync {
    fn draw(&self) -> f64;
}

/// Production sampler backed by the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngSampler;

impl Sampler for ThreadRngSampler {
    fn draw(&self) -> f64 {
        rand::random::<f64>()
    }
}

/// Sampler that always returns the same draw.
#[derive(Debug, Clone, Copy)]
pub struct FixedSampler(pub f64);

impl Sampler for FixedSampler {
    fn draw(&self) -> f64 {
        self.0
    }
}

/// Decide whether a tabulation attempt should run for a billboard with
/// `impressions_count` impressions, given a uniform `draw` in `[0, 1)`.
///
/// The tiers do not stack: a very busy billboard passes a single 1/3 gate.
#[must_use]
pub fn should_tabulate(impressions_count: i64, draw: f64) -> bool {
    if impressions_count > VERY_BUSY_IMPRESSIONS {
        draw < 1.0 / 3.0
    } else if impressions_count > BUSY_IMPRESSIONS {
        draw < 0.5
    } else {
        true
    }
}
