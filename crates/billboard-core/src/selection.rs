//! Choosing one billboard from the eligible candidates.
//!
//! Most requests favor billboards that already perform well, while a share
//! of traffic goes to new or priority units so they can gather enough
//! impressions to be judged.

use std::cmp::Ordering;

use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::Billboard;

/// Impressions below which a billboard still counts as "new".
pub const DEFAULT_LOW_IMPRESSION_COUNT: i64 = 1_000;
/// Upper bound of the random cut-off applied to the performance ranking.
pub const PERFORMANCE_POOL_MAX: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStrategy {
    RandomSelection,
    NewAndPriority,
    NewOnly,
    WeightedPerformance,
}

/// Relative share of requests handled by each strategy.
///
/// Keys missing from a stored placement config fall back to the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionWeights {
    pub random_selection: u32,
    pub new_and_priority: u32,
    pub new_only: u32,
    pub weighted_performance: u32,
}

impl Default for SelectionWeights {
    fn default() -> Self {
        Self {
            random_selection: 5,
            new_and_priority: 30,
            new_only: 5,
            weighted_performance: 60,
        }
    }
}

impl SelectionWeights {
    fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> SelectionStrategy {
        let table = [
            (SelectionStrategy::RandomSelection, self.random_selection),
            (SelectionStrategy::NewAndPriority, self.new_and_priority),
            (SelectionStrategy::NewOnly, self.new_only),
            (SelectionStrategy::WeightedPerformance, self.weighted_performance),
        ];
        // Weights are admin-authored; four u32s always fit in a u64.
        let total: u64 = table.iter().map(|(_, w)| u64::from(*w)).sum();
        if total == 0 {
            return SelectionStrategy::WeightedPerformance;
        }

        let mut roll = rng.random_range(0..total);
        for (strategy, weight) in table {
            let weight = u64::from(weight);
            if roll < weight {
                return strategy;
            }
            roll -= weight;
        }
        SelectionStrategy::WeightedPerformance
    }
}

/// Whether a request should fetch a billboard at all, given the placement's
/// delivery rate in percent and a uniform draw in `[0, 1)`.
#[must_use]
pub fn should_deliver(rate_percent: i16, draw: f64) -> bool {
    match rate_percent {
        r if r >= 100 => true,
        r if r <= 0 => false,
        r => draw * 100.0 < f64::from(r),
    }
}

/// Pick at most one billboard from `candidates`, which must already be the
/// eligible set for this viewer.
pub fn choose_billboard<'a, R: Rng + ?Sized>(
    candidates: &'a [Billboard],
    weights: &SelectionWeights,
    low_impression_count: i64,
    rng: &mut R,
) -> Option<&'a Billboard> {
    if candidates.is_empty() {
        return None;
    }

    let strategy = weights.pick(rng);
    tracing::debug!(?strategy, candidates = candidates.len(), "choosing billboard");

    match strategy {
        SelectionStrategy::RandomSelection => candidates.choose(rng),
        SelectionStrategy::NewAndPriority => {
            let pool: Vec<&Billboard> = candidates
                .iter()
                .filter(|b| b.priority || b.impressions_count < low_impression_count)
                .collect();
            pool.choose_weighted(rng, |b| f64::from(b.weight.max(0)))
                .ok()
                .copied()
                .or_else(|| candidates.choose(rng))
        }
        SelectionStrategy::NewOnly => {
            let pool: Vec<&Billboard> = candidates
                .iter()
                .filter(|b| b.impressions_count < low_impression_count)
                .collect();
            pool.choose(rng)
                .copied()
                .or_else(|| by_performance(candidates, rng))
        }
        SelectionStrategy::WeightedPerformance => by_performance(candidates, rng),
    }
}

/// Uniform pick among the top-N by success rate, where N is itself random in
/// `1..=15`. The best performer appears in every cut-off and so wins most often.
fn by_performance<'a, R: Rng + ?Sized>(
    candidates: &'a [Billboard],
    rng: &mut R,
) -> Option<&'a Billboard> {
    let mut ranked: Vec<&Billboard> = candidates.iter().collect();
    ranked.sort_by(|a, b| {
        b.success_rate
            .partial_cmp(&a.success_rate)
            .unwrap_or(Ordering::Equal)
            .then(a.id.cmp(&b.id))
    });
    let limit = rng.random_range(1..=PERFORMANCE_POOL_MAX).min(ranked.len());
    ranked[..limit].choose(rng).copied()
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::billboards::test_billboard;

    fn only(strategy: SelectionStrategy) -> SelectionWeights {
        let mut weights = SelectionWeights {
            random_selection: 0,
            new_and_priority: 0,
            new_only: 0,
            weighted_performance: 0,
        };
        match strategy {
            SelectionStrategy::RandomSelection => weights.random_selection = 1,
            SelectionStrategy::NewAndPriority => weights.new_and_priority = 1,
            SelectionStrategy::NewOnly => weights.new_only = 1,
            SelectionStrategy::WeightedPerformance => weights.weighted_performance = 1,
        }
        weights
    }

    fn seasoned(id: i64, success_rate: f64) -> Billboard {
        let mut billboard = test_billboard(id);
        billboard.impressions_count = 50_000;
        billboard.success_rate = success_rate;
        billboard
    }

    #[test]
    fn empty_candidates_yield_nothing() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(choose_billboard(&[], &SelectionWeights::default(), 1_000, &mut rng).is_none());
    }

    #[test]
    fn result_is_always_a_candidate() {
        let candidates: Vec<Billboard> = (1..=20).map(|id| seasoned(id, 0.01)).collect();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let chosen = choose_billboard(&candidates, &SelectionWeights::default(), 1_000, &mut rng)
                .expect("non-empty candidates");
            assert!(candidates.iter().any(|c| c.id == chosen.id));
        }
    }

    #[test]
    fn new_only_prefers_low_impression_billboards() {
        let candidates = vec![seasoned(1, 0.9), test_billboard(2)];
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let chosen =
                choose_billboard(&candidates, &only(SelectionStrategy::NewOnly), 1_000, &mut rng)
                    .unwrap();
            assert_eq!(chosen.id, 2);
        }
    }

    #[test]
    fn new_only_falls_back_when_everything_is_seasoned() {
        let candidates = vec![seasoned(1, 0.9)];
        let mut rng = StdRng::seed_from_u64(3);
        let chosen =
            choose_billboard(&candidates, &only(SelectionStrategy::NewOnly), 1_000, &mut rng);
        assert_eq!(chosen.map(|b| b.id), Some(1));
    }

    #[test]
    fn new_and_priority_includes_priority_billboards() {
        let mut priority = seasoned(1, 0.0);
        priority.priority = true;
        let candidates = vec![priority, seasoned(2, 0.9)];
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..100 {
            let chosen = choose_billboard(
                &candidates,
                &only(SelectionStrategy::NewAndPriority),
                1_000,
                &mut rng,
            )
            .unwrap();
            assert_eq!(chosen.id, 1);
        }
    }

    #[test]
    fn new_and_priority_respects_weight() {
        let mut heavy = test_billboard(1);
        heavy.weight = 10_000;
        let mut zero = test_billboard(2);
        zero.weight = 0;
        let candidates = vec![heavy, zero];
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..100 {
            let chosen = choose_billboard(
                &candidates,
                &only(SelectionStrategy::NewAndPriority),
                1_000,
                &mut rng,
            )
            .unwrap();
            assert_eq!(chosen.id, 1);
        }
    }

    #[test]
    fn weighted_performance_favors_the_top_performer() {
        let candidates: Vec<Billboard> = (1..=15)
            .map(|id| seasoned(id, 1.0 / f64::from(u32::try_from(id).unwrap())))
            .collect();
        let mut rng = StdRng::seed_from_u64(99);
        let mut top_wins = 0;
        let mut bottom_wins = 0;
        for _ in 0..3_000 {
            match choose_billboard(
                &candidates,
                &only(SelectionStrategy::WeightedPerformance),
                1_000,
                &mut rng,
            )
            .unwrap()
            .id
            {
                1 => top_wins += 1,
                15 => bottom_wins += 1,
                _ => {}
            }
        }
        assert!(top_wins > bottom_wins * 5, "top {top_wins}, bottom {bottom_wins}");
    }

    #[test]
    fn zero_weights_fall_back_to_performance() {
        let weights = SelectionWeights {
            random_selection: 0,
            new_and_priority: 0,
            new_only: 0,
            weighted_performance: 0,
        };
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(weights.pick(&mut rng), SelectionStrategy::WeightedPerformance);
    }

    #[test]
    fn huge_weights_do_not_overflow_the_roll() {
        let weights = SelectionWeights {
            random_selection: u32::MAX,
            new_and_priority: u32::MAX,
            new_only: 0,
            weighted_performance: u32::MAX,
        };
        let mut rng = StdRng::seed_from_u64(21);
        let mut seen_last = false;
        for _ in 0..300 {
            let strategy = weights.pick(&mut rng);
            assert_ne!(strategy, SelectionStrategy::NewOnly);
            seen_last |= strategy == SelectionStrategy::WeightedPerformance;
        }
        assert!(seen_last, "the last bucket must stay reachable");
    }

    #[test]
    fn delivery_rate_bounds() {
        assert!(should_deliver(100, 0.999));
        assert!(!should_deliver(0, 0.0));
        assert!(should_deliver(50, 0.30));
        assert!(!should_deliver(25, 0.30));
    }
}
