//! Counter arithmetic for full and incremental tabulation.
//!
//! The persistence layer gathers per-category event counts for a window and
//! the currently stored counters; these functions derive the new counters.

use serde::Serialize;

use crate::{ConversionWeights, EventCategory};

/// Number of events per category within a scan window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryCounts {
    pub impressions: i64,
    pub clicks: i64,
    pub conversions: i64,
    pub signups: i64,
}

impl CategoryCounts {
    pub fn add(&mut self, category: EventCategory, count: i64) {
        match category {
            EventCategory::Impression => self.impressions += count,
            EventCategory::Click => self.clicks += count,
            EventCategory::Conversion => self.conversions += count,
            EventCategory::Signup => self.signups += count,
        }
    }

    /// Weighted click-value of the conversion-class events in this window.
    #[must_use]
    pub fn conversion_value(&self, weights: &ConversionWeights) -> i64 {
        self.conversions * weights.weight_of(EventCategory::Conversion)
            + self.signups * weights.weight_of(EventCategory::Signup)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl FromIterator<(EventCategory, i64)> for CategoryCounts {
    fn from_iter<T: IntoIterator<Item = (EventCategory, i64)>>(iter: T) -> Self {
        let mut counts = Self::default();
        for (category, count) in iter {
            counts.add(category, count);
        }
        counts
    }
}

/// Counters as stored on the billboard row, including the amounts the
/// recorder fast path added since the last tabulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoredCounters {
    pub impressions_count: i64,
    pub clicks_count: i64,
    pub conversion_value: i64,
    pub fast_path_clicks: i64,
    pub fast_path_conversion_value: i64,
}

/// Counters produced by a tabulation pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Counters {
    pub impressions_count: i64,
    pub clicks_count: i64,
    pub conversion_value: i64,
    pub success_rate: f64,
}

impl Counters {
    fn new(impressions_count: i64, clicks_count: i64, conversion_value: i64) -> Self {
        let impressions_count = impressions_count.max(0);
        let clicks_count = clicks_count.max(0);
        let conversion_value = conversion_value.max(0);
        Self {
            impressions_count,
            clicks_count,
            conversion_value,
            success_rate: success_rate(impressions_count, clicks_count + conversion_value),
        }
    }
}

/// Total click value divided by impressions; zero when nothing was seen.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn success_rate(impressions_count: i64, total_click_value: i64) -> f64 {
    if impressions_count <= 0 {
        return 0.0;
    }
    total_click_value.max(0) as f64 / impressions_count as f64
}

/// First tabulation: the window covers the billboard's whole history, so the
/// scanned counts replace whatever the fast path accumulated.
#[must_use]
pub fn full(history: &CategoryCounts, weights: &ConversionWeights) -> Counters {
    Counters::new(
        history.impressions,
        history.clicks,
        history.conversion_value(weights),
    )
}

/// Later tabulations: add the window's deltas to the stored counters, first
/// backing out what the fast path already added for the same events.
#[must_use]
pub fn incremental(
    stored: &StoredCounters,
    window: &CategoryCounts,
    weights: &ConversionWeights,
) -> Counters {
    Counters::new(
        stored.impressions_count + window.impressions,
        stored.clicks_count - stored.fast_path_clicks + window.clicks,
        stored.conversion_value - stored.fast_path_conversion_value
            + window.conversion_value(weights),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn full_tabulation_counts_impressions_and_clicks() {
        let history = CategoryCounts {
            impressions: 40,
            clicks: 3,
            ..CategoryCounts::default()
        };
        let counters = full(&history, &ConversionWeights::default());
        assert_eq!(counters.impressions_count, 40);
        assert_eq!(counters.clicks_count, 3);
        assert!(approx(counters.success_rate, 3.0 / 40.0));
    }

    #[test]
    fn full_tabulation_without_impressions_has_zero_rate() {
        let history = CategoryCounts {
            clicks: 5,
            ..CategoryCounts::default()
        };
        let counters = full(&history, &ConversionWeights::default());
        assert_eq!(counters.impressions_count, 0);
        assert_eq!(counters.clicks_count, 5);
        assert!(approx(counters.success_rate, 0.0));
    }

    #[test]
    fn conversions_are_weighted_into_success_rate() {
        let history = CategoryCounts {
            impressions: 1_000,
            clicks: 10,
            conversions: 1,
            signups: 2,
        };
        let counters = full(&history, &ConversionWeights::default());
        assert_eq!(counters.conversion_value, 75);
        assert!(approx(counters.success_rate, 85.0 / 1_000.0));
    }

    #[test]
    fn incremental_adds_window_deltas() {
        let stored = StoredCounters {
            impressions_count: 100,
            clicks_count: 4,
            ..StoredCounters::default()
        };
        let window = CategoryCounts {
            impressions: 20,
            clicks: 2,
            conversions: 1,
            signups: 0,
        };
        let counters = incremental(&stored, &window, &ConversionWeights::default());
        assert_eq!(counters.impressions_count, 120);
        assert_eq!(counters.clicks_count, 6);
        assert!(approx(counters.success_rate, (6.0 + 25.0) / 120.0));
    }

    #[test]
    fn incremental_with_empty_window_is_idempotent() {
        let stored = StoredCounters {
            impressions_count: 100,
            clicks_count: 4,
            conversion_value: 50,
            ..StoredCounters::default()
        };
        let first = incremental(&stored, &CategoryCounts::default(), &ConversionWeights::default());
        assert_eq!(first.impressions_count, 100);
        assert_eq!(first.clicks_count, 4);
        assert_eq!(first.conversion_value, 50);
        assert!(approx(first.success_rate, 54.0 / 100.0));
    }

    #[test]
    fn incremental_backs_out_fast_path_amounts() {
        // Two clicks and one signup were already applied by the fast path.
        let stored = StoredCounters {
            impressions_count: 10,
            clicks_count: 7,
            conversion_value: 25,
            fast_path_clicks: 2,
            fast_path_conversion_value: 25,
        };
        let window = CategoryCounts {
            impressions: 0,
            clicks: 2,
            conversions: 0,
            signups: 1,
        };
        let counters = incremental(&stored, &window, &ConversionWeights::default());
        assert_eq!(counters.clicks_count, 7);
        assert_eq!(counters.conversion_value, 25);
    }

    #[test]
    fn category_counts_collect_from_pairs() {
        let counts: CategoryCounts = [
            (EventCategory::Impression, 3),
            (EventCategory::Click, 1),
            (EventCategory::Impression, 2),
        ]
        .into_iter()
        .collect();
        assert_eq!(counts.impressions, 5);
        assert_eq!(counts.clicks, 1);
        assert!(!counts.is_empty());
        assert!(CategoryCounts::default().is_empty());
    }
}
