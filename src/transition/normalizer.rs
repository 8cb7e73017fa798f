//! Probability normalization
//!
//! Converts pooled counts into frequency and transition rows.
//!
//! Denominators:
//! - frequency: all counts in the same [`GroupKey::frequency_scope`], i.e. the
//!   grand total under BASIC and CATEGORY, the hour total under TIME;
//! - transition: all transitions sharing the same source behavior and group, so
//!   each source's outgoing probabilities sum to 1.
//!
//! A zero denominator yields probability 0, never NaN.

use crate::transition::types::{
    CanonicalLabel, CohortTables, CountTables, FrequencyRow, GroupKey, GroupingPolicy,
    TransitionRow,
};
use std::collections::BTreeMap;

/// `count / total`, or 0 when `total` is 0
pub fn ratio(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

/// Normalizer for pooled count tables
pub struct CohortNormalizer;

impl CohortNormalizer {
    /// Compute probabilities for every counted behavior and transition
    pub fn normalize(pooled: &CountTables, policy: GroupingPolicy, files: usize) -> CohortTables {
        CohortTables {
            policy,
            files,
            frequency: frequency_rows(pooled),
            transitions: transition_rows(pooled),
        }
    }
}

fn frequency_rows(pooled: &CountTables) -> Vec<FrequencyRow> {
    let mut scope_totals: BTreeMap<GroupKey, u64> = BTreeMap::new();
    for (key, count) in &pooled.behavior_counts {
        *scope_totals.entry(key.group.frequency_scope()).or_insert(0) += count;
    }

    pooled
        .behavior_counts
        .iter()
        .map(|(key, &count)| {
            let total = scope_totals
                .get(&key.group.frequency_scope())
                .copied()
                .unwrap_or(0);
            FrequencyRow {
                behavior: key.behavior.clone(),
                group: key.group.clone(),
                count,
                total,
                probability: ratio(count, total),
            }
        })
        .collect()
}

fn transition_rows(pooled: &CountTables) -> Vec<TransitionRow> {
    let mut source_totals: BTreeMap<(&CanonicalLabel, &GroupKey), u64> = BTreeMap::new();
    for (key, count) in &pooled.transition_counts {
        *source_totals.entry((&key.from, &key.group)).or_insert(0) += count;
    }

    pooled
        .transition_counts
        .iter()
        .map(|(key, &count)| {
            let total = source_totals
                .get(&(&key.from, &key.group))
                .copied()
                .unwrap_or(0);
            TransitionRow {
                from: key.from.clone(),
                to: key.to.clone(),
                group: key.group.clone(),
                count,
                total,
                probability: ratio(count, total),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::types::{FrequencyKey, TransitionKey};

    const TOLERANCE: f64 = 1e-9;

    fn label(raw: &str) -> CanonicalLabel {
        CanonicalLabel::new(raw)
    }

    #[test]
    fn test_ratio_zero_denominator() {
        assert_eq!(ratio(0, 0), 0.0);
        assert_eq!(ratio(3, 0), 0.0);
        assert_eq!(ratio(1, 4), 0.25);
    }

    #[test]
    fn test_zero_count_rows_do_not_produce_nan() {
        let mut pooled = CountTables::default();
        pooled.behavior_counts.insert(
            FrequencyKey {
                behavior: label("BITE"),
                group: GroupKey::Basic,
            },
            0,
        );
        pooled.transition_counts.insert(
            TransitionKey {
                from: label("BITE"),
                to: label("FLEE"),
                group: GroupKey::Basic,
            },
            0,
        );

        let tables = CohortNormalizer::normalize(&pooled, GroupingPolicy::Basic, 1);
        assert_eq!(tables.frequency[0].probability, 0.0);
        assert_eq!(tables.transitions[0].probability, 0.0);
    }

    #[test]
    fn test_time_frequency_normalized_per_hour() {
        let mut pooled = CountTables::default();
        for (behavior, hour, count) in [("BITE", 1, 3), ("FLEE", 1, 1), ("BITE", 2, 5)] {
            pooled.behavior_counts.insert(
                FrequencyKey {
                    behavior: label(behavior),
                    group: GroupKey::ByHour(hour),
                },
                count,
            );
        }

        let tables = CohortNormalizer::normalize(&pooled, GroupingPolicy::Time, 1);
        let hour_one: f64 = tables
            .frequency_in(&GroupKey::ByHour(1))
            .iter()
            .map(|row| row.probability)
            .sum();
        assert!((hour_one - 1.0).abs() < TOLERANCE);

        let late = tables.frequency_in(&GroupKey::ByHour(2));
        let late_bite = late[0];
        assert_eq!(late_bite.total, 5);
        assert!((late_bite.probability - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_category_frequency_uses_grand_total() {
        let mut pooled = CountTables::default();
        for (behavior, category, count) in [("CHASE", "AGGRESSIVE", 3), ("DIG", "REPRODUCTIVE", 1)] {
            pooled.behavior_counts.insert(
                FrequencyKey {
                    behavior: label(behavior),
                    group: GroupKey::ByCategory(label(category)),
                },
                count,
            );
        }

        let tables = CohortNormalizer::normalize(&pooled, GroupingPolicy::Category, 1);
        for row in &tables.frequency {
            assert_eq!(row.total, 4);
        }
        assert!((tables.frequency[0].probability - 0.75).abs() < TOLERANCE);
        assert!((tables.frequency[1].probability - 0.25).abs() < TOLERANCE);
    }

    #[test]
    fn test_transitions_row_stochastic() {
        let mut pooled = CountTables::default();
        for (from, to, count) in [("BITE", "FLEE", 2), ("BITE", "CHASE", 1), ("FLEE", "BITE", 4)] {
            pooled.transition_counts.insert(
                TransitionKey {
                    from: label(from),
                    to: label(to),
                    group: GroupKey::Basic,
                },
                count,
            );
        }

        let tables = CohortNormalizer::normalize(&pooled, GroupingPolicy::Basic, 1);
        let bite_total: f64 = tables
            .transitions
            .iter()
            .filter(|row| row.from.as_str() == "BITE")
            .map(|row| row.probability)
            .sum();
        assert!((bite_total - 1.0).abs() < TOLERANCE);

        let bite_chase = tables
            .transitions
            .iter()
            .find(|row| row.from.as_str() == "BITE" && row.to.as_str() == "CHASE")
            .unwrap();
        assert_eq!(bite_chase.total, 3);
        assert!((bite_chase.probability - 1.0 / 3.0).abs() < TOLERANCE);
    }
}
