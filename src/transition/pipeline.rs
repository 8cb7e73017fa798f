//! Cohort aggregation pipeline
//!
//! Public entry points for turning observation logs into terminal tables:
//! load → count per file → pool counts → normalize.
//!
//! Each call is self-contained; nothing is carried between cohorts.

use crate::error::EthoError;
use crate::transition::adapter::load_cohort;
use crate::transition::counts::count_sequence;
use crate::transition::normalizer::CohortNormalizer;
use crate::transition::pooling::pool_counts;
use crate::transition::types::{CohortTables, GroupingPolicy, ObservationSequence};
use std::path::Path;
use tracing::info;

/// Aggregate already-loaded sequences belonging to one cohort.
///
/// # Arguments
/// * `sequences` - One sequence per subject-recording
/// * `policy` - Grouping policy for keys and denominators
///
/// # Returns
/// Pooled frequency and transition tables, or the first per-file error
pub fn aggregate_sequences(
    sequences: &[ObservationSequence],
    policy: GroupingPolicy,
) -> Result<CohortTables, EthoError> {
    let per_file = sequences
        .iter()
        .map(|sequence| count_sequence(sequence, policy))
        .collect::<Result<Vec<_>, _>>()?;

    let pooled = pool_counts(per_file);
    Ok(CohortNormalizer::normalize(&pooled, policy, sequences.len()))
}

/// Load and aggregate every observation log in a cohort directory.
///
/// An empty directory yields empty tables.
///
/// # Example
/// ```ignore
/// let tables = aggregate_cohort(Path::new("logs/BlueFishinBlue"), GroupingPolicy::Time)?;
/// ```
pub fn aggregate_cohort(dir: &Path, policy: GroupingPolicy) -> Result<CohortTables, EthoError> {
    let sequences = load_cohort(dir, policy)?;
    let tables = aggregate_sequences(&sequences, policy)?;

    info!(
        cohort = %dir.display(),
        policy = %policy,
        files = tables.files,
        behaviors = tables.frequency.len(),
        transitions = tables.transitions.len(),
        "aggregated cohort"
    );
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::types::{BehaviorEvent, GroupKey, TransitionRow};
    use std::fs;
    use tempfile::TempDir;

    const TOLERANCE: f64 = 1e-9;

    fn sequence(name: &str, events: &[(&str, f64)]) -> ObservationSequence {
        ObservationSequence::new(
            name,
            events
                .iter()
                .map(|(behavior, t)| BehaviorEvent::new(*behavior, *t))
                .collect(),
        )
    }

    fn find_transition<'a>(tables: &'a CohortTables, from: &str, to: &str) -> &'a TransitionRow {
        tables
            .transitions
            .iter()
            .find(|row| row.from.as_str() == from && row.to.as_str() == to)
            .unwrap()
    }

    fn assert_row_stochastic(tables: &CohortTables) {
        for row in &tables.transitions {
            let sum: f64 = tables
                .transitions
                .iter()
                .filter(|other| other.from == row.from && other.group == row.group)
                .map(|other| other.probability)
                .sum();
            assert!((sum - 1.0).abs() < TOLERANCE, "{} sums to {sum}", row.from);
        }
    }

    #[test]
    fn test_basic_scenario_with_sentinel() {
        let seq = sequence(
            "fish",
            &[("Bite", 0.0), ("Out of view", 1.0), ("Flee", 2.0), ("Bite", 5.0)],
        );
        let tables = aggregate_sequences(&[seq], GroupingPolicy::Basic).unwrap();

        assert_eq!(tables.files, 1);
        assert_eq!(tables.frequency.len(), 2);
        let bite = &tables.frequency[0];
        let flee = &tables.frequency[1];
        assert_eq!((bite.behavior.as_str(), bite.count), ("BITE", 2));
        assert_eq!((flee.behavior.as_str(), flee.count), ("FLEE", 1));
        assert!((bite.probability - 2.0 / 3.0).abs() < TOLERANCE);
        assert!((flee.probability - 1.0 / 3.0).abs() < TOLERANCE);

        assert_eq!(tables.transitions.len(), 2);
        assert!((find_transition(&tables, "BITE", "FLEE").probability - 1.0).abs() < TOLERANCE);
        assert!((find_transition(&tables, "FLEE", "BITE").probability - 1.0).abs() < TOLERANCE);
        assert!(tables
            .transitions
            .iter()
            .all(|row| !row.from.is_out_of_view() && !row.to.is_out_of_view()));
        assert!(tables.frequency.iter().all(|row| !row.behavior.is_out_of_view()));
    }

    #[test]
    fn test_pooling_sums_counts_before_normalizing() {
        // File A: 10 of 12 events are CHASE. File B: 1 of 8.
        let mut a: Vec<(&str, f64)> = vec![("Chase", 0.0); 10];
        a.extend([("Flee", 0.0), ("Bite", 0.0)]);
        let mut b: Vec<(&str, f64)> = vec![("Chase", 0.0)];
        b.extend(vec![("Dig", 0.0); 7]);

        let tables = aggregate_sequences(
            &[sequence("a", &a), sequence("b", &b)],
            GroupingPolicy::Basic,
        )
        .unwrap();

        let chase = tables
            .frequency
            .iter()
            .find(|row| row.behavior.as_str() == "CHASE")
            .unwrap();
        assert_eq!(chase.count, 11);
        assert_eq!(chase.total, 20);
        assert!((chase.probability - 11.0 / 20.0).abs() < TOLERANCE);

        let averaged = (10.0 / 12.0 + 1.0 / 8.0) / 2.0;
        assert!((chase.probability - averaged).abs() > 0.01);
        assert_row_stochastic(&tables);
    }

    #[test]
    fn test_time_hours_do_not_mix() {
        let seq = sequence("fish", &[("Bite", 0.0), ("Bite", 3700.0), ("Flee", 3750.0)]);
        let tables = aggregate_sequences(&[seq], GroupingPolicy::Time).unwrap();

        assert_eq!(
            tables.groups().into_iter().collect::<Vec<_>>(),
            vec![GroupKey::ByHour(0), GroupKey::ByHour(2)]
        );
        for group in tables.groups() {
            let sum: f64 = tables
                .frequency_in(&group)
                .iter()
                .map(|row| row.probability)
                .sum();
            assert!((sum - 1.0).abs() < TOLERANCE);
        }

        let early = tables.frequency_in(&GroupKey::ByHour(0))[0];
        assert_eq!((early.count, early.total), (1, 1));

        let bite_bite = find_transition(&tables, "BITE", "BITE");
        assert_eq!(bite_bite.group, GroupKey::ByHour(0));
        assert_row_stochastic(&tables);
    }

    #[test]
    fn test_category_frequency_not_partitioned() {
        let seq = ObservationSequence::new(
            "fish",
            vec![
                BehaviorEvent::new("Chase", 0.0).with_category("Aggressive"),
                BehaviorEvent::new("Frontal display", 1.0).with_category("Aggressive"),
                BehaviorEvent::new("Dig", 2.0).with_category("Reproductive"),
                BehaviorEvent::new("Chase", 3.0).with_category("Aggressive"),
            ],
        );
        let tables = aggregate_sequences(&[seq], GroupingPolicy::Category).unwrap();

        let total: f64 = tables.frequency.iter().map(|row| row.probability).sum();
        assert!((total - 1.0).abs() < TOLERANCE);
        assert!(tables.frequency.iter().all(|row| row.total == 4));

        let dig = tables
            .frequency
            .iter()
            .find(|row| row.behavior.as_str() == "DIG")
            .unwrap();
        assert!((dig.probability - 0.25).abs() < TOLERANCE);
        assert_row_stochastic(&tables);
    }

    #[test]
    fn test_no_retained_events_yields_empty_tables() {
        let seq = sequence("fish", &[("Out of view", 0.0)]);
        let tables = aggregate_sequences(&[seq], GroupingPolicy::Basic).unwrap();
        assert!(tables.is_empty());

        let tables = aggregate_sequences(&[], GroupingPolicy::Time).unwrap();
        assert!(tables.is_empty());
        assert_eq!(tables.files, 0);
    }

    #[test]
    fn test_aggregate_cohort_from_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("fish-a.csv"),
            "Time,Behavior\n0,Bite\n1,Out of view\n2,Flee\n5,Bite\n",
        )
        .unwrap();
        fs::write(dir.path().join("fish-b.tsv"), "Time\tBehavior\n0\tFlee\n3\tFlee\n").unwrap();

        let tables = aggregate_cohort(dir.path(), GroupingPolicy::Basic).unwrap();
        assert_eq!(tables.files, 2);

        let flee_flee = find_transition(&tables, "FLEE", "FLEE");
        assert_eq!(flee_flee.count, 1);
        assert!((flee_flee.probability - 0.5).abs() < TOLERANCE);
        assert_row_stochastic(&tables);
    }

    #[test]
    fn test_aggregate_cohort_aborts_on_bad_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("good.csv"), "Time,Behavior\n0,Bite\n").unwrap();
        fs::write(dir.path().join("bad.csv"), "Time,Behavior\nnoon,Bite\n").unwrap();

        let err = aggregate_cohort(dir.path(), GroupingPolicy::Basic).unwrap_err();
        assert!(matches!(err, EthoError::TimeParse { .. }));
    }

    #[test]
    fn test_aggregate_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            aggregate_cohort(&missing, GroupingPolicy::Basic),
            Err(EthoError::Io(_))
        ));
    }
}
