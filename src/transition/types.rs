//! Behavior-transition data types
//!
//! This module defines the events read from observation logs, the grouping keys
//! the aggregator partitions by, and the frequency/transition tables handed to
//! rendering collaborators.

use crate::error::EthoError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Sentinel behavior meaning "subject not visible"; never a real state
pub const OUT_OF_VIEW: &str = "OUT_OF_VIEW";

/// Width of one TIME bucket in seconds
pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// Edges below this probability are hidden in rendered chain diagrams
pub const DEFAULT_EDGE_VISIBILITY_THRESHOLD: f64 = 0.05;

/// Canonicalize a raw label: trim, upper-case, spaces to underscores.
///
/// `"Head to Head"` becomes `"HEAD_TO_HEAD"`. Canonical input is returned unchanged.
pub fn canonicalize(raw: &str) -> String {
    raw.trim().to_uppercase().replace(' ', "_")
}

/// Upper-case, underscore-joined behavior or category token
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CanonicalLabel(String);

impl CanonicalLabel {
    pub fn new(raw: &str) -> Self {
        Self(canonicalize(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this label is the [`OUT_OF_VIEW`] sentinel
    pub fn is_out_of_view(&self) -> bool {
        self.0 == OUT_OF_VIEW
    }
}

impl From<String> for CanonicalLabel {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl From<&str> for CanonicalLabel {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<CanonicalLabel> for String {
    fn from(label: CanonicalLabel) -> Self {
        label.0
    }
}

impl AsRef<str> for CanonicalLabel {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Probability as a percentage rounded to one decimal (ties to even), as shown on diagram edges
pub fn round_percent(probability: f64) -> f64 {
    (probability * 1000.0).round_ties_even() / 10.0
}

/// Hour bucket of a timestamp in seconds: `ceil(t / 3600)`
pub fn hour_bucket(timestamp: f64) -> i64 {
    (timestamp / SECONDS_PER_HOUR).ceil() as i64
}

/// One row of a subject's observation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorEvent {
    /// Canonical behavior label
    pub behavior: CanonicalLabel,
    /// Time since the start of the recording, in seconds
    pub timestamp: f64,
    /// Canonical behavioral category (present when the log was read for CATEGORY grouping)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<CanonicalLabel>,
}

impl BehaviorEvent {
    pub fn new(behavior: impl Into<CanonicalLabel>, timestamp: f64) -> Self {
        Self {
            behavior: behavior.into(),
            timestamp,
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<CanonicalLabel>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn hour(&self) -> i64 {
        hour_bucket(self.timestamp)
    }
}

/// Ordered events of exactly one subject-recording (one file)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationSequence {
    /// File stem the sequence was read from
    pub name: String,
    /// Events in temporal order
    pub events: Vec<BehaviorEvent>,
}

impl ObservationSequence {
    pub fn new(name: impl Into<String>, events: Vec<BehaviorEvent>) -> Self {
        Self {
            name: name.into(),
            events,
        }
    }
}

/// How counts are partitioned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupingPolicy {
    /// No extra partition
    #[default]
    #[serde(rename = "BASIC")]
    Basic,
    /// Partition by hour bucket
    #[serde(rename = "TIME")]
    Time,
    /// Carry the behavioral category alongside the behavior
    #[serde(rename = "BEHAVIORAL_CATEGORY", alias = "CATEGORY")]
    Category,
}

impl GroupingPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "BASIC",
            Self::Time => "TIME",
            Self::Category => "BEHAVIORAL_CATEGORY",
        }
    }

    /// Whether logs must provide a `Behavioral category` column
    pub fn requires_category(&self) -> bool {
        matches!(self, Self::Category)
    }
}

impl fmt::Display for GroupingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupingPolicy {
    type Err = EthoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match canonicalize(s).as_str() {
            "" | "BASIC" => Ok(Self::Basic),
            "TIME" => Ok(Self::Time),
            "BEHAVIORAL_CATEGORY" | "CATEGORY" => Ok(Self::Category),
            _ => Err(EthoError::UnknownGroupingPolicy(s.to_string())),
        }
    }
}

/// Non-behavior part of a count key, one variant per grouping policy
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    Basic,
    ByHour(i64),
    ByCategory(CanonicalLabel),
}

impl GroupKey {
    pub fn hour(&self) -> Option<i64> {
        match self {
            Self::ByHour(hour) => Some(*hour),
            _ => None,
        }
    }

    pub fn category(&self) -> Option<&CanonicalLabel> {
        match self {
            Self::ByCategory(category) => Some(category),
            _ => None,
        }
    }

    /// Partition that frequency probabilities are normalized within.
    ///
    /// Hours partition the denominator; categories do not.
    pub fn frequency_scope(&self) -> GroupKey {
        match self {
            Self::ByHour(hour) => Self::ByHour(*hour),
            Self::Basic | Self::ByCategory(_) => Self::Basic,
        }
    }
}

/// Key of one behavior-frequency count
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrequencyKey {
    pub behavior: CanonicalLabel,
    pub group: GroupKey,
}

/// Key of one transition count
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransitionKey {
    pub from: CanonicalLabel,
    pub to: CanonicalLabel,
    pub group: GroupKey,
}

/// Raw counts for one file, or pooled over a cohort
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountTables {
    pub behavior_counts: BTreeMap<FrequencyKey, u64>,
    pub transition_counts: BTreeMap<TransitionKey, u64>,
}

impl CountTables {
    pub fn is_empty(&self) -> bool {
        self.behavior_counts.is_empty() && self.transition_counts.is_empty()
    }

    pub fn total_events(&self) -> u64 {
        self.behavior_counts.values().sum()
    }

    pub fn total_transitions(&self) -> u64 {
        self.transition_counts.values().sum()
    }
}

/// Behavior frequency with its normalized probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyRow {
    pub behavior: CanonicalLabel,
    pub group: GroupKey,
    pub count: u64,
    /// Denominator the probability was computed against
    pub total: u64,
    pub probability: f64,
}

/// Transition count with its row-stochastic probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRow {
    pub from: CanonicalLabel,
    pub to: CanonicalLabel,
    pub group: GroupKey,
    pub count: u64,
    /// Transitions leaving `from` within the same group
    pub total: u64,
    pub probability: f64,
}

/// Terminal frequency and transition tables for one cohort
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortTables {
    pub policy: GroupingPolicy,
    /// Number of observation files pooled
    pub files: usize,
    pub frequency: Vec<FrequencyRow>,
    pub transitions: Vec<TransitionRow>,
}

impl CohortTables {
    pub fn empty(policy: GroupingPolicy) -> Self {
        Self {
            policy,
            files: 0,
            frequency: Vec::new(),
            transitions: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frequency.is_empty() && self.transitions.is_empty()
    }

    /// Distinct groups present, one diagram or cluster each
    pub fn groups(&self) -> BTreeSet<GroupKey> {
        self.frequency
            .iter()
            .map(|row| row.group.clone())
            .chain(self.transitions.iter().map(|row| row.group.clone()))
            .collect()
    }

    pub fn frequency_in(&self, group: &GroupKey) -> Vec<&FrequencyRow> {
        self.frequency
            .iter()
            .filter(|row| &row.group == group)
            .collect()
    }

    pub fn transitions_in(&self, group: &GroupKey) -> Vec<&TransitionRow> {
        self.transitions
            .iter()
            .filter(|row| &row.group == group)
            .collect()
    }

    /// Transitions drawn as edges at the given probability threshold.
    ///
    /// The cutoff applies to the rounded percentage printed on the edge, so
    /// 0.0496 (shown as 5.0%) passes a 0.05 threshold.
    pub fn visible_transitions(&self, threshold: f64) -> impl Iterator<Item = &TransitionRow> {
        let cutoff = threshold * 100.0;
        self.transitions
            .iter()
            .filter(move |row| round_percent(row.probability) >= cutoff)
    }

    /// First category the behavior was observed under
    pub fn category_of(&self, behavior: &CanonicalLabel) -> Option<&CanonicalLabel> {
        self.frequency
            .iter()
            .filter(|row| &row.behavior == behavior)
            .find_map(|row| row.group.category())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_label() {
        assert_eq!(canonicalize("Head to Head"), "HEAD_TO_HEAD");
        assert_eq!(canonicalize("  Out of view "), "OUT_OF_VIEW");
        assert_eq!(canonicalize("Pot entry/exit"), "POT_ENTRY/EXIT");
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        assert_eq!(canonicalize("BITE"), "BITE");
        let once = canonicalize("Lateral display");
        assert_eq!(canonicalize(&once), once);
    }

    #[test]
    fn test_label_deserializes_canonical() {
        let label: CanonicalLabel = serde_json::from_str("\"Head to Head\"").unwrap();
        assert_eq!(label.as_str(), "HEAD_TO_HEAD");
        assert_eq!(serde_json::to_string(&label).unwrap(), "\"HEAD_TO_HEAD\"");
    }

    #[test]
    fn test_sentinel_detection() {
        assert!(CanonicalLabel::new("Out of view").is_out_of_view());
        assert!(!CanonicalLabel::new("Bite").is_out_of_view());
    }

    #[test]
    fn test_hour_bucket() {
        assert_eq!(hour_bucket(0.0), 0);
        assert_eq!(hour_bucket(1.0), 1);
        assert_eq!(hour_bucket(3600.0), 1);
        assert_eq!(hour_bucket(3700.0), 2);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("basic".parse::<GroupingPolicy>().unwrap(), GroupingPolicy::Basic);
        assert_eq!("Time".parse::<GroupingPolicy>().unwrap(), GroupingPolicy::Time);
        assert_eq!(
            "Behavioral category".parse::<GroupingPolicy>().unwrap(),
            GroupingPolicy::Category
        );
        assert_eq!("category".parse::<GroupingPolicy>().unwrap(), GroupingPolicy::Category);
        assert!("status".parse::<GroupingPolicy>().is_err());
    }

    #[test]
    fn test_frequency_scope() {
        assert_eq!(GroupKey::ByHour(3).frequency_scope(), GroupKey::ByHour(3));
        assert_eq!(
            GroupKey::ByCategory(CanonicalLabel::new("Aggressive")).frequency_scope(),
            GroupKey::Basic
        );
        assert_eq!(GroupKey::Basic.frequency_scope(), GroupKey::Basic);
    }

    fn transition(from: &str, to: &str, count: u64, total: u64) -> TransitionRow {
        TransitionRow {
            from: CanonicalLabel::new(from),
            to: CanonicalLabel::new(to),
            group: GroupKey::Basic,
            count,
            total,
            probability: count as f64 / total as f64,
        }
    }

    #[test]
    fn test_round_percent() {
        assert_eq!(round_percent(0.0496), 5.0);
        assert_eq!(round_percent(0.0494), 4.9);
        assert_eq!(round_percent(1.0), 100.0);
        assert_eq!(round_percent(0.0), 0.0);
    }

    #[test]
    fn test_visible_transitions_use_rounded_percent() {
        let mut tables = CohortTables::empty(GroupingPolicy::Basic);
        tables.transitions = vec![
            // 4.96% prints as 5.0%
            transition("Bite", "Flee", 62, 1250),
            // 4.94% prints as 4.9%
            transition("Chase", "Dig", 247, 5000),
            transition("Flee", "Bite", 1, 1),
        ];

        let visible: Vec<_> = tables
            .visible_transitions(DEFAULT_EDGE_VISIBILITY_THRESHOLD)
            .map(|row| (row.from.as_str(), row.to.as_str()))
            .collect();
        assert_eq!(visible, vec![("BITE", "FLEE"), ("FLEE", "BITE")]);

        assert_eq!(tables.visible_transitions(0.0).count(), 3);
        assert_eq!(tables.visible_transitions(1.0).count(), 1);
    }

    #[test]
    fn test_category_of() {
        let tables = CohortTables {
            policy: GroupingPolicy::Category,
            files: 1,
            frequency: vec![FrequencyRow {
                behavior: CanonicalLabel::new("Bite"),
                group: GroupKey::ByCategory(CanonicalLabel::new("Aggressive")),
                count: 1,
                total: 1,
                probability: 1.0,
            }],
            transitions: Vec::new(),
        };

        assert_eq!(
            tables.category_of(&CanonicalLabel::new("BITE")).map(|c| c.as_str()),
            Some("AGGRESSIVE")
        );
        assert_eq!(tables.category_of(&CanonicalLabel::new("FLEE")), None);
    }
}
