//! Behavior-transition aggregation engine
//!
//! Turns per-subject ethogram logs into a behavior-frequency table and a
//! first-order transition-probability table for one cohort.
//!
//! Pipeline: Observation logs → Adapter → Counts (per file) → Pooling → Normalizer → Tables

pub mod adapter;
pub mod counts;
pub mod normalizer;
pub mod pipeline;
pub mod pooling;
pub mod types;

pub use pipeline::{aggregate_cohort, aggregate_sequences};
pub use types::{
    canonicalize, round_percent, BehaviorEvent, CanonicalLabel, CohortTables, CountTables,
    FrequencyKey, FrequencyRow, GroupKey, GroupingPolicy, ObservationSequence, TransitionKey,
    TransitionRow, DEFAULT_EDGE_VISIBILITY_THRESHOLD, OUT_OF_VIEW,
};
