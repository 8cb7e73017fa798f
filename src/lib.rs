//! Ethochain - Behavior-transition aggregation for ethogram observation logs
//!
//! Ethochain turns per-subject, time-stamped behavior logs into the tables
//! behind Markov-chain diagrams: a behavior-frequency table (node sizes) and a
//! first-order transition-probability table (edge weights). The pipeline is
//! deterministic: log adaptation → per-file counting → cohort pooling →
//! probability normalization → table encoding.
//!
//! ## Grouping policies
//!
//! - **BASIC**: one partition; all denominators are grand totals
//! - **TIME**: partitioned by hour bucket `ceil(t / 3600)`
//! - **BEHAVIORAL_CATEGORY**: each behavior carries its category; transitions
//!   normalize per category, frequencies over the whole cohort

pub mod config;
pub mod encoder;
pub mod error;
pub mod jobs;
pub mod transition;

pub use config::{JobConfig, RunConfig};
pub use encoder::TableEncoder;
pub use error::EthoError;
pub use jobs::{run_jobs, JobOutcome};
pub use transition::{
    aggregate_cohort, aggregate_sequences, BehaviorEvent, CanonicalLabel, CohortTables,
    GroupKey, GroupingPolicy, ObservationSequence,
};

/// Ethochain version embedded in every manifest
pub const ETHOCHAIN_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for manifests
pub const PRODUCER_NAME: &str = "ethochain";
