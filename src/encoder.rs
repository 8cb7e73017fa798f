//! Table encoder
//!
//! Writes cohort tables as CSV (one file per table) or JSON, plus a manifest
//! describing the run for the rendering collaborator.

use crate::config::{ColorMap, JobConfig};
use crate::error::EthoError;
use crate::transition::types::{
    CanonicalLabel, CohortTables, GroupKey, GroupingPolicy, DEFAULT_EDGE_VISIBILITY_THRESHOLD,
};
use crate::{ETHOCHAIN_VERSION, PRODUCER_NAME};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const BEHAVIOR: &str = "BEHAVIOR";
pub const BEHAVIOR_NEXT: &str = "BEHAVIOR_NEXT";
pub const HOUR_PERFORMED: &str = "HOUR_PERFORMED";
pub const BEHAVIORAL_CATEGORY: &str = "BEHAVIORAL_CATEGORY";
pub const BEHAVIOR_COUNTS: &str = "BEHAVIOR_COUNTS";
pub const BEHAVIOR_TOTALS: &str = "BEHAVIOR_TOTALS";
pub const BEHAVIOR_PROBABILITY: &str = "BEHAVIOR_PROBABILITY";
pub const TRANSITION_COUNTS: &str = "TRANSITION_COUNTS";
pub const TRANSITION_PROBABILITY: &str = "TRANSITION_PROBABILITY";

/// Run metadata written next to each job's tables
#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    pub run_id: String,
    pub producer: String,
    pub version: String,
    pub generated_at_utc: String,
    pub job_name: String,
    pub subject: String,
    pub environment: String,
    pub group_by: GroupingPolicy,
    pub attach_legend: Option<bool>,
    pub color_map: ColorMap,
    /// Resolved fill color of every behavior node
    pub node_colors: BTreeMap<CanonicalLabel, String>,
    pub edge_visibility_threshold: f64,
    pub files: usize,
    pub behavior_rows: usize,
    pub transition_rows: usize,
    /// Transitions at or above the edge visibility threshold
    pub visible_transition_rows: usize,
}

/// Files written for one job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputPaths {
    pub behaviors: PathBuf,
    pub transitions: PathBuf,
    /// Run manifest for jobs; full JSON tables for ad-hoc aggregation
    pub manifest: PathBuf,
}

impl OutputPaths {
    pub fn for_job(job: &JobConfig) -> Self {
        let dir = job.output_dir();
        let stem = job.output_stem();
        Self {
            behaviors: dir.join(format!("{stem}_behaviors.csv")),
            transitions: dir.join(format!("{stem}_transitions.csv")),
            manifest: dir.join(format!("{stem}_manifest.json")),
        }
    }
}

/// Encoder for cohort tables
pub struct TableEncoder {
    run_id: String,
}

impl Default for TableEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableEncoder {
    /// Create an encoder with a fresh run ID
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific run ID
    pub fn with_run_id(run_id: String) -> Self {
        Self { run_id }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Write the frequency table as CSV
    pub fn write_frequency_csv<W: Write>(
        &self,
        tables: &CohortTables,
        writer: W,
    ) -> Result<(), EthoError> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        let mut header = vec![BEHAVIOR];
        header.extend(group_columns(tables.policy));
        header.extend([BEHAVIOR_COUNTS, BEHAVIOR_TOTALS, BEHAVIOR_PROBABILITY]);
        csv_writer.write_record(&header)?;

        for row in &tables.frequency {
            let mut record = vec![row.behavior.to_string()];
            record.extend(group_values(tables.policy, &row.group));
            record.extend([
                row.count.to_string(),
                row.total.to_string(),
                row.probability.to_string(),
            ]);
            csv_writer.write_record(&record)?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Write the transition table as CSV
    pub fn write_transitions_csv<W: Write>(
        &self,
        tables: &CohortTables,
        writer: W,
    ) -> Result<(), EthoError> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        let mut header = vec![BEHAVIOR, BEHAVIOR_NEXT];
        header.extend(group_columns(tables.policy));
        header.extend([TRANSITION_COUNTS, BEHAVIOR_TOTALS, TRANSITION_PROBABILITY]);
        csv_writer.write_record(&header)?;

        for row in &tables.transitions {
            let mut record = vec![row.from.to_string(), row.to.to_string()];
            record.extend(group_values(tables.policy, &row.group));
            record.extend([
                row.count.to_string(),
                row.total.to_string(),
                row.probability.to_string(),
            ]);
            csv_writer.write_record(&record)?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Encode tables to a JSON string
    pub fn encode_to_json(&self, tables: &CohortTables, pretty: bool) -> Result<String, EthoError> {
        let json = if pretty {
            serde_json::to_string_pretty(tables)?
        } else {
            serde_json::to_string(tables)?
        };
        Ok(json)
    }

    /// Build the manifest for a job's tables
    pub fn manifest(&self, job: &JobConfig, tables: &CohortTables) -> RunManifest {
        let node_colors = tables
            .frequency
            .iter()
            .map(|row| {
                let color = job.color_map.color_for(row.behavior.as_str());
                (row.behavior.clone(), color.to_string())
            })
            .collect();

        RunManifest {
            run_id: self.run_id.clone(),
            producer: PRODUCER_NAME.to_string(),
            version: ETHOCHAIN_VERSION.to_string(),
            generated_at_utc: Utc::now().to_rfc3339(),
            job_name: job.name.clone(),
            subject: job.subject.clone(),
            environment: job.environment.clone(),
            group_by: job.group_by,
            attach_legend: job.attach_legend,
            color_map: job.color_map.clone(),
            node_colors,
            edge_visibility_threshold: DEFAULT_EDGE_VISIBILITY_THRESHOLD,
            files: tables.files,
            behavior_rows: tables.frequency.len(),
            transition_rows: tables.transitions.len(),
            visible_transition_rows: tables
                .visible_transitions(DEFAULT_EDGE_VISIBILITY_THRESHOLD)
                .count(),
        }
    }

    /// Write both tables and the manifest under the job's output directory
    pub fn write_job_outputs(
        &self,
        job: &JobConfig,
        tables: &CohortTables,
    ) -> Result<OutputPaths, EthoError> {
        let paths = OutputPaths::for_job(job);
        fs::create_dir_all(job.output_dir())?;

        self.write_frequency_csv(tables, fs::File::create(&paths.behaviors)?)?;
        self.write_transitions_csv(tables, fs::File::create(&paths.transitions)?)?;

        let manifest = serde_json::to_string_pretty(&self.manifest(job, tables))?;
        fs::write(&paths.manifest, manifest)?;

        Ok(paths)
    }

    /// Write tables into an arbitrary directory without a job (CLI `aggregate`)
    pub fn write_tables_to_dir(
        &self,
        dir: &Path,
        tables: &CohortTables,
    ) -> Result<OutputPaths, EthoError> {
        let dir = dir.join(tables.policy.as_str());
        fs::create_dir_all(&dir)?;

        let paths = OutputPaths {
            behaviors: dir.join("behavior_table.csv"),
            transitions: dir.join("transition_table.csv"),
            manifest: dir.join("tables.json"),
        };
        self.write_frequency_csv(tables, fs::File::create(&paths.behaviors)?)?;
        self.write_transitions_csv(tables, fs::File::create(&paths.transitions)?)?;
        fs::write(&paths.manifest, self.encode_to_json(tables, true)?)?;

        Ok(paths)
    }
}

fn group_columns(policy: GroupingPolicy) -> Vec<&'static str> {
    match policy {
        GroupingPolicy::Basic => vec![],
        GroupingPolicy::Time => vec![HOUR_PERFORMED],
        GroupingPolicy::Category => vec![BEHAVIORAL_CATEGORY],
    }
}

fn group_values(policy: GroupingPolicy, group: &GroupKey) -> Vec<String> {
    match policy {
        GroupingPolicy::Basic => vec![],
        GroupingPolicy::Time => vec![group.hour().map(|h| h.to_string()).unwrap_or_default()],
        GroupingPolicy::Category => vec![group
            .category()
            .map(|c| c.to_string())
            .unwrap_or_default()],
    }
}
