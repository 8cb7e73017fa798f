//! Multi-job orchestration
//!
//! Each job aggregates one cohort. A failing job is reported and skipped;
//! sibling jobs still run.

use crate::config::{JobConfig, RunConfig};
use crate::encoder::{OutputPaths, TableEncoder};
use crate::error::EthoError;
use crate::transition::aggregate_cohort;
use tracing::{info, warn};

/// Result of running one job
#[derive(Debug)]
pub struct JobOutcome {
    pub name: String,
    pub result: Result<OutputPaths, EthoError>,
}

impl JobOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Aggregate one job's cohort and write its tables
pub fn run_job(job: &JobConfig, encoder: &TableEncoder) -> Result<OutputPaths, EthoError> {
    let tables = aggregate_cohort(&job.input_folder, job.group_by)?;
    if tables.is_empty() {
        warn!(job = %job.name, "cohort has no retained events; writing empty tables");
    }
    encoder.write_job_outputs(job, &tables)
}

/// Run every job in order, isolating failures per job
pub fn run_jobs(config: &RunConfig, encoder: &TableEncoder) -> Vec<JobOutcome> {
    info!(jobs = config.jobs.len(), run_id = encoder.run_id(), "job processing started");

    let outcomes: Vec<JobOutcome> = config
        .jobs
        .iter()
        .enumerate()
        .map(|(idx, job)| {
            info!(job = %job.name, index = idx + 1, policy = %job.group_by, "processing job");
            let result = run_job(job, encoder);
            if let Err(e) = &result {
                warn!(job = %job.name, error = %e, "job failed");
            }
            JobOutcome {
                name: job.name.clone(),
                result,
            }
        })
        .collect();

    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
    info!(
        processed = outcomes.len(),
        failed,
        "all jobs processed"
    );
    outcomes
}
