//! Job configuration
//!
//! A run is described by a JSON document listing one job per cohort. Keys are
//! case-insensitive; per-job folders and the legend flag fall back to the
//! `GLOBAL_*` values when a job leaves them out.
//!
//! ```json
//! {
//!   "global_input_folder": "logs",
//!   "global_output_folder": "out",
//!   "jobs": [
//!     { "input_folder": "logs/BlueFishinBlue", "subject": "Blue", "env": "Blue",
//!       "group_by": "time", "color_map": { "Bite": "#b52dc8" } }
//!   ]
//! }
//! ```

use crate::error::EthoError;
use crate::transition::types::{canonicalize, CanonicalLabel, GroupingPolicy};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Fallback node color
pub const DEFAULT_COLOR: &str = "antiquewhite";

/// Default background tints keyed by environment
const DEFAULT_ENV_COLORS: [(&str, &str); 2] = [("ENV_YELLOW", "#FFFFCC"), ("ENV_BLUE", "#CCFFFF")];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct RawRunConfig {
    #[serde(default)]
    global_input_folder: Option<PathBuf>,
    #[serde(default)]
    global_output_folder: Option<PathBuf>,
    #[serde(default)]
    global_attach_legend: Option<bool>,
    jobs: Vec<RawJobConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct RawJobConfig {
    #[serde(default, alias = "JOB_TITLE")]
    job_name: Option<String>,
    #[serde(default)]
    input_folder: Option<PathBuf>,
    #[serde(default)]
    output_folder: Option<PathBuf>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    env: Option<String>,
    #[serde(default)]
    color_map: BTreeMap<String, String>,
    #[serde(default)]
    group_by: Option<String>,
    #[serde(default)]
    attach_legend: Option<bool>,
}

/// Colors for the rendering collaborator, keyed by canonical label
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ColorMap(BTreeMap<CanonicalLabel, String>);

impl ColorMap {
    /// Build a color map, canonicalizing keys and filling defaults
    pub fn new(raw: BTreeMap<String, String>) -> Result<Self, EthoError> {
        let mut colors = BTreeMap::new();
        for (key, value) in raw {
            let value = value.trim().to_string();
            if !is_valid_color(&value) {
                return Err(EthoError::InvalidConfig(format!(
                    "invalid color '{}' for '{}'",
                    value, key
                )));
            }
            colors.insert(CanonicalLabel::new(&key), value);
        }

        colors
            .entry(CanonicalLabel::new("DEFAULT"))
            .or_insert_with(|| DEFAULT_COLOR.to_string());
        for (key, color) in DEFAULT_ENV_COLORS {
            colors
                .entry(CanonicalLabel::new(key))
                .or_insert_with(|| color.to_string());
        }

        Ok(Self(colors))
    }

    /// Color for a label, falling back to the `DEFAULT` entry
    pub fn color_for(&self, label: &str) -> &str {
        self.0
            .get(&CanonicalLabel::new(label))
            .or_else(|| self.0.get(&CanonicalLabel::new("DEFAULT")))
            .map(String::as_str)
            .unwrap_or(DEFAULT_COLOR)
    }
}

/// `#RRGGBB` hex (any case) or a plain color name such as `gold2`
pub fn is_valid_color(value: &str) -> bool {
    match value.strip_prefix('#') {
        Some(hex) => hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric()),
    }
}

/// One cohort to aggregate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobConfig {
    pub name: String,
    pub input_folder: PathBuf,
    pub output_folder: PathBuf,
    pub subject: String,
    pub environment: String,
    pub color_map: ColorMap,
    pub group_by: GroupingPolicy,
    /// `Some(true)` attaches the legend to the diagram, `Some(false)` renders it
    /// separately, `None` omits it
    pub attach_legend: Option<bool>,
}

impl JobConfig {
    /// Base name of every output file for this job, e.g. `BlueBehaviorYellow`
    pub fn output_stem(&self) -> String {
        format!("{}Behavior{}", self.subject, self.environment)
    }

    /// Directory the job's tables are written to: `<output>/<GROUP_BY>`
    pub fn output_dir(&self) -> PathBuf {
        self.output_folder.join(self.group_by.as_str())
    }
}

/// A validated run: every job resolved against the global defaults
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunConfig {
    pub jobs: Vec<JobConfig>,
}

impl RunConfig {
    /// Read and validate a configuration file
    pub fn load(path: &Path) -> Result<Self, EthoError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Parse and validate a configuration document
    pub fn from_json(json: &str) -> Result<Self, EthoError> {
        let value: Value = serde_json::from_str(json)?;
        let raw: RawRunConfig = serde_json::from_value(normalize_keys(value)?)?;

        let jobs = raw
            .jobs
            .into_iter()
            .enumerate()
            .map(|(idx, job)| {
                resolve_job(
                    idx,
                    job,
                    raw.global_input_folder.as_deref(),
                    raw.global_output_folder.as_deref(),
                    raw.global_attach_legend,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { jobs })
    }
}

fn resolve_job(
    idx: usize,
    job: RawJobConfig,
    global_input: Option<&Path>,
    global_output: Option<&Path>,
    global_attach_legend: Option<bool>,
) -> Result<JobConfig, EthoError> {
    let name = job
        .job_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| format!("job-{}", idx + 1));

    let input_folder = job
        .input_folder
        .or_else(|| global_input.map(Path::to_path_buf))
        .ok_or_else(|| EthoError::InvalidConfig(format!("{}: no input folder", name)))?;
    let output_folder = job
        .output_folder
        .or_else(|| global_output.map(Path::to_path_buf))
        .ok_or_else(|| EthoError::InvalidConfig(format!("{}: no output folder", name)))?;

    let group_by = match job.group_by.as_deref() {
        Some(raw) => raw.parse::<GroupingPolicy>()?,
        None => GroupingPolicy::default(),
    };

    Ok(JobConfig {
        name,
        input_folder,
        output_folder,
        subject: job.subject.unwrap_or_default(),
        environment: job.env.unwrap_or_default(),
        color_map: ColorMap::new(job.color_map)?,
        group_by,
        attach_legend: job.attach_legend.or(global_attach_legend),
    })
}

/// Upper-case the top-level keys and the keys of each job object
fn normalize_keys(value: Value) -> Result<Value, EthoError> {
    let Value::Object(top) = value else {
        return Err(EthoError::InvalidConfig(
            "configuration must be a JSON object".to_string(),
        ));
    };

    let mut top = upper_keys(top);
    match top.get_mut("JOBS") {
        Some(Value::Array(jobs)) => {
            for job in jobs.iter_mut() {
                if let Value::Object(map) = job {
                    *map = upper_keys(std::mem::take(map));
                }
            }
        }
        Some(_) => {
            return Err(EthoError::InvalidConfig("JOBS must be a list".to_string()));
        }
        None => {
            return Err(EthoError::InvalidConfig("missing JOBS".to_string()));
        }
    }
    Ok(Value::Object(top))
}

fn upper_keys(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .map(|(key, value)| (canonicalize(&key), value))
        .collect()
}
