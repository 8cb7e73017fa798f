//! Observation log adapter
//!
//! Reads a cohort directory of comma- or tab-separated observation logs and
//! converts each file into an [`ObservationSequence`] of canonical events.

use crate::error::EthoError;
use crate::transition::types::{
    BehaviorEvent, CanonicalLabel, GroupingPolicy, ObservationSequence,
};
use csv::{ReaderBuilder, StringRecord};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Column holding the behavior label
pub const BEHAVIOR_COLUMN: &str = "Behavior";

/// Column holding the event time in seconds
pub const TIME_COLUMN: &str = "Time";

/// Column holding the behavioral category (CATEGORY grouping only)
pub const CATEGORY_COLUMN: &str = "Behavioral category";

/// Marks a frame-indexed log; its `Time` values are not seconds
pub const FRAME_COLUMN: &str = "frame";

/// Timestamp assigned to every event of a frame-indexed log (hour 1)
pub const FRAME_LOG_TIMESTAMP: f64 = 1.0;

/// Field delimiter for a log file, chosen by extension
pub fn delimiter_for(path: &Path) -> Option<u8> {
    let ext = path.extension()?.to_str()?;
    if ext.eq_ignore_ascii_case("csv") {
        Some(b',')
    } else if ext.eq_ignore_ascii_case("tsv") {
        Some(b'\t')
    } else {
        None
    }
}

/// List the observation logs in a cohort directory, in file-name order
pub fn discover_logs(dir: &Path) -> Result<Vec<PathBuf>, EthoError> {
    let mut logs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && delimiter_for(&path).is_some() {
            logs.push(path);
        }
    }
    logs.sort();
    Ok(logs)
}

/// Load every log in a cohort directory.
///
/// Any file that fails to load fails the whole cohort.
pub fn load_cohort(
    dir: &Path,
    policy: GroupingPolicy,
) -> Result<Vec<ObservationSequence>, EthoError> {
    discover_logs(dir)?
        .iter()
        .map(|path| load_sequence(path, policy))
        .collect()
}

/// Load one observation log from disk
pub fn load_sequence(
    path: &Path,
    policy: GroupingPolicy,
) -> Result<ObservationSequence, EthoError> {
    let delimiter = delimiter_for(path).unwrap_or(b',');
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let file = File::open(path)?;
    let sequence = read_sequence(&name, path, file, delimiter, policy)?;
    debug!(
        file = %path.display(),
        events = sequence.events.len(),
        "loaded observation log"
    );
    Ok(sequence)
}

/// Parse an observation log from any reader.
///
/// `source` is only used to label errors.
pub fn read_sequence<R: Read>(
    name: &str,
    source: &Path,
    reader: R,
    delimiter: u8,
    policy: GroupingPolicy,
) -> Result<ObservationSequence, EthoError> {
    let mut csv_reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let behavior_idx = column_index(&headers, BEHAVIOR_COLUMN, source)?;
    let time_idx = column_index(&headers, TIME_COLUMN, source)?;
    let category_idx = if policy.requires_category() {
        Some(column_index(&headers, CATEGORY_COLUMN, source)?)
    } else {
        None
    };
    let frame_indexed = column_index(&headers, FRAME_COLUMN, source).is_ok();
    if frame_indexed {
        debug!(file = %source.display(), "frame-indexed log; Time values ignored");
    }

    let mut events = Vec::new();
    for (idx, record) in csv_reader.records().enumerate() {
        let record = record?;
        // Header is line 1
        let row = record
            .position()
            .map_or(idx + 2, |pos| pos.line() as usize);

        let behavior_raw = record.get(behavior_idx).unwrap_or("");
        if behavior_raw.trim().is_empty() {
            warn!(file = %source.display(), row, "skipping row with blank behavior");
            continue;
        }

        let time_raw = record.get(time_idx).unwrap_or("").trim();
        let timestamp = if frame_indexed {
            FRAME_LOG_TIMESTAMP
        } else {
            parse_time(time_raw).ok_or_else(|| EthoError::TimeParse {
                file: source.to_path_buf(),
                row,
                value: time_raw.to_string(),
            })?
        };

        let mut event = BehaviorEvent::new(CanonicalLabel::new(behavior_raw), timestamp);
        if let Some(idx) = category_idx {
            event = event.with_category(CanonicalLabel::new(record.get(idx).unwrap_or("")));
        }
        events.push(event);
    }

    Ok(ObservationSequence::new(name, events))
}

fn column_index(headers: &StringRecord, column: &str, source: &Path) -> Result<usize, EthoError> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(column))
        .ok_or_else(|| EthoError::MissingColumn {
            file: source.to_path_buf(),
            column: column.to_string(),
        })
}

fn parse_time(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|t| t.is_finite())
}
