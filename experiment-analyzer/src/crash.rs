//! Crash/error aggregation from the secondary error-counts dataset.
//!
//! Error counts arrive pre-aggregated per (experiment, date, branch); this
//! module filters them to the experiment and date range and emits one
//! value-style record per branch with error types as buckets. The dataset
//! is optional end to end: no file, or no matching rows, degrades to zero
//! records rather than failing the run.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use experiment_analyzer_core::{Distribution, MetricAnalysis, ERROR_AGGREGATES_TYPE, SUBGROUP_ALL};

use crate::dataset::DatasetError;

/// One pre-aggregated error-count row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrashRow {
    pub experiment_id: String,
    pub submission_date: NaiveDate,
    pub experiment_branch: String,
    /// Error type -> count, e.g. `{"main_crashes": 3, "content_crashes": 7}`.
    #[serde(default)]
    pub errors: BTreeMap<String, u64>,
}

/// Metric name carried by crash records.
pub const ERRORS_METRIC: &str = "Error Aggregates";

/// Read crash rows from newline-delimited JSON.
pub fn read_crash_rows<R: Read>(reader: R) -> Result<Vec<CrashRow>, DatasetError> {
    use std::io::{BufRead, BufReader};
    let reader = BufReader::new(reader);
    let mut rows = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row: CrashRow =
            serde_json::from_str(&line).map_err(|source| DatasetError::MalformedRow {
                line: index + 1,
                source,
            })?;
        rows.push(row);
    }
    Ok(rows)
}

/// Read crash rows from an ndjson file.
pub fn read_crash_rows_from_path(path: &Path) -> Result<Vec<CrashRow>, DatasetError> {
    read_crash_rows(File::open(path)?)
}

/// Aggregate error counts into one record per branch.
///
/// Rows are kept when they match `experiment_id` and, if `since` is set,
/// their submission date is at or after it. Bucket keys are ordinals over
/// the sorted error-type names so record shape is deterministic; no
/// divergence or percentile statistics are computed for crash metrics.
pub fn aggregate_crashes(
    rows: &[CrashRow],
    experiment_id: &str,
    since: Option<NaiveDate>,
) -> Vec<MetricAnalysis> {
    let relevant: Vec<&CrashRow> = rows
        .iter()
        .filter(|row| row.experiment_id == experiment_id)
        .filter(|row| since.map_or(true, |date| row.submission_date >= date))
        .collect();

    // Error types observed anywhere fix the bucket-key scheme for every
    // branch.
    let error_types: Vec<&str> = {
        let mut types: Vec<&str> = relevant
            .iter()
            .flat_map(|row| row.errors.keys().map(String::as_str))
            .collect();
        types.sort_unstable();
        types.dedup();
        types
    };

    let mut per_branch: BTreeMap<String, Distribution> = BTreeMap::new();
    for row in &relevant {
        let dist = per_branch.entry(row.experiment_branch.clone()).or_default();
        for (ordinal, error_type) in error_types.iter().enumerate() {
            let count = row.errors.get(*error_type).copied().unwrap_or(0);
            dist.record(ordinal as i64, count, Some(error_type));
        }
    }

    per_branch
        .into_iter()
        .map(|(branch, dist)| MetricAnalysis {
            experiment_id: experiment_id.to_string(),
            experiment_branch: branch,
            subgroup: SUBGROUP_ALL.to_string(),
            n: dist.total(),
            metric_name: ERRORS_METRIC.to_string(),
            metric_type: ERROR_AGGREGATES_TYPE.to_string(),
            histogram: dist.points(),
            statistics: None,
        })
        .collect()
}
