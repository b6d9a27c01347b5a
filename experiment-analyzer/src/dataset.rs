//! The client-level input dataset.
//!
//! The analyzer treats the distributed tabular runtime of the original
//! system as an external collaborator; what it actually requires is a set
//! of rows with `client_id`, `experiment_id`, `experiment_branch`, and one
//! value per registered metric. This module supplies that contract from
//! newline-delimited JSON, plus the grouping primitives the pipeline folds
//! over.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reading the input dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Failed to read dataset: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed row on line {line}: {source}")]
    MalformedRow {
        line: usize,
        source: serde_json::Error,
    },
}

/// A raw metric value as it appears on a client row.
///
/// Externally tagged: `{"uint": 5}`, `{"bool": true}`, `{"string": "beta"}`,
/// `{"histogram": {"1": 2}}`, `{"keyed": {"parent": {"uint": 3}}}`.
///
/// Uint values deserialize from `i64`: raw telemetry occasionally carries
/// negative garbage in uint columns, and such values are treated as
/// undefined by the distribution builder rather than failing the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricValue {
    Uint(i64),
    Bool(bool),
    String(String),
    Histogram(BTreeMap<i64, u64>),
    Keyed(HashMap<String, MetricValue>),
}

/// One client's row for one experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRow {
    pub client_id: String,
    pub experiment_id: String,
    pub experiment_branch: String,
    /// Submission date of the row, when present; the minimum across rows
    /// anchors the crash aggregator's date filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_date: Option<NaiveDate>,
    /// Metric name -> raw value. Absent metrics are simply missing keys.
    #[serde(default)]
    pub metrics: HashMap<String, MetricValue>,
}

impl ClientRow {
    /// The raw value for `metric`, if the row defines one.
    pub fn metric(&self, metric: &str) -> Option<&MetricValue> {
        self.metrics.get(metric)
    }
}

/// Read client rows from newline-delimited JSON.
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<ClientRow>, DatasetError> {
    let reader = BufReader::new(reader);
    let mut rows = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row: ClientRow =
            serde_json::from_str(&line).map_err(|source| DatasetError::MalformedRow {
                line: index + 1,
                source,
            })?;
        rows.push(row);
    }
    Ok(rows)
}

/// Read client rows from an ndjson file.
pub fn read_rows_from_path(path: &Path) -> Result<Vec<ClientRow>, DatasetError> {
    read_rows(File::open(path)?)
}

/// Keep only the rows belonging to `experiment_id`.
pub fn filter_experiment<'a>(rows: &'a [ClientRow], experiment_id: &str) -> Vec<&'a ClientRow> {
    rows.iter()
        .filter(|row| row.experiment_id == experiment_id)
        .collect()
}

/// Distinct clients per branch.
///
/// This is the blocking aggregation that must be fully materialized before
/// permutation weighting: branch weights are a global property of the
/// population, not of any row subset.
pub fn branch_counts(rows: &[&ClientRow]) -> BTreeMap<String, u64> {
    let mut seen: BTreeMap<String, HashSet<&str>> = BTreeMap::new();
    for row in rows {
        seen.entry(row.experiment_branch.clone())
            .or_default()
            .insert(row.client_id.as_str());
    }
    seen.into_iter()
        .map(|(branch, clients)| (branch, clients.len() as u64))
        .collect()
}

/// The earliest submission date observed across the rows, if any row
/// carries one.
pub fn earliest_submission_date(rows: &[&ClientRow]) -> Option<NaiveDate> {
    rows.iter().filter_map(|row| row.submission_date).min()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(client: &str, branch: &str, date: Option<&str>) -> ClientRow {
        ClientRow {
            client_id: client.to_string(),
            experiment_id: "exp-1".to_string(),
            experiment_branch: branch.to_string(),
            submission_date: date.map(|d| d.parse().unwrap()),
            metrics: HashMap::new(),
        }
    }

    #[test]
    fn test_read_rows_ndjson() {
        let input = concat!(
            r#"{"client_id":"c1","experiment_id":"exp-1","experiment_branch":"control","metrics":{"tabs":{"uint":5}}}"#,
            "\n\n",
            r#"{"client_id":"c2","experiment_id":"exp-1","experiment_branch":"branch1","submission_date":"2024-03-01","metrics":{"e10s":{"bool":true},"gc_ms":{"histogram":{"1":2,"4":1}}}}"#,
            "\n",
        );
        let rows = read_rows(input.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].metric("tabs"), Some(&MetricValue::Uint(5)));
        assert_eq!(rows[1].metric("e10s"), Some(&MetricValue::Bool(true)));
        assert_eq!(
            rows[1].submission_date,
            Some("2024-03-01".parse().unwrap())
        );
        match rows[1].metric("gc_ms") {
            Some(MetricValue::Histogram(buckets)) => {
                assert_eq!(buckets.get(&1), Some(&2));
                assert_eq!(buckets.get(&4), Some(&1));
            }
            other => panic!("unexpected value: {:?}", other),
        }
    }

    #[test]
    fn test_read_rows_keyed_value() {
        let input = r#"{"client_id":"c1","experiment_id":"exp-1","experiment_branch":"control","metrics":{"per_process":{"keyed":{"parent":{"uint":3},"content":{"uint":7}}}}}"#;
        let rows = read_rows(input.as_bytes()).unwrap();
        match rows[0].metric("per_process") {
            Some(MetricValue::Keyed(keys)) => {
                assert_eq!(keys.get("parent"), Some(&MetricValue::Uint(3)));
                assert_eq!(keys.get("content"), Some(&MetricValue::Uint(7)));
            }
            other => panic!("unexpected value: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_row_reports_line_number() {
        let input = "{\"client_id\":\"c1\",\"experiment_id\":\"e\",\"experiment_branch\":\"b\"}\nnot json\n";
        let err = read_rows(input.as_bytes()).unwrap_err();
        match err {
            DatasetError::MalformedRow { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_negative_uint_tolerated_on_input() {
        let input = r#"{"client_id":"c1","experiment_id":"exp-1","experiment_branch":"control","metrics":{"tabs":{"uint":-1}}}"#;
        let rows = read_rows(input.as_bytes()).unwrap();
        assert_eq!(rows[0].metric("tabs"), Some(&MetricValue::Uint(-1)));
    }

    #[test]
    fn test_filter_experiment() {
        let mut rows = vec![row("c1", "control", None), row("c2", "branch1", None)];
        rows.push(ClientRow {
            experiment_id: "other".to_string(),
            ..row("c3", "control", None)
        });
        let filtered = filter_experiment(&rows, "exp-1");
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn test_branch_counts_distinct_clients() {
        let rows = vec![
            row("c1", "control", None),
            row("c1", "control", None), // duplicate ping from one client
            row("c2", "control", None),
            row("c3", "branch1", None),
        ];
        let refs: Vec<&ClientRow> = rows.iter().collect();
        let counts = branch_counts(&refs);
        assert_eq!(counts["control"], 2);
        assert_eq!(counts["branch1"], 1);
    }

    #[test]
    fn test_earliest_submission_date() {
        let rows = vec![
            row("c1", "control", Some("2024-03-05")),
            row("c2", "control", None),
            row("c3", "branch1", Some("2024-03-01")),
        ];
        let refs: Vec<&ClientRow> = rows.iter().collect();
        assert_eq!(
            earliest_submission_date(&refs),
            Some("2024-03-01".parse().unwrap())
        );

        let undated = vec![row("c1", "control", None)];
        let refs: Vec<&ClientRow> = undated.iter().collect();
        assert_eq!(earliest_submission_date(&refs), None);
    }
}
