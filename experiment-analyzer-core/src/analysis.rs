//! Output records produced by the analyzer.
//!
//! One `MetricAnalysis` is emitted per (metric, branch, subgroup), plus one
//! metadata record per branch and one error-aggregate record per branch.
//! Records are immutable values; the caller serializes them (the analyzer
//! ships an ndjson writer, but no storage layout is fixed here).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::stats::Statistic;

/// Reserved subgroup label for top-level (unkeyed) rollups.
pub const SUBGROUP_ALL: &str = "All";

/// Metric-name / type tag used for the per-branch client-count records.
pub const TOTAL_CLIENTS_METRIC: &str = "Total Clients";

/// Type tag carried by branch-metadata records.
pub const METADATA_TYPE: &str = "Metadata";

/// Type tag carried by crash/error-aggregate records.
pub const ERROR_AGGREGATES_TYPE: &str = "ErrorAggregates";

/// One bucket of a distribution, as seen by consumers: the bucket's share of
/// the total, its raw count, and its label if the bucket scheme names one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramPoint {
    pub ratio: f64,
    pub count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// The analysis of one metric for one (branch, subgroup).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricAnalysis {
    pub experiment_id: String,
    pub experiment_branch: String,
    /// `"All"` for the top-level rollup, or the key for keyed metrics.
    pub subgroup: String,
    /// Number of clients (or pings) with a defined value for the metric.
    pub n: u64,
    pub metric_name: String,
    pub metric_type: String,
    /// Bucket key -> point. Empty for metadata records.
    pub histogram: BTreeMap<i64, HistogramPoint>,
    /// Comparison and central-tendency statistics, in the contract order.
    /// Absent for records that carry none (metadata, crash aggregates,
    /// empty distributions).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Vec<Statistic>>,
}

impl MetricAnalysis {
    /// A branch-metadata record carrying the branch's total client count.
    ///
    /// These records are the weight inputs for permutation assignment and
    /// lead the output stream.
    pub fn branch_metadata(experiment_id: &str, branch: &str, n: u64) -> Self {
        Self {
            experiment_id: experiment_id.to_string(),
            experiment_branch: branch.to_string(),
            subgroup: SUBGROUP_ALL.to_string(),
            n,
            metric_name: TOTAL_CLIENTS_METRIC.to_string(),
            metric_type: METADATA_TYPE.to_string(),
            histogram: BTreeMap::new(),
            statistics: None,
        }
    }
}
