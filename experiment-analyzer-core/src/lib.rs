//! Core types and statistics for experiment-analyzer.
//!
//! This crate provides the metric/distribution model, the comparison
//! statistics, and the deterministic permutation generator shared by the
//! experiment-analyzer pipeline and anything that consumes its output
//! records.

pub mod analysis;
pub mod distribution;
pub mod metric;
pub mod permutation;
pub mod report;
pub mod significance;
pub mod stats;

// Re-export main types for convenience
pub use analysis::{
    HistogramPoint, MetricAnalysis, ERROR_AGGREGATES_TYPE, METADATA_TYPE, SUBGROUP_ALL,
    TOTAL_CLIENTS_METRIC,
};
pub use distribution::{Bucket, Distribution};
pub use metric::{BucketSpec, MetricDefinition, MetricKind};
pub use permutation::{BranchWeights, PermutationGenerator, WeightError};
pub use report::{ReportError, Reporter};
pub use significance::SignificanceSummary;
pub use stats::{chi_square_distance, mean, percentile, summarize, Statistic, StatisticName};
