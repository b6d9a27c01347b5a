//! experiment-analyzer: Per-branch metric statistics for experiment telemetry
//!
//! This library reads client telemetry rows, folds metric values into
//! per-branch histograms, and attaches comparative statistics with
//! permutation-based significance estimates.

pub mod analyzer;
pub mod builder;
pub mod cli;
pub mod config;
pub mod crash;
pub mod dataset;
pub mod output;
pub mod registry;
pub mod report;

// Re-export core types for convenience
pub use experiment_analyzer_core::{
    BranchWeights, Bucket, BucketSpec, Distribution, HistogramPoint, MetricAnalysis,
    MetricDefinition, MetricKind, PermutationGenerator, ReportError, Reporter,
    SignificanceSummary, Statistic, StatisticName, ERROR_AGGREGATES_TYPE, METADATA_TYPE,
    SUBGROUP_ALL, TOTAL_CLIENTS_METRIC,
};

// Re-export main types from this crate
pub use analyzer::{Analyzer, AnalyzerError};
pub use cli::Cli;
pub use config::Config;
pub use crash::{aggregate_crashes, read_crash_rows_from_path, CrashRow, ERRORS_METRIC};
pub use dataset::{read_rows_from_path, ClientRow, DatasetError, MetricValue};
pub use output::JsonLinesReporter;
pub use registry::MetricRegistry;
pub use report::TerminalReporter;
