use crate::analysis::MetricAnalysis;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Sink for the assembled output record stream.
pub trait Reporter: Send + Sync {
    fn report(&self, records: &[MetricAnalysis]) -> Result<(), ReportError>;
}
