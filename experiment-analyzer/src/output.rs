//! JSON-lines output for the assembled record stream.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use experiment_analyzer_core::{MetricAnalysis, ReportError, Reporter};

/// Writes one JSON object per output record to a file, in stream order.
#[derive(Debug, Clone)]
pub struct JsonLinesReporter {
    path: PathBuf,
    pretty: bool,
}

impl JsonLinesReporter {
    /// Create a reporter writing compact JSON lines to `path`.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            pretty: false,
        }
    }

    /// Pretty-print each record instead of compact lines.
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }
}

impl Reporter for JsonLinesReporter {
    fn report(&self, records: &[MetricAnalysis]) -> Result<(), ReportError> {
        let file = File::create(&self.path)?;
        let mut writer = BufWriter::new(file);
        for record in records {
            if self.pretty {
                serde_json::to_writer_pretty(&mut writer, record)?;
            } else {
                serde_json::to_writer(&mut writer, record)?;
            }
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }
}
