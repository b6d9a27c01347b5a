use std::io::{self, Write};

use colored::Colorize;

use experiment_analyzer_core::{
    MetricAnalysis, ReportError, Reporter, Statistic, StatisticName, METADATA_TYPE,
};

/// Significance threshold for the verdict column.
const ALPHA: f64 = 0.05;

/// A reporter that renders the analysis as a terminal table.
///
/// One row per metric record that carries a divergence statistic; metadata
/// records feed the header and everything else is summarized.
#[derive(Debug, Clone)]
pub struct TerminalReporter {
    /// Whether to use colors in output (defaults to true).
    use_colors: bool,
}

impl Default for TerminalReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Verdict for one divergence row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Diverged,
    Inconclusive,
    Untested,
}

impl TerminalReporter {
    /// Create a new terminal reporter with default settings.
    pub fn new() -> Self {
        Self { use_colors: true }
    }

    /// Create a terminal reporter with color output disabled.
    pub fn without_colors() -> Self {
        Self { use_colors: false }
    }

    /// The first divergence statistic on a record, if any.
    fn divergence(record: &MetricAnalysis) -> Option<&Statistic> {
        record
            .statistics
            .as_ref()?
            .iter()
            .find(|s| s.name == StatisticName::ChiSquareDistance)
    }

    fn verdict(statistic: &Statistic) -> Verdict {
        match statistic
            .metadata
            .as_ref()
            .and_then(|m| m.get("p_value"))
        {
            Some(&p) if p < ALPHA => Verdict::Diverged,
            Some(_) => Verdict::Inconclusive,
            None => Verdict::Untested,
        }
    }

    fn format_verdict(&self, verdict: Verdict) -> String {
        let (text, colorize): (&str, fn(&str) -> String) = match verdict {
            Verdict::Diverged => ("diverged", |t| t.red().bold().to_string()),
            Verdict::Inconclusive => ("inconclusive", |t| t.yellow().to_string()),
            Verdict::Untested => ("untested", |t| t.to_string()),
        };
        if self.use_colors {
            colorize(text)
        } else {
            text.to_string()
        }
    }

    fn verdict_visible_len(verdict: Verdict) -> usize {
        match verdict {
            Verdict::Diverged => 8,
            Verdict::Inconclusive => 12,
            Verdict::Untested => 8,
        }
    }

    fn format_p_value(statistic: &Statistic) -> String {
        match statistic.metadata.as_ref().and_then(|m| m.get("p_value")) {
            Some(p) => format!("{:.4}", p),
            None => "-".to_string(),
        }
    }

    /// Print the per-branch client counts from the metadata records.
    fn print_branches(
        &self,
        writer: &mut impl Write,
        records: &[MetricAnalysis],
    ) -> io::Result<()> {
        writeln!(writer)?;
        for record in records.iter().filter(|r| r.metric_type == METADATA_TYPE) {
            writeln!(
                writer,
                "{}: {} clients",
                record.experiment_branch, record.n
            )?;
        }
        Ok(())
    }

    /// Print the table header.
    fn print_header(&self, writer: &mut impl Write) -> io::Result<()> {
        writeln!(writer)?;
        let header = format!(
            "{:<28} {:<16} {:<12} {:>8} {:>12} {:>10} {:>14}",
            "Metric", "Branch", "Subgroup", "n", "Distance", "p-value", "Result"
        );
        if self.use_colors {
            writeln!(writer, "{}", header.bold())?;
        } else {
            writeln!(writer, "{}", header)?;
        }
        writeln!(writer, "{}", "-".repeat(106))?;
        Ok(())
    }

    /// Print a single divergence row.
    fn print_row(
        &self,
        writer: &mut impl Write,
        record: &MetricAnalysis,
        statistic: &Statistic,
    ) -> io::Result<()> {
        let name = truncate_name(&record.metric_name, 26);

        let verdict = Self::verdict(statistic);
        let result = self.format_verdict(verdict);
        let result_padding = 14_usize.saturating_sub(Self::verdict_visible_len(verdict));

        writeln!(
            writer,
            "{:<28} {:<16} {:<12} {:>8} {:>12.4} {:>10} {:>width$}{}",
            name,
            record.experiment_branch,
            record.subgroup,
            record.n,
            statistic.value,
            Self::format_p_value(statistic),
            "",
            result,
            width = result_padding,
        )?;
        Ok(())
    }

    /// Print the summary footer.
    fn print_summary(
        &self,
        writer: &mut impl Write,
        verdicts: &[Verdict],
    ) -> io::Result<()> {
        let diverged = verdicts.iter().filter(|v| **v == Verdict::Diverged).count();
        let inconclusive = verdicts
            .iter()
            .filter(|v| **v == Verdict::Inconclusive)
            .count();
        let untested = verdicts.iter().filter(|v| **v == Verdict::Untested).count();

        writeln!(writer, "{}", "-".repeat(106))?;

        let summary_label = "Summary:";
        if self.use_colors {
            write!(writer, "{} ", summary_label.bold())?;
        } else {
            write!(writer, "{} ", summary_label)?;
        }

        let diverged_text = format!("{} diverged", diverged);
        let inconclusive_text = format!("{} inconclusive", inconclusive);
        let untested_text = format!("{} untested", untested);

        if self.use_colors {
            writeln!(
                writer,
                "{}, {}, {}",
                diverged_text.red(),
                inconclusive_text.yellow(),
                untested_text
            )?;
        } else {
            writeln!(
                writer,
                "{}, {}, {}",
                diverged_text, inconclusive_text, untested_text
            )?;
        }

        writeln!(writer)?;
        Ok(())
    }

    fn render(&self, writer: &mut impl Write, records: &[MetricAnalysis]) -> io::Result<()> {
        self.print_branches(writer, records)?;
        self.print_header(writer)?;

        let mut verdicts = Vec::new();
        for record in records {
            if let Some(statistic) = Self::divergence(record) {
                self.print_row(writer, record, statistic)?;
                verdicts.push(Self::verdict(statistic));
            }
        }

        self.print_summary(writer, &verdicts)
    }
}

/// Shorten a metric name to at most `max` characters, counting by chars so
/// multi-byte names never split mid-character.
fn truncate_name(name: &str, max: usize) -> String {
    if name.chars().count() > max {
        let head: String = name.chars().take(max - 3).collect();
        format!("{}...", head)
    } else {
        name.to_string()
    }
}

impl Reporter for TerminalReporter {
    fn report(&self, records: &[MetricAnalysis]) -> Result<(), ReportError> {
        let stdout = io::stdout();
        let mut writer = stdout.lock();
        self.render(&mut writer, records)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn divergence_record(
        metric: &str,
        branch: &str,
        distance: f64,
        p_value: Option<f64>,
    ) -> MetricAnalysis {
        let mut statistic = Statistic::divergence("control", distance);
        if let Some(p) = p_value {
            let mut metadata = BTreeMap::new();
            metadata.insert("p_value".to_string(), p);
            statistic.metadata = Some(metadata);
        }
        MetricAnalysis {
            experiment_id: "exp-1".to_string(),
            experiment_branch: branch.to_string(),
            subgroup: "All".to_string(),
            n: 100,
            metric_name: metric.to_string(),
            metric_type: "UintScalar".to_string(),
            histogram: BTreeMap::new(),
            statistics: Some(vec![statistic]),
        }
    }

    #[test]
    fn test_verdicts() {
        let diverged = divergence_record("m", "b", 0.4, Some(0.001));
        let inconclusive = divergence_record("m", "b", 0.1, Some(0.4));
        let untested = divergence_record("m", "b", 0.1, None);

        let stat = TerminalReporter::divergence(&diverged).unwrap();
        assert_eq!(TerminalReporter::verdict(stat), Verdict::Diverged);
        let stat = TerminalReporter::divergence(&inconclusive).unwrap();
        assert_eq!(TerminalReporter::verdict(stat), Verdict::Inconclusive);
        let stat = TerminalReporter::divergence(&untested).unwrap();
        assert_eq!(TerminalReporter::verdict(stat), Verdict::Untested);
    }

    #[test]
    fn test_report_to_buffer() {
        let reporter = TerminalReporter::without_colors();
        let records = vec![
            MetricAnalysis::branch_metadata("exp-1", "control", 50),
            MetricAnalysis::branch_metadata("exp-1", "branch1", 50),
            divergence_record("gc_ms", "branch1", 0.42, Some(0.0099)),
            divergence_record("tab_count", "branch1", 0.02, Some(0.61)),
            divergence_record("channel", "branch1", 0.10, None),
        ];

        let mut buffer = Vec::new();
        reporter.render(&mut buffer, &records).unwrap();

        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("control: 50 clients"));
        assert!(output.contains("Metric"));
        assert!(output.contains("gc_ms"));
        assert!(output.contains("0.0099"));
        assert!(output.contains("diverged"));
        assert!(output.contains("Summary:"));
        assert!(output.contains("1 diverged"));
        assert!(output.contains("1 inconclusive"));
        assert!(output.contains("1 untested"));
    }

    #[test]
    fn test_long_multibyte_metric_name_renders() {
        // Truncation must land on a char boundary, not a byte index.
        let name = format!("{}ééééé", "a".repeat(22));
        let reporter = TerminalReporter::without_colors();
        let records = vec![divergence_record(&name, "branch1", 0.2, Some(0.3))];

        let mut buffer = Vec::new();
        reporter.render(&mut buffer, &records).unwrap();

        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("aé..."));
    }

    #[test]
    fn test_truncate_name_counts_chars() {
        assert_eq!(truncate_name("short", 26), "short");
        let exact: String = "é".repeat(26);
        assert_eq!(truncate_name(&exact, 26), exact);
        let long: String = "é".repeat(30);
        assert_eq!(truncate_name(&long, 26), format!("{}...", "é".repeat(23)));
    }

    #[test]
    fn test_default_matches_new() {
        assert!(TerminalReporter::default().use_colors);
    }

    #[test]
    fn test_records_without_divergence_are_skipped() {
        let reporter = TerminalReporter::without_colors();
        let records = vec![MetricAnalysis::branch_metadata("exp-1", "control", 5)];

        let mut buffer = Vec::new();
        reporter.render(&mut buffer, &records).unwrap();

        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("0 diverged"));
    }
}
