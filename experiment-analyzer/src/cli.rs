//! Command-line interface for experiment-analyzer.

use crate::config::Config;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "experiment-analyzer")]
#[command(about = "Per-branch metric statistics and permutation-based significance for experiments")]
#[command(version)]
pub struct Cli {
    /// Path to the client-level dataset (ndjson)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Experiment id to analyze
    #[arg(short, long)]
    pub experiment: String,

    /// Path to the metric definition registry (TOML)
    #[arg(short, long)]
    pub registry: PathBuf,

    /// Path to the optional error-aggregates dataset (ndjson)
    #[arg(long)]
    pub crashes: Option<PathBuf>,

    /// Where to write the output records (ndjson); stdout table only if unset
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Name of the control branch
    #[arg(long)]
    pub control: Option<String>,

    /// Number of permutation slots per client (0 disables significance)
    #[arg(long)]
    pub permutations: Option<u32>,

    /// Analyze only the named metric(s) (repeatable, case-sensitive)
    #[arg(long)]
    pub metric: Vec<String>,

    /// Path to config file
    #[arg(long, default_value = ".experiment-analyzer.toml")]
    pub config: String,

    /// Disable colored terminal output
    #[arg(long)]
    pub no_color: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Apply CLI overrides to the configuration.
    ///
    /// CLI arguments take precedence over config file values.
    /// Only non-None optional values will override the config.
    pub fn apply_to_config(&self, config: &mut Config) {
        if let Some(control) = &self.control {
            config.analysis.control_branch = control.clone();
        }

        if let Some(permutations) = self.permutations {
            config.analysis.permutations = permutations;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Vec<&'static str> {
        vec![
            "experiment-analyzer",
            "--input",
            "clients.ndjson",
            "--experiment",
            "exp-1",
            "--registry",
            "metrics.toml",
        ]
    }

    #[test]
    fn test_cli_parse_minimal() {
        let cli = Cli::parse_from(base_args());

        assert_eq!(cli.input, PathBuf::from("clients.ndjson"));
        assert_eq!(cli.experiment, "exp-1");
        assert_eq!(cli.registry, PathBuf::from("metrics.toml"));
        assert!(cli.crashes.is_none());
        assert!(cli.output.is_none());
        assert!(cli.control.is_none());
        assert!(cli.permutations.is_none());
        assert!(cli.metric.is_empty());
        assert_eq!(cli.config, ".experiment-analyzer.toml");
        assert!(!cli.no_color);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_parse_full() {
        let mut args = base_args();
        args.extend([
            "--crashes",
            "errors.ndjson",
            "--output",
            "out.ndjson",
            "--control",
            "baseline",
            "--permutations",
            "500",
            "--metric",
            "gc_ms",
            "--metric",
            "tab_count",
            "--no-color",
            "--verbose",
        ]);
        let cli = Cli::parse_from(args);

        assert_eq!(cli.crashes, Some(PathBuf::from("errors.ndjson")));
        assert_eq!(cli.output, Some(PathBuf::from("out.ndjson")));
        assert_eq!(cli.control, Some("baseline".to_string()));
        assert_eq!(cli.permutations, Some(500));
        assert_eq!(cli.metric, vec!["gc_ms", "tab_count"]);
        assert!(cli.no_color);
        assert!(cli.verbose);
    }

    #[test]
    fn test_apply_to_config_with_overrides() {
        let mut args = base_args();
        args.extend(["--control", "baseline", "--permutations", "25"]);
        let cli = Cli::parse_from(args);

        let mut config = Config::default();
        cli.apply_to_config(&mut config);

        assert_eq!(config.analysis.control_branch, "baseline");
        assert_eq!(config.analysis.permutations, 25);
    }

    #[test]
    fn test_apply_to_config_without_overrides() {
        let cli = Cli::parse_from(base_args());

        let mut config = Config::default();
        let original_control = config.analysis.control_branch.clone();
        let original_permutations = config.analysis.permutations;

        cli.apply_to_config(&mut config);

        // Values should remain unchanged
        assert_eq!(config.analysis.control_branch, original_control);
        assert_eq!(config.analysis.permutations, original_permutations);
    }
}
