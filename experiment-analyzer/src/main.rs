use anyhow::{Context, Result};
use clap::Parser;
use experiment_analyzer::{
    config::DEFAULT_CONFIG_FILE, read_crash_rows_from_path, read_rows_from_path, Analyzer, Cli,
    Config, CrashRow, DatasetError, JsonLinesReporter, MetricRegistry, Reporter, TerminalReporter,
};
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config and apply CLI overrides
    let mut config = if cli.config == DEFAULT_CONFIG_FILE {
        Config::load_or_default()?
    } else {
        Config::load_from(Some(Path::new(&cli.config)))?
    };
    cli.apply_to_config(&mut config);

    if cli.verbose {
        eprintln!("Configuration: {:?}", config);
    }

    // 1. Load the metric registry
    eprintln!("Loading metric registry...");
    let mut registry = MetricRegistry::load(&cli.registry)
        .context("Failed to load metric registry")?;

    if !cli.metric.is_empty() {
        for name in &cli.metric {
            if registry.get(name).is_none() {
                eprintln!("Warning: metric {:?} is not in the registry", name);
            }
        }
        registry.retain(&cli.metric);
    }

    if cli.verbose {
        eprintln!("Registry: {} metric(s)", registry.len());
    }

    // 2. Read the client dataset
    eprintln!("Reading dataset...");
    let rows = read_rows_from_path(&cli.input)
        .with_context(|| format!("Failed to read dataset: {}", cli.input.display()))?;

    if cli.verbose {
        eprintln!("Dataset: {} row(s)", rows.len());
    }

    // 3. Read the error-aggregates dataset, if any. A missing file yields
    // an empty crash stream rather than an error.
    let crashes: Vec<CrashRow> = match &cli.crashes {
        Some(path) => match read_crash_rows_from_path(path) {
            Ok(rows) => rows,
            Err(DatasetError::Io(err)) => {
                eprintln!(
                    "Warning: skipping crash data, {} unreadable: {}",
                    path.display(),
                    err
                );
                Vec::new()
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to read crash data: {}", path.display()));
            }
        },
        None => Vec::new(),
    };

    // 4. Analyze
    eprintln!("Analyzing experiment {:?}...", cli.experiment);
    let analyzer = Analyzer::new(&cli.experiment, &config.analysis.control_branch)
        .with_permutations(config.analysis.permutations)
        .with_declared_branches(config.analysis.branches.clone());

    let records = analyzer
        .analyze(&rows, &registry, &crashes)
        .context("Analysis failed")?;

    // 5. Report results
    if let Some(path) = &cli.output {
        let mut reporter = JsonLinesReporter::new(path.clone());
        if config.output.pretty {
            reporter = reporter.pretty();
        }
        reporter
            .report(&records)
            .with_context(|| format!("Failed to write output: {}", path.display()))?;
        eprintln!("Wrote {} record(s) to {}", records.len(), path.display());
    }

    let terminal = if cli.no_color {
        TerminalReporter::without_colors()
    } else {
        TerminalReporter::new()
    };
    terminal.report(&records)?;

    Ok(())
}
