//! Configuration loading for experiment-analyzer.
//!
//! Supports loading configuration from TOML files, with sensible defaults
//! for all settings.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration for experiment-analyzer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Settings for the per-experiment analysis.
    pub analysis: AnalysisConfig,
    /// Settings for output records.
    pub output: OutputConfig,
}

/// Configuration for the per-experiment analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Name of the control branch every other branch is compared against.
    pub control_branch: String,
    /// Number of permutation slots per client (0 disables significance).
    pub permutations: u32,
    /// Branches the experiment is expected to have. When non-empty, a
    /// listed branch with no observed clients fails the run.
    pub branches: Vec<String>,
}

/// Configuration for output records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Pretty-print each output record instead of compact JSON lines.
    pub pretty: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            control_branch: "control".to_string(),
            permutations: 100,
            branches: Vec::new(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { pretty: false }
    }
}

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = ".experiment-analyzer.toml";

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load configuration from the default file (`.experiment-analyzer.toml`)
    /// or use defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be
    /// parsed.
    pub fn load_or_default() -> Result<Config> {
        let path = Path::new(DEFAULT_CONFIG_FILE);

        if path.exists() {
            Self::load(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load configuration from the specified path, or try default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if the specified file cannot be read or parsed.
    pub fn load_from(path: Option<&Path>) -> Result<Config> {
        match path {
            Some(p) => Self::load(p),
            None => Self::load_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.analysis.control_branch, "control");
        assert_eq!(config.analysis.permutations, 100);
        assert!(config.analysis.branches.is_empty());
        assert!(!config.output.pretty);
    }

    #[test]
    fn test_load_partial_config() {
        let toml_content = r#"
[analysis]
permutations = 500
"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();

        // Overridden value
        assert_eq!(config.analysis.permutations, 500);

        // Default values
        assert_eq!(config.analysis.control_branch, "control");
        assert!(!config.output.pretty);
    }

    #[test]
    fn test_load_full_config() {
        let toml_content = r#"
[analysis]
control_branch = "baseline"
permutations = 200
branches = ["baseline", "variant-a", "variant-b"]

[output]
pretty = true
"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.analysis.control_branch, "baseline");
        assert_eq!(config.analysis.permutations, 200);
        assert_eq!(
            config.analysis.branches,
            vec!["baseline", "variant-a", "variant-b"]
        );
        assert!(config.output.pretty);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"this is not valid toml {{{{").unwrap();

        let result = Config::load(file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(
            config.analysis.control_branch,
            parsed.analysis.control_branch
        );
        assert_eq!(config.analysis.permutations, parsed.analysis.permutations);
        assert_eq!(config.output.pretty, parsed.output.pretty);
    }
}
