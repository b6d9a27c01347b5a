//! The metric definition registry.
//!
//! Loaded from a TOML file with one `[metrics.<name>]` table per metric.
//! Lookups are case-sensitive; an unknown metric kind fails at parse time,
//! signaling a configuration error rather than attempting a best-effort
//! aggregation.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use experiment_analyzer_core::MetricDefinition;

/// All registered metric definitions, iterated in name order so every run
/// processes metrics in the same sequence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricRegistry {
    #[serde(default)]
    metrics: BTreeMap<String, MetricDefinition>,
}

impl MetricRegistry {
    /// Load a registry from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, or if any definition
    /// carries an unknown kind or bucket scheme.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read metric registry: {}", path.display()))?;
        let registry: MetricRegistry = toml::from_str(&content)
            .with_context(|| format!("Failed to parse metric registry: {}", path.display()))?;
        Ok(registry)
    }

    /// Look up one metric's definition by name (case-sensitive).
    pub fn get(&self, name: &str) -> Option<&MetricDefinition> {
        self.metrics.get(name)
    }

    /// Iterate (name, definition) pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricDefinition)> {
        self.metrics.iter().map(|(name, def)| (name.as_str(), def))
    }

    /// Number of registered metrics.
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// Whether the registry holds no definitions.
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Restrict the registry to the named metrics.
    ///
    /// Names not present in the registry are silently dropped; the caller
    /// reports unknown filters.
    pub fn retain(&mut self, names: &[String]) {
        self.metrics.retain(|name, _| names.iter().any(|n| n == name));
    }

    #[cfg(test)]
    pub fn insert(&mut self, name: &str, def: MetricDefinition) {
        self.metrics.insert(name.to_string(), def);
    }
}
