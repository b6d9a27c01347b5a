//! Permutation-based significance for divergence statistics.
//!
//! Each permutation slot relabels every client under the null hypothesis of
//! no treatment effect; recomputing the divergence across all K permuted
//! labelings yields an empirical null distribution, from which the observed
//! divergence gets an empirical p-value. This avoids asymptotic chi-square
//! assumptions when bucket counts are small or skewed.

use std::collections::BTreeMap;

use statrs::statistics::{Data, Distribution as StatDistribution};

/// Summary of where an observed divergence sits in its empirical null.
#[derive(Debug, Clone, PartialEq)]
pub struct SignificanceSummary {
    /// Empirical p-value: `(1 + #{null >= observed}) / (K + 1)`.
    pub p_value: f64,
    /// Observed divergence standardized against the null's mean and
    /// standard deviation; 0.0 when the null has no spread.
    pub z_score: f64,
    /// Number of permuted scores behind the null.
    pub permutations: usize,
}

impl SignificanceSummary {
    /// Assess `observed` against the permuted `null` scores.
    ///
    /// Returns `None` for an empty null (significance is undefined without
    /// permuted scores).
    pub fn from_null(observed: f64, null: &[f64]) -> Option<Self> {
        if null.is_empty() {
            return None;
        }

        let at_least_as_extreme = null.iter().filter(|&&score| score >= observed).count();
        let p_value = (1 + at_least_as_extreme) as f64 / (null.len() + 1) as f64;

        let data = Data::new(null.to_vec());
        let z_score = match (data.mean(), data.std_dev()) {
            (Some(mean), Some(std_dev)) if std_dev > 0.0 => (observed - mean) / std_dev,
            _ => 0.0,
        };

        Some(Self {
            p_value,
            z_score,
            permutations: null.len(),
        })
    }

    /// The metadata map attached to a divergence `Statistic`.
    pub fn to_metadata(&self) -> BTreeMap<String, f64> {
        let mut metadata = BTreeMap::new();
        metadata.insert("p_value".to_string(), self.p_value);
        metadata.insert("z_score".to_string(), self.z_score);
        metadata.insert("permutations".to_string(), self.permutations as f64);
        metadata
    }
}
