//! Comparison and central-tendency statistics over bucketed distributions.
//!
//! The output ordering of `summarize` is a contract: divergence statistics
//! first (one per comparison branch, sorted by branch name), then Mean,
//! Median, 25th Percentile, 75th Percentile. Consumers rely on it for
//! deterministic comparison.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::distribution::Distribution;

mod chi_square;
mod quantiles;

pub use chi_square::chi_square_distance;
pub use quantiles::{mean, percentile};

/// The statistics the engine can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatisticName {
    #[serde(rename = "Chi-Square Distance")]
    ChiSquareDistance,
    Mean,
    Median,
    #[serde(rename = "25th Percentile")]
    Percentile25,
    #[serde(rename = "75th Percentile")]
    Percentile75,
}

impl fmt::Display for StatisticName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatisticName::ChiSquareDistance => "Chi-Square Distance",
            StatisticName::Mean => "Mean",
            StatisticName::Median => "Median",
            StatisticName::Percentile25 => "25th Percentile",
            StatisticName::Percentile75 => "75th Percentile",
        };
        f.write_str(name)
    }
}

/// One named statistic on a (branch, subgroup) distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistic {
    /// Set only for divergence statistics: the branch compared against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison_branch: Option<String>,
    pub name: StatisticName,
    pub value: f64,
    /// Extra numeric metadata, e.g. the permutation-test significance
    /// summary attached to divergence statistics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, f64>>,
}

impl Statistic {
    /// A central-tendency statistic (no comparison branch).
    pub fn central(name: StatisticName, value: f64) -> Self {
        Self {
            comparison_branch: None,
            name,
            value,
            metadata: None,
        }
    }

    /// A divergence statistic against `comparison_branch`.
    pub fn divergence(comparison_branch: &str, value: f64) -> Self {
        Self {
            comparison_branch: Some(comparison_branch.to_string()),
            name: StatisticName::ChiSquareDistance,
            value,
            metadata: None,
        }
    }
}

/// Compute the full statistics list for one distribution.
///
/// `comparisons` maps comparison-branch name to that branch's distribution
/// for the same metric and subgroup: for a non-control branch it holds just
/// the control branch; for the control branch it holds every other branch
/// (symmetric presentation). Pairs where either side is empty are omitted
/// rather than reported as a degenerate zero.
///
/// Returns `None` for an empty distribution: no statistics are defined when
/// the total is zero.
pub fn summarize(
    dist: &Distribution,
    comparisons: &BTreeMap<String, Distribution>,
) -> Option<Vec<Statistic>> {
    if dist.is_empty() {
        return None;
    }

    let mut statistics = Vec::new();

    // BTreeMap iteration gives the sorted-by-branch-name ordering.
    for (branch, other) in comparisons {
        if let Some(distance) = chi_square_distance(dist, other) {
            statistics.push(Statistic::divergence(branch, distance));
        }
    }

    statistics.push(Statistic::central(StatisticName::Mean, mean(dist)));
    statistics.push(Statistic::central(StatisticName::Median, percentile(dist, 0.5)));
    statistics.push(Statistic::central(
        StatisticName::Percentile25,
        percentile(dist, 0.25),
    ));
    statistics.push(Statistic::central(
        StatisticName::Percentile75,
        percentile(dist, 0.75),
    ));

    Some(statistics)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dist(pairs: &[(i64, u64)]) -> Distribution {
        let mut d = Distribution::new();
        for &(key, count) in pairs {
            d.record(key, count, None);
        }
        d
    }

    #[test]
    fn test_statistic_name_display() {
        assert_eq!(StatisticName::ChiSquareDistance.to_string(), "Chi-Square Distance");
        assert_eq!(StatisticName::Mean.to_string(), "Mean");
        assert_eq!(StatisticName::Median.to_string(), "Median");
        assert_eq!(StatisticName::Percentile25.to_string(), "25th Percentile");
        assert_eq!(StatisticName::Percentile75.to_string(), "75th Percentile");
    }

    #[test]
    fn test_uint_scalar_fixture() {
        // Control values {1, 5, 5} after null/invalid exclusion; compared
        // against a single-value branch {1}.
        let control = dist(&[(1, 1), (5, 2)]);
        let mut comparisons = BTreeMap::new();
        comparisons.insert("branch1".to_string(), dist(&[(1, 1)]));

        let stats = summarize(&control, &comparisons).unwrap();
        assert_eq!(stats.len(), 5);

        assert_eq!(stats[0].name, StatisticName::ChiSquareDistance);
        assert_eq!(stats[0].comparison_branch.as_deref(), Some("branch1"));
        assert!((stats[0].value - 0.5).abs() < 1e-9);

        assert_eq!(stats[1].name, StatisticName::Mean);
        assert!((stats[1].value - 11.0 / 3.0).abs() < 1e-4);

        assert_eq!(stats[2].name, StatisticName::Median);
        assert!((stats[2].value - 3.0).abs() < 1e-9);

        assert_eq!(stats[3].name, StatisticName::Percentile25);
        assert!((stats[3].value - 1.0).abs() < 1e-9);

        assert_eq!(stats[4].name, StatisticName::Percentile75);
        assert!((stats[4].value - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_ordering_contract_multiple_comparisons() {
        let control = dist(&[(1, 2), (2, 2)]);
        let mut comparisons = BTreeMap::new();
        comparisons.insert("branch2".to_string(), dist(&[(1, 1)]));
        comparisons.insert("branch1".to_string(), dist(&[(2, 1)]));

        let stats = summarize(&control, &comparisons).unwrap();
        // Divergences first, sorted by branch name, then the fixed central
        // order.
        assert_eq!(stats[0].comparison_branch.as_deref(), Some("branch1"));
        assert_eq!(stats[1].comparison_branch.as_deref(), Some("branch2"));
        let names: Vec<StatisticName> = stats[2..].iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![
                StatisticName::Mean,
                StatisticName::Median,
                StatisticName::Percentile25,
                StatisticName::Percentile75,
            ]
        );
    }

    #[test]
    fn test_empty_distribution_yields_no_statistics() {
        let empty = Distribution::new();
        assert!(summarize(&empty, &BTreeMap::new()).is_none());
    }

    #[test]
    fn test_empty_comparison_omitted_not_zero() {
        let control = dist(&[(1, 1)]);
        let mut comparisons = BTreeMap::new();
        comparisons.insert("branch1".to_string(), Distribution::new());

        let stats = summarize(&control, &comparisons).unwrap();
        // Only the four central-tendency statistics; the degenerate pair is
        // omitted entirely.
        assert_eq!(stats.len(), 4);
        assert!(stats.iter().all(|s| s.comparison_branch.is_none()));
    }

    #[test]
    fn test_percentiles_are_monotonic() {
        let d = dist(&[(2, 3), (7, 1), (11, 5), (13, 2)]);
        let stats = summarize(&d, &BTreeMap::new()).unwrap();
        let median = stats.iter().find(|s| s.name == StatisticName::Median).unwrap().value;
        let p25 = stats
            .iter()
            .find(|s| s.name == StatisticName::Percentile25)
            .unwrap()
            .value;
        let p75 = stats
            .iter()
            .find(|s| s.name == StatisticName::Percentile75)
            .unwrap()
            .value;
        assert!(p25 <= median && median <= p75);
    }

    #[test]
    fn test_statistic_serialization_skips_empty_fields() {
        let stat = Statistic::central(StatisticName::Mean, 1.5);
        let json = serde_json::to_string(&stat).unwrap();
        assert!(!json.contains("comparison_branch"));
        assert!(!json.contains("metadata"));
        assert!(json.contains("\"Mean\""));
    }
}
