//! Bucketed count distributions.
//!
//! A `Distribution` is the aggregate of one metric's values across all
//! clients in one (experiment, branch, subgroup): a count per bucket key,
//! with an optional human label per bucket. All statistics are derived from
//! the bucket-ratio view.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analysis::HistogramPoint;

/// One bucket of a distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    /// Number of clients (or pings) counted in this bucket.
    pub count: u64,
    /// Human label, e.g. an enumerated value or "True"/"False".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// A bucketed count distribution for one (branch, subgroup).
///
/// Bucket keys are unique (map invariant) and counts are non-negative by
/// construction. `total()` is the distribution's `n`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    buckets: BTreeMap<i64, Bucket>,
}

impl Distribution {
    /// An empty distribution.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` observations to `key`'s bucket, creating it if absent.
    ///
    /// A label given for an existing unlabeled bucket is retained; labels
    /// never conflict because the bucket-key scheme fixes them per metric.
    pub fn record(&mut self, key: i64, count: u64, label: Option<&str>) {
        let bucket = self.buckets.entry(key).or_insert(Bucket {
            count: 0,
            label: None,
        });
        bucket.count += count;
        if bucket.label.is_none() {
            bucket.label = label.map(str::to_string);
        }
    }

    /// Ensure `key` exists, with zero count if previously absent.
    pub fn ensure_bucket(&mut self, key: i64, label: Option<&str>) {
        self.record(key, 0, label);
    }

    /// Bucket-wise sum with another distribution.
    ///
    /// Used to roll keyed sub-distributions up into the top-level subgroup.
    pub fn merge(&mut self, other: &Distribution) {
        for (key, bucket) in &other.buckets {
            self.record(*key, bucket.count, bucket.label.as_deref());
        }
    }

    /// Total observation count (`n`).
    pub fn total(&self) -> u64 {
        self.buckets.values().map(|b| b.count).sum()
    }

    /// Whether the distribution holds no observations.
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Iterate buckets in ascending key order.
    pub fn buckets(&self) -> impl Iterator<Item = (i64, &Bucket)> {
        self.buckets.iter().map(|(k, b)| (*k, b))
    }

    /// Ascending bucket keys.
    pub fn keys(&self) -> impl Iterator<Item = i64> + '_ {
        self.buckets.keys().copied()
    }

    /// The ratio of observations in `key`'s bucket, 0.0 if absent or empty.
    pub fn ratio(&self, key: i64) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.buckets
            .get(&key)
            .map(|b| b.count as f64 / total as f64)
            .unwrap_or(0.0)
    }

    /// The derived per-bucket view: ratio, count, and label per key.
    ///
    /// Ratios sum to 1.0 (within floating-point tolerance) whenever the
    /// total is positive; an empty distribution yields an empty map.
    pub fn points(&self) -> BTreeMap<i64, HistogramPoint> {
        let total = self.total();
        if total == 0 {
            return BTreeMap::new();
        }
        self.buckets
            .iter()
            .map(|(key, bucket)| {
                (
                    *key,
                    HistogramPoint {
                        ratio: bucket.count as f64 / total as f64,
                        count: bucket.count,
                        label: bucket.label.clone(),
                    },
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Distribution {
        // The uint-scalar fixture: n=3, bucket 1 -> 1, bucket 5 -> 2.
        let mut dist = Distribution::new();
        dist.record(1, 1, None);
        dist.record(5, 2, None);
        dist
    }

    #[test]
    fn test_total_and_ratio() {
        let dist = fixture();
        assert_eq!(dist.total(), 3);
        assert!((dist.ratio(1) - 1.0 / 3.0).abs() < 1e-12);
        assert!((dist.ratio(5) - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(dist.ratio(7), 0.0);
    }

    #[test]
    fn test_ratios_sum_to_one() {
        let dist = fixture();
        let sum: f64 = dist.points().values().map(|p| p.ratio).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_distribution_has_no_points() {
        let dist = Distribution::new();
        assert!(dist.is_empty());
        assert!(dist.points().is_empty());
        assert_eq!(dist.ratio(0), 0.0);
    }

    #[test]
    fn test_zero_filled_buckets_do_not_affect_ratios() {
        let mut dist = fixture();
        dist.ensure_bucket(10, None);
        assert_eq!(dist.total(), 3);
        let points = dist.points();
        assert_eq!(points.len(), 3);
        assert_eq!(points[&10].count, 0);
        assert_eq!(points[&10].ratio, 0.0);
        let sum: f64 = points.values().map(|p| p.ratio).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_merge_sums_counts() {
        let mut all = fixture();
        let mut keyed = Distribution::new();
        keyed.record(5, 3, None);
        keyed.record(9, 1, None);
        all.merge(&keyed);

        assert_eq!(all.total(), 7);
        assert_eq!(all.buckets().find(|(k, _)| *k == 5).unwrap().1.count, 5);
        assert_eq!(all.buckets().find(|(k, _)| *k == 9).unwrap().1.count, 1);
    }

    #[test]
    fn test_labels_retained_on_merge() {
        let mut a = Distribution::new();
        a.record(0, 1, Some("False"));
        let mut b = Distribution::new();
        b.record(0, 2, Some("False"));
        b.record(1, 1, Some("True"));
        a.merge(&b);

        let points = a.points();
        assert_eq!(points[&0].label.as_deref(), Some("False"));
        assert_eq!(points[&1].label.as_deref(), Some("True"));
        assert_eq!(points[&0].count, 3);
    }

    #[test]
    fn test_keys_ascending() {
        let mut dist = Distribution::new();
        dist.record(7, 1, None);
        dist.record(-2, 1, None);
        dist.record(3, 1, None);
        let keys: Vec<i64> = dist.keys().collect();
        assert_eq!(keys, vec![-2, 3, 7]);
    }
}
