//! Metric definitions: what kind of values a metric carries and how they
//! bucket.
//!
//! Definitions are supplied by a registry file; the analyzer only ever sees
//! an already-resolved `MetricDefinition`.

use serde::{Deserialize, Serialize};

/// Bucketing metadata for histogram metrics.
///
/// Linear and exponential schemes describe the bucket boundaries the client
/// used when pre-bucketing; enumerated schemes name one bucket per label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum BucketSpec {
    /// Evenly spaced buckets from `low` to `high`, preceded by a zero bucket.
    Linear { low: i64, high: i64, count: usize },
    /// Log-spaced buckets from `low` to `high`, preceded by a zero bucket.
    Exponential { low: i64, high: i64, count: usize },
    /// One bucket per label, keyed by ordinal in label order.
    Enumerated { labels: Vec<String> },
}

impl BucketSpec {
    /// The bucket keys this spec defines, ascending.
    ///
    /// Distributions for a histogram metric are zero-filled over these keys
    /// so that every defined bucket appears even when no client recorded a
    /// value in it.
    pub fn keys(&self) -> Vec<i64> {
        match self {
            BucketSpec::Linear { low, high, count } => linear_keys(*low, *high, *count),
            BucketSpec::Exponential { low, high, count } => exponential_keys(*low, *high, *count),
            BucketSpec::Enumerated { labels } => (0..labels.len() as i64).collect(),
        }
    }

    /// The human label for a bucket key, if this spec names one.
    pub fn label(&self, key: i64) -> Option<&str> {
        match self {
            BucketSpec::Enumerated { labels } => {
                usize::try_from(key).ok().and_then(|i| labels.get(i)).map(String::as_str)
            }
            _ => None,
        }
    }
}

/// Evenly spaced bucket keys, anchored with a zero bucket.
fn linear_keys(low: i64, high: i64, count: usize) -> Vec<i64> {
    if count < 2 || high <= low {
        return vec![0, low.max(1)];
    }
    let mut keys = Vec::with_capacity(count);
    keys.push(0);
    let low = low.max(1);
    // count - 1 buckets span [low, high] inclusive.
    let spans = (count - 2).max(1) as f64;
    for i in 0..count - 1 {
        let key = (low as f64 + (high - low) as f64 * i as f64 / spans).round() as i64;
        push_ascending(&mut keys, key);
    }
    keys
}

/// Log-spaced bucket keys, anchored with a zero bucket.
///
/// Each step splits the remaining log-range evenly across the remaining
/// buckets, rounding to integers and forcing strict ascent, so narrow ranges
/// degrade gracefully into consecutive integers.
fn exponential_keys(low: i64, high: i64, count: usize) -> Vec<i64> {
    if count < 2 || high <= low {
        return vec![0, low.max(1)];
    }
    let mut keys = Vec::with_capacity(count);
    keys.push(0);
    let mut current = low.max(1);
    keys.push(current);
    let log_max = (high as f64).ln();
    for i in 2..count {
        let log_cur = (current as f64).ln();
        let log_ratio = (log_max - log_cur) / (count - i) as f64;
        let next = (log_cur + log_ratio).exp().round() as i64;
        current = if next > current { next } else { current + 1 };
        keys.push(current);
    }
    keys
}

fn push_ascending(keys: &mut Vec<i64>, key: i64) {
    let next = match keys.last() {
        Some(&last) if key <= last => last + 1,
        _ => key,
    };
    keys.push(next);
}

/// The kind of values a metric carries.
///
/// A single dispatch point in the distribution builder maps each kind's raw
/// value to a bucket key and optional label; scalars become synthetic
/// single-occupancy buckets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricKind {
    /// Pre-bucketed counts per client, summed per bucket.
    Histogram { buckets: BucketSpec },
    /// Non-negative integer value; bucket key is the value itself.
    UintScalar,
    /// Boolean value; bucket 0 = "False", bucket 1 = "True".
    BooleanScalar,
    /// Enumerated string value; bucket key is a stable ordinal over the
    /// lexicographically sorted distinct values, label is the string.
    StringScalar,
}

impl MetricKind {
    /// Short tag recorded on output records.
    pub fn type_tag(&self) -> &'static str {
        match self {
            MetricKind::Histogram { .. } => "Histogram",
            MetricKind::UintScalar => "UintScalar",
            MetricKind::BooleanScalar => "BooleanScalar",
            MetricKind::StringScalar => "StringScalar",
        }
    }
}

/// A fully resolved metric definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinition {
    /// Value kind plus bucketing metadata.
    #[serde(flatten)]
    pub kind: MetricKind,
    /// Whether values are sub-keyed by a string key (e.g. per-process).
    #[serde(default)]
    pub keyed: bool,
}

impl MetricDefinition {
    /// An unkeyed definition of the given kind.
    pub fn unkeyed(kind: MetricKind) -> Self {
        Self { kind, keyed: false }
    }

    /// A keyed definition of the given kind.
    pub fn keyed(kind: MetricKind) -> Self {
        Self { kind, keyed: true }
    }
}
