//! Mean and step-quantile statistics over bucket keys.
//!
//! Bucket keys are treated as the numeric value of the bucket. For boolean
//! metrics the mean is therefore the true-fraction; for string metrics the
//! keys are first-seen-stable ordinals, so these are ordinal statistics over
//! the canonical label order (intentional, not semantic averages).

use crate::distribution::Distribution;

/// Ratio-weighted expectation over the bucket keys.
///
/// Returns 0.0 for an empty distribution; callers gate on emptiness before
/// emitting statistics.
pub fn mean(dist: &Distribution) -> f64 {
    let total = dist.total();
    if total == 0 {
        return 0.0;
    }
    dist.buckets()
        .map(|(key, bucket)| key as f64 * bucket.count as f64)
        .sum::<f64>()
        / total as f64
}

/// Empirical step quantile over the distinct occupied bucket keys.
///
/// No within-bucket interpolation is performed: the quantile is a bucket
/// key, except exactly at a cumulative step boundary, where the two
/// adjacent keys are averaged. For buckets {1: 1, 5: 2} this yields
/// median 3.0, p25 1.0, p75 5.0.
pub fn percentile(dist: &Distribution, q: f64) -> f64 {
    let keys: Vec<i64> = dist
        .buckets()
        .filter(|(_, bucket)| bucket.count > 0)
        .map(|(key, _)| key)
        .collect();
    if keys.is_empty() {
        return 0.0;
    }

    let m = keys.len() as f64;
    let position = q * m;
    let rounded = position.round();
    let at_boundary = (position - rounded).abs() < 1e-9 && rounded >= 1.0;

    if at_boundary {
        let idx = rounded as usize - 1;
        if idx + 1 < keys.len() {
            (keys[idx] as f64 + keys[idx + 1] as f64) / 2.0
        } else {
            keys[idx] as f64
        }
    } else {
        let idx = (position.ceil() as usize).clamp(1, keys.len()) - 1;
        keys[idx] as f64
    }
}
