//! Chi-square distance between two bucket-ratio vectors.

use std::collections::BTreeSet;

use crate::distribution::Distribution;

/// Normalized chi-square distance between two distributions.
///
/// Buckets are unioned across both sides, with missing buckets contributing
/// ratio 0; the distance is `0.5 * sum((p - q)^2 / (p + q))` over the
/// buckets where at least one ratio is positive. The result is symmetric,
/// non-negative, 0 iff the ratio vectors are identical bucket-for-bucket,
/// and bounded by 1.0.
///
/// Returns `None` when either distribution is empty: a comparison against
/// nothing is omitted, not reported as zero.
pub fn chi_square_distance(a: &Distribution, b: &Distribution) -> Option<f64> {
    if a.is_empty() || b.is_empty() {
        return None;
    }

    let keys: BTreeSet<i64> = a.keys().chain(b.keys()).collect();
    let mut distance = 0.0;
    for key in keys {
        let p = a.ratio(key);
        let q = b.ratio(key);
        let denom = p + q;
        if denom > 0.0 {
            distance += (p - q).powi(2) / denom;
        }
    }
    Some(distance / 2.0)
}
