//! The distribution builder: raw per-client values to bucketed counts.
//!
//! One dispatch point over the metric kind maps each raw value to bucket
//! contributions; everything downstream is a pure fold into per-(branch,
//! subgroup) `Distribution`s. Rows without a defined value for the metric
//! are excluded from both numerator and denominator.

use std::collections::{BTreeMap, BTreeSet};

use experiment_analyzer_core::{BucketSpec, Distribution, MetricDefinition, MetricKind, SUBGROUP_ALL};

use crate::analyzer::AnalyzerError;
use crate::dataset::{ClientRow, MetricValue};

/// Distributions per (branch, subgroup) for one metric.
pub type GroupedDistributions = BTreeMap<(String, String), Distribution>;

/// Stable ordinal assignment for an enumerated string metric.
///
/// Ordinals follow the lexicographic order of the distinct observed values,
/// not first-seen scan order: scan order is non-deterministic under
/// parallel or partitioned execution, and the bucket keys must reproduce
/// across runs.
#[derive(Debug, Clone, Default)]
pub struct StringOrdinals {
    ordinals: BTreeMap<String, i64>,
}

impl StringOrdinals {
    /// Assign ordinals over the sorted distinct values.
    pub fn from_values<'a>(values: impl Iterator<Item = &'a str>) -> Self {
        let distinct: BTreeSet<&str> = values.collect();
        let ordinals = distinct
            .into_iter()
            .enumerate()
            .map(|(ordinal, value)| (value.to_string(), ordinal as i64))
            .collect();
        Self { ordinals }
    }

    /// The bucket key for `value`, if observed.
    pub fn key(&self, value: &str) -> Option<i64> {
        self.ordinals.get(value).copied()
    }
}

/// The bucket contributions of one raw scalar or histogram value.
/// `(bucket key, count, label)` triples.
type Contributions = Vec<(i64, u64, Option<String>)>;

/// Map one unkeyed raw value to its bucket contributions.
///
/// `None` means the value is undefined for this metric (absent column,
/// negative uint garbage) and the row is excluded from `n` entirely.
fn contributions(
    kind: &MetricKind,
    value: &MetricValue,
    ordinals: &StringOrdinals,
    metric_name: &str,
) -> Result<Option<Contributions>, AnalyzerError> {
    match (kind, value) {
        (MetricKind::Histogram { buckets }, MetricValue::Histogram(counts)) => {
            let total: u64 = counts.values().sum();
            if total == 0 {
                return Ok(None);
            }
            Ok(Some(
                counts
                    .iter()
                    .map(|(key, count)| {
                        (*key, *count, buckets.label(*key).map(str::to_string))
                    })
                    .collect(),
            ))
        }
        (MetricKind::UintScalar, MetricValue::Uint(raw)) => {
            // Raw telemetry occasionally carries negative garbage in uint
            // columns; such values are undefined, not errors.
            if *raw < 0 {
                return Ok(None);
            }
            Ok(Some(vec![(*raw, 1, None)]))
        }
        (MetricKind::BooleanScalar, MetricValue::Bool(raw)) => {
            let (key, label) = if *raw { (1, "True") } else { (0, "False") };
            Ok(Some(vec![(key, 1, Some(label.to_string()))]))
        }
        (MetricKind::StringScalar, MetricValue::String(raw)) => {
            // Ordinals cover every observed value by construction.
            match ordinals.key(raw) {
                Some(key) => Ok(Some(vec![(key, 1, Some(raw.clone()))])),
                None => Ok(None),
            }
        }
        (_, _) => Err(AnalyzerError::MetricTypeMismatch {
            metric: metric_name.to_string(),
            expected: kind.type_tag(),
        }),
    }
}

/// Collect every string value observed for `metric` across the rows,
/// including inside keyed wrappers.
fn observed_strings<'a>(rows: &[&'a ClientRow], metric: &str) -> Vec<&'a str> {
    let mut values = Vec::new();
    for row in rows {
        match row.metric(metric) {
            Some(MetricValue::String(value)) => values.push(value.as_str()),
            Some(MetricValue::Keyed(keys)) => {
                for value in keys.values() {
                    if let MetricValue::String(value) = value {
                        values.push(value.as_str());
                    }
                }
            }
            _ => {}
        }
    }
    values
}

/// Build the per-(branch, subgroup) distributions for one metric.
///
/// Keyed metrics produce one sub-distribution per observed key plus the
/// `"All"` rollup (the bucket-wise sum over keys); unkeyed metrics produce
/// only the `"All"` subgroup. Histogram distributions are zero-filled over
/// the bucket keys the definition declares.
pub fn build_distributions(
    rows: &[&ClientRow],
    metric_name: &str,
    def: &MetricDefinition,
) -> Result<GroupedDistributions, AnalyzerError> {
    // Canonical ordinal scheme shared by every branch and subgroup.
    let ordinals = StringOrdinals::from_values(observed_strings(rows, metric_name).into_iter());

    let mut grouped: GroupedDistributions = BTreeMap::new();

    for row in rows {
        let Some(value) = row.metric(metric_name) else {
            continue;
        };
        let branch = row.experiment_branch.as_str();

        match (def.keyed, value) {
            (true, MetricValue::Keyed(keys)) => {
                for (key, value) in keys {
                    let Some(contribs) =
                        contributions(&def.kind, value, &ordinals, metric_name)?
                    else {
                        continue;
                    };
                    record_all(&mut grouped, branch, key, &contribs);
                    record_all(&mut grouped, branch, SUBGROUP_ALL, &contribs);
                }
            }
            (true, _) => {
                return Err(AnalyzerError::MetricTypeMismatch {
                    metric: metric_name.to_string(),
                    expected: "Keyed",
                });
            }
            (false, _) => {
                let Some(contribs) = contributions(&def.kind, value, &ordinals, metric_name)?
                else {
                    continue;
                };
                record_all(&mut grouped, branch, SUBGROUP_ALL, &contribs);
            }
        }
    }

    if let MetricKind::Histogram { buckets } = &def.kind {
        zero_fill(&mut grouped, buckets);
    }

    Ok(grouped)
}

/// Per-client top-level bucket contributions for one metric.
///
/// Used to rebuild pseudo-branch distributions under permuted labels
/// without another pass over raw values: one entry per client with a
/// defined value, keyed contributions summed across keys. Labels are
/// irrelevant to divergence and dropped.
pub fn client_contributions<'a>(
    rows: &[&'a ClientRow],
    metric_name: &str,
    def: &MetricDefinition,
) -> Result<Vec<(&'a str, Vec<(i64, u64)>)>, AnalyzerError> {
    let ordinals = StringOrdinals::from_values(observed_strings(rows, metric_name).into_iter());
    let mut per_client = Vec::new();

    for row in rows {
        let Some(value) = row.metric(metric_name) else {
            continue;
        };
        let mut counts: BTreeMap<i64, u64> = BTreeMap::new();
        match (def.keyed, value) {
            (true, MetricValue::Keyed(keys)) => {
                for value in keys.values() {
                    if let Some(contribs) =
                        contributions(&def.kind, value, &ordinals, metric_name)?
                    {
                        for (key, count, _) in contribs {
                            *counts.entry(key).or_default() += count;
                        }
                    }
                }
            }
            (true, _) => {
                return Err(AnalyzerError::MetricTypeMismatch {
                    metric: metric_name.to_string(),
                    expected: "Keyed",
                });
            }
            (false, _) => {
                if let Some(contribs) = contributions(&def.kind, value, &ordinals, metric_name)? {
                    for (key, count, _) in contribs {
                        *counts.entry(key).or_default() += count;
                    }
                }
            }
        }
        if !counts.is_empty() {
            per_client.push((row.client_id.as_str(), counts.into_iter().collect()));
        }
    }

    Ok(per_client)
}

fn record_all(
    grouped: &mut GroupedDistributions,
    branch: &str,
    subgroup: &str,
    contribs: &Contributions,
) {
    let dist = grouped
        .entry((branch.to_string(), subgroup.to_string()))
        .or_default();
    for (key, count, label) in contribs {
        dist.record(*key, *count, label.as_deref());
    }
}

/// Ensure every declared bucket key appears in every distribution.
fn zero_fill(grouped: &mut GroupedDistributions, buckets: &BucketSpec) {
    let keys = buckets.keys();
    for dist in grouped.values_mut() {
        for key in &keys {
            dist.ensure_bucket(*key, buckets.label(*key));
        }
    }
}
