//! The analysis pipeline for one experiment.
//!
//! The analyzer filters the dataset to the experiment, materializes the
//! per-branch client counts (the blocking aggregation permutation weighting
//! depends on), builds distributions per registry metric, derives the
//! statistics lists, attaches permutation-based significance to top-level
//! divergences, and assembles the ordered output record stream.

use std::collections::BTreeMap;

use thiserror::Error;

use experiment_analyzer_core::{
    chi_square_distance, summarize, BranchWeights, Distribution, MetricAnalysis,
    PermutationGenerator, SignificanceSummary, StatisticName, SUBGROUP_ALL, WeightError,
};
use experiment_analyzer_core::permutation::DEFAULT_PERMUTATIONS;

use crate::builder::{build_distributions, client_contributions, GroupedDistributions};
use crate::crash::{aggregate_crashes, CrashRow};
use crate::dataset::{
    branch_counts, earliest_submission_date, filter_experiment, ClientRow, DatasetError,
};
use crate::registry::MetricRegistry;

/// Errors that abort the analysis of one experiment.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// No rows at all for the experiment.
    #[error("No rows found for experiment '{0}'")]
    EmptyExperiment(String),

    /// Branch weight metadata is incomplete; permutation weighting requires
    /// every branch's size, so the experiment fails rather than silently
    /// dropping a branch.
    #[error("Branch weighting failed: {0}")]
    Weight(#[from] WeightError),

    /// A metric's raw values do not match its registered definition.
    #[error("Metric '{metric}' carries values that do not match its {expected} definition")]
    MetricTypeMismatch {
        metric: String,
        expected: &'static str,
    },

    /// Input dataset could not be read.
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),
}

/// Analysis driver for a single experiment.
pub struct Analyzer {
    experiment_id: String,
    control_branch: String,
    permutations: u32,
    declared_branches: Vec<String>,
}

impl Analyzer {
    /// Create an analyzer for `experiment_id` with `control_branch` as the
    /// comparison baseline.
    pub fn new(experiment_id: &str, control_branch: &str) -> Self {
        Self {
            experiment_id: experiment_id.to_string(),
            control_branch: control_branch.to_string(),
            permutations: DEFAULT_PERMUTATIONS,
            declared_branches: Vec::new(),
        }
    }

    /// Override the number of permutation slots (0 disables significance).
    pub fn with_permutations(mut self, permutations: u32) -> Self {
        self.permutations = permutations;
        self
    }

    /// Declare the branches the experiment is expected to have; a declared
    /// branch with no observed clients fails the run.
    pub fn with_declared_branches(mut self, branches: Vec<String>) -> Self {
        self.declared_branches = branches;
        self
    }

    /// Run the full analysis.
    ///
    /// The output stream is ordered: branch-metadata records first, then
    /// metric analyses (metric name, then branch, with the `"All"` subgroup
    /// leading each branch's keyed subgroups), then crash records.
    ///
    /// # Errors
    ///
    /// Fails on an empty experiment, incomplete branch weights, or a
    /// metric whose values contradict its definition. A missing or empty
    /// crash dataset is not an error.
    pub fn analyze(
        &self,
        rows: &[ClientRow],
        registry: &MetricRegistry,
        crashes: &[CrashRow],
    ) -> Result<Vec<MetricAnalysis>, AnalyzerError> {
        // 1. Filter to the experiment.
        let rows = filter_experiment(rows, &self.experiment_id);
        if rows.is_empty() {
            return Err(AnalyzerError::EmptyExperiment(self.experiment_id.clone()));
        }

        // 2. Blocking aggregation: per-branch client counts must be fully
        // materialized before any permutation draw.
        let counts = branch_counts(&rows);

        let mut records: Vec<MetricAnalysis> = counts
            .iter()
            .map(|(branch, n)| MetricAnalysis::branch_metadata(&self.experiment_id, branch, *n))
            .collect();

        // 3. Branch weights and the deterministic generator.
        let weights = BranchWeights::from_counts(&counts, &self.declared_branches)?;
        let generator =
            PermutationGenerator::new(&self.experiment_id, weights, self.permutations);

        // 4. Per-metric analyses.
        for (metric_name, def) in registry.iter() {
            let grouped = build_distributions(&rows, metric_name, def)?;
            let contributions = if self.permutations > 0 {
                client_contributions(&rows, metric_name, def)?
            } else {
                Vec::new()
            };
            let mut null_cache: BTreeMap<(String, String), Vec<f64>> = BTreeMap::new();

            for (branch, subgroup) in ordered_groups(&grouped) {
                let dist = &grouped[&(branch.clone(), subgroup.clone())];
                let comparisons = self.comparisons(&grouped, &branch, &subgroup);
                let mut statistics = summarize(dist, &comparisons);

                if subgroup == SUBGROUP_ALL && self.permutations > 0 {
                    if let Some(statistics) = statistics.as_mut() {
                        self.attach_significance(
                            statistics,
                            &branch,
                            &contributions,
                            &generator,
                            &mut null_cache,
                        );
                    }
                }

                records.push(MetricAnalysis {
                    experiment_id: self.experiment_id.clone(),
                    experiment_branch: branch,
                    subgroup,
                    n: dist.total(),
                    metric_name: metric_name.to_string(),
                    metric_type: def.kind.type_tag().to_string(),
                    histogram: dist.points(),
                    statistics,
                });
            }
        }

        // 5. Crash/error aggregates.
        let since = earliest_submission_date(&rows);
        records.extend(aggregate_crashes(crashes, &self.experiment_id, since));

        Ok(records)
    }

    /// The comparison set for one (branch, subgroup): control gets every
    /// other branch (symmetric presentation); non-control branches get
    /// control alone. An absent control yields no comparisons.
    fn comparisons(
        &self,
        grouped: &GroupedDistributions,
        branch: &str,
        subgroup: &str,
    ) -> BTreeMap<String, Distribution> {
        let mut comparisons = BTreeMap::new();
        if branch == self.control_branch {
            for ((other, other_subgroup), dist) in grouped {
                if other != branch && other_subgroup == subgroup {
                    comparisons.insert(other.clone(), dist.clone());
                }
            }
        } else if let Some(control) = grouped
            .get(&(self.control_branch.clone(), subgroup.to_string()))
        {
            comparisons.insert(self.control_branch.clone(), control.clone());
        }
        comparisons
    }

    /// Attach the permutation-test summary to each divergence statistic.
    ///
    /// The empirical null for a branch pair is computed once per metric and
    /// shared between the pair's two symmetric presentations.
    fn attach_significance(
        &self,
        statistics: &mut [experiment_analyzer_core::Statistic],
        branch: &str,
        contributions: &[(&str, Vec<(i64, u64)>)],
        generator: &PermutationGenerator,
        null_cache: &mut BTreeMap<(String, String), Vec<f64>>,
    ) {
        for statistic in statistics {
            if statistic.name != StatisticName::ChiSquareDistance {
                continue;
            }
            let Some(other) = statistic.comparison_branch.clone() else {
                continue;
            };
            let pair = pair_key(branch, &other);
            let null = null_cache
                .entry(pair)
                .or_insert_with(|| permuted_null(contributions, generator, branch, &other));
            if let Some(summary) = SignificanceSummary::from_null(statistic.value, null) {
                statistic.metadata = Some(summary.to_metadata());
            }
        }
    }
}

/// Groups in output order: branch-sorted, `"All"` before keyed subgroups.
fn ordered_groups(grouped: &GroupedDistributions) -> Vec<(String, String)> {
    let mut groups: Vec<(String, String)> = grouped.keys().cloned().collect();
    groups.sort_by(|(branch_a, sub_a), (branch_b, sub_b)| {
        branch_a
            .cmp(branch_b)
            .then_with(|| subgroup_rank(sub_a).cmp(&subgroup_rank(sub_b)))
            .then_with(|| sub_a.cmp(sub_b))
    });
    groups
}

fn subgroup_rank(subgroup: &str) -> u8 {
    u8::from(subgroup != SUBGROUP_ALL)
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// The empirical null: for every permutation slot, relabel each client by
/// its deterministic draw and recompute the divergence between the two
/// pseudo-branches. Slots where either pseudo-branch ends up empty
/// contribute no score.
fn permuted_null(
    contributions: &[(&str, Vec<(i64, u64)>)],
    generator: &PermutationGenerator,
    branch_a: &str,
    branch_b: &str,
) -> Vec<f64> {
    (0..generator.permutations())
        .filter_map(|slot| {
            let mut dist_a = Distribution::new();
            let mut dist_b = Distribution::new();
            for (client_id, contribs) in contributions {
                let label = generator.assign(client_id, slot);
                let target = if label == branch_a {
                    &mut dist_a
                } else if label == branch_b {
                    &mut dist_b
                } else {
                    continue;
                };
                for (key, count) in contribs {
                    target.record(*key, *count, None);
                }
            }
            chi_square_distance(&dist_a, &dist_b)
        })
        .collect()
}
