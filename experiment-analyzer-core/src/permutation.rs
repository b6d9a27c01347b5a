//! Deterministic permutation assignment for resampling-based significance.
//!
//! Every client receives K independently drawn branch labels, weighted by
//! the observed relative size of each branch. A draw is a pure function of
//! (experiment id, client id, slot index), hashed with FNV-1a rather than
//! the process-seeded std hasher, so re-running the analysis over the same
//! population yields bit-identical assignments regardless of row order,
//! partitioning, or retries.

use std::collections::BTreeMap;
use std::hash::Hasher;

use fnv::FnvHasher;
use thiserror::Error;

/// Default number of permutation slots per client.
pub const DEFAULT_PERMUTATIONS: u32 = 100;

/// Errors constructing branch weights.
#[derive(Debug, Error)]
pub enum WeightError {
    /// A branch the experiment declares has no observed client count. This
    /// is a data-integrity violation: weighting requires every branch's
    /// size, so the whole experiment's analysis fails rather than silently
    /// omitting the branch.
    #[error("No client count for branch '{0}'")]
    MissingBranchCount(String),

    /// A branch has a zero client count, which would give it zero weight.
    #[error("Branch '{0}' has zero clients")]
    EmptyBranch(String),

    /// No branches at all.
    #[error("No branches with client counts")]
    NoBranches,
}

/// Per-branch weights as cumulative cutoffs in [0, 1].
///
/// Branches are ordered by name so that the cutoff vector, and therefore
/// every draw, is independent of the order counts were aggregated in.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchWeights {
    cutoffs: Vec<(String, f64)>,
}

impl BranchWeights {
    /// Build weights from per-branch top-level client counts.
    ///
    /// `declared` optionally names the branches the experiment is expected
    /// to have; any declared branch missing from `counts` fails the
    /// construction.
    pub fn from_counts(
        counts: &BTreeMap<String, u64>,
        declared: &[String],
    ) -> Result<Self, WeightError> {
        for branch in declared {
            if !counts.contains_key(branch) {
                return Err(WeightError::MissingBranchCount(branch.clone()));
            }
        }
        if counts.is_empty() {
            return Err(WeightError::NoBranches);
        }
        for (branch, count) in counts {
            if *count == 0 {
                return Err(WeightError::EmptyBranch(branch.clone()));
            }
        }

        let total: u64 = counts.values().sum();
        let mut cutoffs = Vec::with_capacity(counts.len());
        let mut cumulative = 0.0;
        // BTreeMap iteration is name-sorted, which fixes the cutoff order.
        for (branch, count) in counts {
            cumulative += *count as f64 / total as f64;
            cutoffs.push((branch.clone(), cumulative));
        }
        // Guard the last cutoff against accumulated rounding error so every
        // draw in [0, 1) lands in some branch.
        if let Some(last) = cutoffs.last_mut() {
            last.1 = 1.0;
        }
        Ok(Self { cutoffs })
    }

    /// Branch names in cutoff order.
    pub fn branches(&self) -> impl Iterator<Item = &str> {
        self.cutoffs.iter().map(|(branch, _)| branch.as_str())
    }

    /// The branch whose cumulative cutoff first covers `value` in [0, 1).
    fn branch_for(&self, value: f64) -> &str {
        for (branch, cutoff) in &self.cutoffs {
            if value <= *cutoff {
                return branch;
            }
        }
        // Unreachable given the final cutoff is 1.0.
        &self.cutoffs.last().unwrap().0
    }
}

/// Deterministic generator of per-client branch-label vectors.
#[derive(Debug, Clone)]
pub struct PermutationGenerator {
    experiment_id: String,
    weights: BranchWeights,
    permutations: u32,
}

impl PermutationGenerator {
    /// Create a generator salted with the experiment id.
    pub fn new(experiment_id: &str, weights: BranchWeights, permutations: u32) -> Self {
        Self {
            experiment_id: experiment_id.to_string(),
            weights,
            permutations,
        }
    }

    /// Number of permutation slots per client.
    pub fn permutations(&self) -> u32 {
        self.permutations
    }

    /// The branch label drawn for `client_id` at permutation `slot`.
    ///
    /// Pure in (experiment id, client id, slot) and the weight cutoffs.
    pub fn assign(&self, client_id: &str, slot: u32) -> &str {
        let mut hasher = FnvHasher::default();
        hasher.write(self.experiment_id.as_bytes());
        hasher.write(&[0]);
        hasher.write(client_id.as_bytes());
        hasher.write(&[0]);
        hasher.write(&slot.to_le_bytes());
        let draw = uniform_from_hash(hasher.finish());
        self.weights.branch_for(draw)
    }

    /// The full K-slot label vector for one client.
    pub fn assignments(&self, client_id: &str) -> Vec<&str> {
        (0..self.permutations)
            .map(|slot| self.assign(client_id, slot))
            .collect()
    }
}

/// Map a 64-bit hash to a uniform f64 in [0, 1) using the top 53 bits.
fn uniform_from_hash(hash: u64) -> f64 {
    (hash >> 11) as f64 / (1u64 << 53) as f64
}
