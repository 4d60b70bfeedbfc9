//! Stratified K-fold splitting
//!
//! Each example lands in exactly one validation fold. Class proportions are
//! preserved per fold as closely as integer counts allow:
//!
//! 1. Labels are sorted and dealt round-robin over the K folds; the dealt
//!    counts fix how many examples of each class every fold receives.
//! 2. The examples of each class are then assigned to folds in the order
//!    they appear in the input, filling fold 0 first.
//!
//! Splitting is deterministic given the input order. Callers that want a
//! random partition shuffle the corpus beforehand with [`shuffled_indices`].

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::utils::{EnsembleError, Result};

/// One train/validation partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    pub index: usize,
    /// Training indices, ascending
    pub train: Vec<usize>,
    /// Validation indices, ascending
    pub validation: Vec<usize>,
}

/// Split `labels` into `k` stratified folds
pub fn stratified_folds(labels: &[usize], k: usize) -> Result<Vec<Fold>> {
    if k < 2 {
        return Err(EnsembleError::Config(format!(
            "at least 2 folds are required, got {}",
            k
        )));
    }
    if k > labels.len() {
        return Err(EnsembleError::Config(format!(
            "cannot split {} examples into {} folds",
            labels.len(),
            k
        )));
    }

    let num_classes = labels.iter().max().map(|&m| m + 1).unwrap_or(0);
    let mut class_counts = vec![0usize; num_classes];
    for &label in labels {
        class_counts[label] += 1;
    }

    let smallest = class_counts.iter().filter(|&&c| c > 0).min().copied().unwrap_or(0);
    if smallest < k {
        warn!(
            "The least populated class has only {} members, fewer than {} folds",
            smallest, k
        );
    }

    // allocation[fold][class]: dealing sorted labels round-robin
    let mut sorted = labels.to_vec();
    sorted.sort_unstable();
    let mut allocation = vec![vec![0usize; num_classes]; k];
    for (position, &label) in sorted.iter().enumerate() {
        allocation[position % k][label] += 1;
    }

    let mut assignment = vec![0usize; labels.len()];
    for class in 0..num_classes {
        let mut slots = (0..k).flat_map(|fold| std::iter::repeat(fold).take(allocation[fold][class]));
        for (idx, _) in labels.iter().enumerate().filter(|&(_, &l)| l == class) {
            // Allocation for a class sums to its count, so a slot always exists
            assignment[idx] = slots.next().unwrap_or(k - 1);
        }
    }

    let folds = (0..k)
        .map(|fold| {
            let (validation, train): (Vec<usize>, Vec<usize>) =
                (0..labels.len()).partition(|&i| assignment[i] == fold);
            Fold {
                index: fold,
                train,
                validation,
            }
        })
        .collect();

    Ok(folds)
}

/// A seeded permutation of `0..len`
pub fn shuffled_indices(len: usize, seed: u64) -> Vec<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut indices: Vec<usize> = (0..len).collect();
    indices.shuffle(&mut rng);
    indices
}
