//! Stratified k-fold splitting
//!
//! Each class is shuffled with a seeded generator and dealt round-robin over
//! the folds, continuing the rotation from one class to the next so fold
//! sizes differ by at most one.

use crate::errors::{Result, StarterError};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;
use tracing::warn;

/// A single train/validation split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    /// Zero-based fold number
    pub index: usize,
    pub train_indices: Vec<usize>,
    pub valid_indices: Vec<usize>,
}

/// Stratified K-Fold splitter
#[derive(Debug, Clone)]
pub struct StratifiedKFold {
    n_splits: usize,
    shuffle: bool,
    seed: u64,
}

impl StratifiedKFold {
    /// Shuffling splitter seeded with `seed`
    pub fn new(n_splits: usize, seed: u64) -> Self {
        Self {
            n_splits,
            shuffle: true,
            seed,
        }
    }

    /// Keep the original row order inside each class
    pub fn without_shuffle(mut self) -> Self {
        self.shuffle = false;
        self
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Split rows by `labels` (class = rounded label value)
    pub fn split(&self, labels: &[f64]) -> Result<Vec<Fold>> {
        let k = self.n_splits;
        if k < 2 {
            return Err(StarterError::InvalidConfiguration(format!(
                "n_splits must be at least 2, got {k}"
            )));
        }
        if labels.len() < k {
            return Err(StarterError::InvalidConfiguration(format!(
                "n_samples ({}) must be >= n_splits ({})",
                labels.len(),
                k
            )));
        }

        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &label) in labels.iter().enumerate() {
            if label.is_nan() {
                return Err(StarterError::InvalidLabels(format!(
                    "row {idx} has a missing label"
                )));
            }
            class_indices.entry(label.round() as i64).or_default().push(idx);
        }

        if let Some((class, members)) = class_indices.iter().find(|(_, m)| m.len() < k) {
            warn!(
                "least populated class {} has only {} members, fewer than n_splits={}",
                class,
                members.len(),
                k
            );
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut assignment = vec![0usize; labels.len()];
        let mut offset = 0usize;

        for members in class_indices.values_mut() {
            if self.shuffle {
                members.shuffle(&mut rng);
            }
            for (i, &row) in members.iter().enumerate() {
                assignment[row] = (offset + i) % k;
            }
            offset += members.len();
        }

        let folds = (0..k)
            .map(|index| {
                let (valid_indices, train_indices): (Vec<usize>, Vec<usize>) =
                    (0..labels.len()).partition(|&row| assignment[row] == index);
                Fold {
                    index,
                    train_indices,
                    valid_indices,
                }
            })
            .collect();

        Ok(folds)
    }
}
