//! Monte Carlo cross-validation splits
//!
//! Every split independently draws a random training subset without
//! replacement; the test subset is the complement, or a random draw of the
//! configured size from the complement. Splits are independent of each other,
//! so an observation can land in many test sets or in none.

use super::config::CrossValidationConfig;
use crate::data::{Dataset, Observation};
use crate::error::{MccvError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// A single train/test split on row indices
#[derive(Debug, Clone, PartialEq)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub split_idx: usize,
}

/// A split resolved against a dataset
#[derive(Debug, Clone)]
pub struct Partition<'a> {
    pub index: usize,
    pub train: Vec<&'a Observation>,
    pub test: Vec<&'a Observation>,
}

impl<'a> Partition<'a> {
    fn resolve(dataset: &'a Dataset, split: &CVSplit) -> Self {
        let rows = dataset.observations();
        Self {
            index: split.split_idx,
            train: split.train_indices.iter().map(|&i| &rows[i]).collect(),
            test: split.test_indices.iter().map(|&i| &rows[i]).collect(),
        }
    }
}

/// Repeated random train/test splitter
#[derive(Debug, Clone)]
pub struct MonteCarloSplitter {
    num_splits: usize,
    train_fraction: f64,
    test_fraction: Option<f64>,
    random_state: Option<u64>,
}

impl MonteCarloSplitter {
    /// Create a splitter from a validated configuration
    pub fn new(config: &CrossValidationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            num_splits: config.num_splits,
            train_fraction: config.train_fraction,
            test_fraction: config.test_fraction,
            random_state: config.seed,
        })
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn num_splits(&self) -> usize {
        self.num_splits
    }

    /// Train and test sizes for `n` observations.
    ///
    /// Sizes are `round(fraction * n)`; either being zero is a
    /// [`MccvError::ConfigError`].
    pub fn split_sizes(&self, n_samples: usize) -> Result<(usize, usize)> {
        let n_train = (self.train_fraction * n_samples as f64).round() as usize;
        let remaining = n_samples.saturating_sub(n_train);
        let n_test = match self.test_fraction {
            Some(f) => ((f * n_samples as f64).round() as usize).min(remaining),
            None => remaining,
        };

        if n_train == 0 || n_test == 0 {
            return Err(MccvError::ConfigError(format!(
                "a split of {} observations with train_fraction {} gives {} train and {} test rows",
                n_samples, self.train_fraction, n_train, n_test
            )));
        }
        Ok((n_train, n_test))
    }

    /// Draw all splits on row indices `0..n_samples`.
    ///
    /// Indices inside each split are sorted ascending.
    pub fn split_indices(&self, n_samples: usize) -> Result<Vec<CVSplit>> {
        if self.num_splits == 0 {
            return Ok(Vec::new());
        }
        let (n_train, n_test) = self.split_sizes(n_samples)?;

        let mut rng = match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let mut indices: Vec<usize> = (0..n_samples).collect();
        let mut splits = Vec::with_capacity(self.num_splits);

        for split_idx in 0..self.num_splits {
            let (chosen, _) = indices.partial_shuffle(&mut rng, n_train + n_test);

            let mut train_indices = chosen[..n_train].to_vec();
            let mut test_indices = chosen[n_train..].to_vec();
            train_indices.sort_unstable();
            test_indices.sort_unstable();

            splits.push(CVSplit {
                train_indices,
                test_indices,
                split_idx,
            });
        }

        Ok(splits)
    }

    /// Draw all splits of `dataset` as borrowed partitions
    pub fn split<'a>(&self, dataset: &'a Dataset) -> Result<Vec<Partition<'a>>> {
        Ok(self
            .split_indices(dataset.len())?
            .iter()
            .map(|split| Partition::resolve(dataset, split))
            .collect())
    }
}
