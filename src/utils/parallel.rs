//! Parallel processing utilities

use crate::error::{MccvError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Configuration for parallel processing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Number of threads (None = rayon's global pool)
    pub n_threads: Option<usize>,
}

impl ParallelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set number of threads
    pub fn with_threads(mut self, n: usize) -> Self {
        self.n_threads = Some(n);
        self
    }

    /// Get the number of threads to use
    pub fn num_threads(&self) -> usize {
        self.n_threads.unwrap_or_else(rayon::current_num_threads)
    }
}

/// Parallel map that keeps the output in input order.
pub fn parallel_map<T, U, F>(items: Vec<T>, f: F) -> Vec<U>
where
    T: Send,
    U: Send,
    F: Fn(T) -> U + Send + Sync,
{
    items.into_par_iter().map(f).collect()
}

/// Parallel map on a dedicated pool when a thread count is configured.
pub fn parallel_map_with_config<T, U, F>(items: Vec<T>, config: &ParallelConfig, f: F) -> Result<Vec<U>>
where
    T: Send,
    U: Send,
    F: Fn(T) -> U + Send + Sync,
{
    match config.n_threads {
        None => Ok(parallel_map(items, f)),
        Some(n) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| MccvError::ConfigError(format!("failed to build thread pool: {}", e)))?;
            Ok(pool.install(|| items.into_par_iter().map(f).collect()))
        }
    }
}
