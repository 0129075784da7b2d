//! Synthetic benchmark data
//!
//! Generates the curved benchmark used to compare model families:
//! `x ~ U(0, 1)`, `y = 1 - 10 (x - 0.3)^2 + e`, `e ~ N(0, noise_sd)`.

use super::Dataset;
use crate::error::{MccvError, Result};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

/// Quadratic benchmark generator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuadraticBenchmark {
    /// Number of observations
    pub n: usize,
    /// Standard deviation of the additive noise
    pub noise_sd: f64,
    /// Random seed (None = entropy)
    pub seed: Option<u64>,
}

impl Default for QuadraticBenchmark {
    fn default() -> Self {
        Self {
            n: 100,
            noise_sd: 0.4,
            seed: None,
        }
    }
}

impl QuadraticBenchmark {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            ..Default::default()
        }
    }

    pub fn with_noise(mut self, noise_sd: f64) -> Self {
        self.noise_sd = noise_sd;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Noise-free mean response
    pub fn truth(x: f64) -> f64 {
        1.0 - 10.0 * (x - 0.3).powi(2)
    }

    /// Generate a dataset with predictor `x` and response `y`
    pub fn generate(&self) -> Result<Dataset> {
        let noise = Normal::new(0.0, self.noise_sd).map_err(|e| MccvError::InvalidParameter {
            name: "noise_sd".to_string(),
            value: self.noise_sd.to_string(),
            reason: e.to_string(),
        })?;

        let mut rng = match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let x: Vec<f64> = (0..self.n).map(|_| rng.gen::<f64>()).collect();
        let y: Vec<f64> = x
            .iter()
            .map(|&xi| Self::truth(xi) + noise.sample(&mut rng))
            .collect();

        Dataset::from_columns("y", y, vec![("x".to_string(), x)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_shape() {
        let ds = QuadraticBenchmark::new(50).with_seed(7).generate().unwrap();
        assert_eq!(ds.len(), 50);
        assert_eq!(ds.predictor_names(), &["x".to_string()]);
        assert!(ds.column("x").unwrap().iter().all(|&x| (0.0..1.0).contains(&x)));
    }

    #[test]
    fn test_seed_reproducible() {
        let a = QuadraticBenchmark::new(20).with_seed(3).generate().unwrap();
        let b = QuadraticBenchmark::new(20).with_seed(3).generate().unwrap();
        assert_eq!(a.responses(), b.responses());
    }

    #[test]
    fn test_noise_free() {
        let ds = QuadraticBenchmark::new(10).with_noise(0.0).with_seed(1).generate().unwrap();
        for obs in &ds {
            let x = obs.predictor("x").unwrap();
            assert!((obs.response() - QuadraticBenchmark::truth(x)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_negative_noise_rejected() {
        assert!(QuadraticBenchmark::new(10).with_noise(-1.0).generate().is_err());
    }
}
