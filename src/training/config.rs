//! Cross-validation and run configuration

use crate::data::DatasetSchema;
use crate::error::{MccvError, Result};
use crate::utils::ParallelConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for a Monte Carlo cross-validation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCrossValidationConfig")]
pub struct CrossValidationConfig {
    /// Number of independent train/test partitions
    pub num_splits: usize,

    /// Fraction of observations drawn for training
    pub train_fraction: f64,

    /// Fraction drawn for testing (None = complement of the train set)
    pub test_fraction: Option<f64>,

    /// Random seed for reproducibility
    pub seed: Option<u64>,

    /// Evaluate (partition, model) cells on the rayon pool
    pub parallel: bool,

    /// Number of worker threads (None = rayon default)
    pub n_threads: Option<usize>,
}

impl Default for CrossValidationConfig {
    fn default() -> Self {
        Self {
            num_splits: 100,
            train_fraction: 0.8,
            test_fraction: None,
            seed: None,
            parallel: false,
            n_threads: None,
        }
    }
}

impl CrossValidationConfig {
    /// Create a validated configuration.
    ///
    /// `num_splits` is signed so that negative counts coming from user input
    /// surface as [`MccvError::ConfigError`] rather than wrapping.
    pub fn new(num_splits: i64, train_fraction: f64) -> Result<Self> {
        let num_splits = usize::try_from(num_splits).map_err(|_| {
            MccvError::ConfigError(format!("num_splits must be >= 0, got {}", num_splits))
        })?;
        let config = Self {
            num_splits,
            train_fraction,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Set the test fraction
    pub fn with_test_fraction(mut self, fraction: f64) -> Self {
        self.test_fraction = Some(fraction);
        self
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Enable/disable parallel cell evaluation
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set number of worker threads (implies parallel evaluation)
    pub fn with_threads(mut self, n_threads: usize) -> Self {
        self.n_threads = Some(n_threads);
        self.parallel = true;
        self
    }

    /// Check fraction ranges and thread counts
    pub fn validate(&self) -> Result<()> {
        if !(self.train_fraction > 0.0 && self.train_fraction < 1.0) {
            return Err(MccvError::ConfigError(format!(
                "train_fraction must be in (0, 1), got {}",
                self.train_fraction
            )));
        }
        if let Some(test) = self.test_fraction {
            if !(test > 0.0 && test <= 1.0 - self.train_fraction + f64::EPSILON) {
                return Err(MccvError::ConfigError(format!(
                    "test_fraction must be in (0, {}], got {}",
                    1.0 - self.train_fraction,
                    test
                )));
            }
        }
        if self.n_threads == Some(0) {
            return Err(MccvError::ConfigError("n_threads must be positive".to_string()));
        }
        Ok(())
    }

    pub(crate) fn parallel_config(&self) -> ParallelConfig {
        ParallelConfig {
            n_threads: self.n_threads,
        }
    }
}

/// Unvalidated wire form of [`CrossValidationConfig`]
#[derive(Deserialize)]
struct RawCrossValidationConfig {
    #[serde(default = "default_num_splits")]
    num_splits: i64,
    #[serde(default = "default_train_fraction")]
    train_fraction: f64,
    #[serde(default)]
    test_fraction: Option<f64>,
    #[serde(default)]
    seed: Option<u64>,
    #[serde(default)]
    parallel: bool,
    #[serde(default)]
    n_threads: Option<usize>,
}

fn default_num_splits() -> i64 {
    100
}

fn default_train_fraction() -> f64 {
    0.8
}

impl TryFrom<RawCrossValidationConfig> for CrossValidationConfig {
    type Error = MccvError;

    fn try_from(raw: RawCrossValidationConfig) -> Result<Self> {
        let mut config = Self::new(raw.num_splits, raw.train_fraction)?;
        config.test_fraction = raw.test_fraction;
        config.seed = raw.seed;
        config.parallel = raw.parallel || raw.n_threads.is_some();
        config.n_threads = raw.n_threads;
        config.validate()?;
        Ok(config)
    }
}

/// A hinge predictor derived before the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HingeTerm {
    /// Source predictor
    pub source: String,
    /// Change point
    pub threshold: f64,
    /// Name of the derived predictor (default `<source>_after_<threshold>`)
    #[serde(default)]
    pub name: Option<String>,
}

impl HingeTerm {
    pub fn new(source: impl Into<String>, threshold: f64) -> Self {
        Self {
            source: source.into(),
            threshold,
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Name of the derived predictor
    pub fn column_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}_after_{}", self.source, self.threshold))
    }
}

impl std::str::FromStr for HingeTerm {
    type Err = MccvError;

    /// Parse `source:threshold[:name]`
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() < 2 || parts.len() > 3 || parts[0].is_empty() {
            return Err(MccvError::ConfigError(format!(
                "hinge term must look like source:threshold[:name], got '{}'",
                s
            )));
        }
        let threshold = parts[1].trim().parse::<f64>().map_err(|_| MccvError::InvalidParameter {
            name: "threshold".to_string(),
            value: parts[1].to_string(),
            reason: "not a number".to_string(),
        })?;

        let term = HingeTerm::new(parts[0].trim(), threshold);
        Ok(match parts.get(2) {
            Some(name) if !name.is_empty() => term.with_name(name.trim()),
            _ => term,
        })
    }
}

/// Everything needed to run the harness from a JSON file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// CSV dataset
    pub data: PathBuf,

    /// Column mapping
    pub schema: DatasetSchema,

    /// Derived hinge predictors
    #[serde(default)]
    pub hinges: Vec<HingeTerm>,

    /// Model declarations in `label=family:key=value,...` form
    pub models: Vec<String>,

    /// Split settings
    #[serde(default)]
    pub cross_validation: CrossValidationConfig,

    /// Tag to group by before running
    #[serde(default)]
    pub group_by: Option<String>,

    /// Where to write the results table
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl RunConfig {
    /// Load and validate a run file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: RunConfig = serde_json::from_str(&text)?;
        config.schema.validate()?;
        if config.models.is_empty() {
            return Err(MccvError::ConfigError("run file declares no models".to_string()));
        }
        Ok(config)
    }
}
