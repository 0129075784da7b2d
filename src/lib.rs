//! mccv - Monte Carlo cross-validation for competing regression families
//!
//! This crate estimates the out-of-sample error of several model families on
//! one dataset by repeatedly splitting it into random train/test partitions,
//! fitting every family on each training half and scoring it (RMSE) on the
//! paired test half.
//!
//! # Modules
//!
//! - [`data`] - Observations, datasets, CSV loading, derived features
//! - [`training`] - Splitter, model families, scorer and runner
//! - [`evaluation`] - Per-model RMSE distribution summaries
//! - [`cli`] - Command-line interface
//! - [`utils`] - Linear algebra and parallel helpers
//!
//! # Example
//!
//! ```no_run
//! use mccv::prelude::*;
//!
//! let dataset = QuadraticBenchmark::new(100).with_seed(1).generate()?;
//! let models: Vec<Box<dyn ModelSpec>> = vec![
//!     Box::new(LinearSpec::new(["x"])),
//!     Box::new(SmoothSpec::new("x").with_name("smoothed")),
//! ];
//! let config = CrossValidationConfig::new(100, 0.8)?.with_seed(42);
//! let table = CrossValidationRunner::new(config).run(&dataset, &models)?;
//! for summary in summarize(&table) {
//!     println!("{}: median RMSE {:.3}", summary.model_name, summary.median);
//! }
//! # Ok::<(), mccv::MccvError>(())
//! ```

// Core error handling
pub mod error;

// Harness
pub mod data;
pub mod training;
pub mod evaluation;

// Utilities
pub mod utils;

// Services
pub mod cli;

pub use error::{MccvError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{MccvError, Result};

    // Data
    pub use crate::data::{group_by_tag, hinge, with_hinge_term, DataLoader, Dataset, DatasetSchema, Observation, QuadraticBenchmark};

    // Training
    pub use crate::training::{
        CrossValidationConfig, CrossValidationRunner, FittedModel, LinearSpec, ModelRegistry, ModelSpec,
        MonteCarloSplitter, Penalty, PiecewiseLinearSpec, ResultsTable, ScoreRecord, SmoothSpec,
    };

    // Evaluation
    pub use crate::evaluation::{best_by_median, summarize, ModelSummary};
}
