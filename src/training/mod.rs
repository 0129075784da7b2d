//! Cross-validation harness
//!
//! Provides:
//! - Monte Carlo train/test splitting
//! - Model families behind the `ModelSpec` trait (linear, P-spline smoothing,
//!   piecewise linear)
//! - RMSE scoring on held-out partitions
//! - The runner that assembles the results table

mod config;
mod models;
pub mod cross_validation;
pub mod linear_models;
pub mod piecewise;
pub mod registry;
pub mod results;
pub mod runner;
pub mod scoring;
pub mod smoothing;

pub use config::{CrossValidationConfig, HingeTerm, RunConfig};
pub use cross_validation::{CVSplit, MonteCarloSplitter, Partition};
pub use linear_models::{FittedLinear, LinearRegression, LinearSpec};
pub use models::{design_matrix, feature_row, FittedModel, ModelSpec};
pub use piecewise::{FittedPiecewise, PiecewiseLinearSpec};
pub use registry::{parse_model_arg, ModelDeclaration, ModelParams, ModelRegistry};
pub use results::{CellFailure, FailureKind, ResultsTable, ScoreRecord};
pub use runner::{CrossValidationRunner, RunnerState};
pub use smoothing::{BSplineBasis, FittedSmooth, Penalty, SmoothSpec};
