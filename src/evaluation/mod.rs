//! Summaries of cross-validation results
//!
//! Turns a [`crate::training::ResultsTable`] into one error distribution
//! summary per model family. No rendering happens here.

mod summary;

pub use summary::{best_by_median, summarize, ModelSummary};
