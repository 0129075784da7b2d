//! Per-cell scores and the results table

use super::config::CrossValidationConfig;
use crate::data::loader::save_csv;
use crate::error::{MccvError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which step of a cell failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Fit,
    Score,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Fit => write!(f, "fit"),
            FailureKind::Score => write!(f, "score"),
        }
    }
}

/// Local error attached to a NaN-scored cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl CellFailure {
    /// Classify a local error; fatal errors are returned unchanged.
    pub fn from_error(err: MccvError) -> std::result::Result<Self, MccvError> {
        let kind = match &err {
            MccvError::FitError(_) => FailureKind::Fit,
            MccvError::ScoreError(_) => FailureKind::Score,
            _ => return Err(err),
        };
        Ok(Self {
            kind,
            message: err.to_string(),
        })
    }
}

impl std::fmt::Display for CellFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Held-out RMSE of one model on one partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub partition_index: usize,
    pub model_name: String,
    /// NaN when the cell failed
    #[serde(with = "nan_as_null")]
    pub rmse: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<CellFailure>,
}

impl ScoreRecord {
    pub fn scored(partition_index: usize, model_name: impl Into<String>, rmse: f64) -> Self {
        Self {
            partition_index,
            model_name: model_name.into(),
            rmse,
            failure: None,
        }
    }

    pub fn failed(partition_index: usize, model_name: impl Into<String>, failure: CellFailure) -> Self {
        Self {
            partition_index,
            model_name: model_name.into(),
            rmse: f64::NAN,
            failure: Some(failure),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some() || self.rmse.is_nan()
    }
}

impl PartialEq for ScoreRecord {
    fn eq(&self, other: &Self) -> bool {
        let same_rmse = self.rmse == other.rmse || (self.rmse.is_nan() && other.rmse.is_nan());
        self.partition_index == other.partition_index
            && self.model_name == other.model_name
            && same_rmse
            && self.failure == other.failure
    }
}

// JSON has no NaN
mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        let v = if value.is_finite() { Some(*value) } else { None };
        v.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}

/// Ordered records of one run, grouped by partition then model registration order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsTable {
    model_names: Vec<String>,
    config: CrossValidationConfig,
    records: Vec<ScoreRecord>,
}

impl ResultsTable {
    pub fn new(model_names: Vec<String>, config: CrossValidationConfig, records: Vec<ScoreRecord>) -> Self {
        Self {
            model_names,
            config,
            records,
        }
    }

    pub fn records(&self) -> &[ScoreRecord] {
        &self.records
    }

    /// Model names in registration order
    pub fn model_names(&self) -> &[String] {
        &self.model_names
    }

    /// Settings that produced the table
    pub fn config(&self) -> &CrossValidationConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of partitions covered
    pub fn num_partitions(&self) -> usize {
        self.records
            .iter()
            .map(|r| r.partition_index + 1)
            .max()
            .unwrap_or(0)
    }

    /// Scores of one model in partition order, NaN for failed cells
    pub fn scores_for(&self, model_name: &str) -> Vec<f64> {
        self.records
            .iter()
            .filter(|r| r.model_name == model_name)
            .map(|r| r.rmse)
            .collect()
    }

    /// Records whose cell failed
    pub fn failures(&self) -> impl Iterator<Item = &ScoreRecord> {
        self.records.iter().filter(|r| r.is_failed())
    }

    /// Long-format table with columns `partition`, `model`, `rmse`, `failure`
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let partitions: Vec<u32> = self.records.iter().map(|r| r.partition_index as u32).collect();
        let models: Vec<String> = self.records.iter().map(|r| r.model_name.clone()).collect();
        let rmse: Vec<f64> = self.records.iter().map(|r| r.rmse).collect();
        let failures: Vec<Option<String>> = self
            .records
            .iter()
            .map(|r| r.failure.as_ref().map(|f| f.to_string()))
            .collect();

        Ok(DataFrame::new(vec![
            Column::new("partition".into(), partitions),
            Column::new("model".into(), models),
            Column::new("rmse".into(), rmse),
            Column::new("failure".into(), failures),
        ])?)
    }

    /// Write the long-format table as CSV
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut df = self.to_dataframe()?;
        save_csv(&mut df, path)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write JSON to a file
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Read a table written by [`ResultsTable::save_json`]
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ResultsTable {
        let failure = CellFailure::from_error(MccvError::FitError("singular".into())).unwrap();
        ResultsTable::new(
            vec!["linear".into(), "smooth".into()],
            CrossValidationConfig::new(2, 0.8).unwrap().with_seed(1),
            vec![
                ScoreRecord::scored(0, "linear", 0.5),
                ScoreRecord::scored(0, "smooth", 0.25),
                ScoreRecord::scored(1, "linear", 0.75),
                ScoreRecord::failed(1, "smooth", failure),
            ],
        )
    }

    #[test]
    fn test_scores_for() {
        let t = table();
        assert_eq!(t.num_partitions(), 2);
        assert_eq!(t.scores_for("linear"), vec![0.5, 0.75]);
        let smooth = t.scores_for("smooth");
        assert_eq!(smooth[0], 0.25);
        assert!(smooth[1].is_nan());
        assert_eq!(t.failures().count(), 1);
    }

    #[test]
    fn test_fatal_error_is_not_a_cell_failure() {
        assert!(CellFailure::from_error(MccvError::ConfigError("x".into())).is_err());
        let failure = CellFailure::from_error(MccvError::ScoreError("empty".into())).unwrap();
        assert_eq!(failure.kind, FailureKind::Score);
    }

    #[test]
    fn test_json_keeps_nan_cells() {
        let t = table();
        let json = t.to_json().unwrap();
        assert!(json.contains("null"));
        let back = ResultsTable::from_json(&json).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_dataframe_and_csv() {
        let t = table();
        let df = t.to_dataframe().unwrap();
        assert_eq!(df.height(), 4);
        assert_eq!(df.get_column_names().len(), 4);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        t.write_csv(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("partition,model,rmse,failure"));
        assert_eq!(text.lines().count(), 5);
    }
}
