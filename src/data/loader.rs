//! Data loading utilities

use super::{Dataset, Observation};
use crate::error::{MccvError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Column roles used to turn a table into a [`Dataset`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSchema {
    /// Response column
    pub response: String,
    /// Numeric predictor columns
    pub predictors: Vec<String>,
    /// Identifier column (None = zero-based row number)
    #[serde(default)]
    pub id_column: Option<String>,
    /// Categorical columns kept as tags
    #[serde(default)]
    pub tag_columns: Vec<String>,
}

impl DatasetSchema {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            predictors: Vec::new(),
            id_column: None,
            tag_columns: Vec::new(),
        }
    }

    pub fn with_predictors<S: Into<String>>(mut self, predictors: impl IntoIterator<Item = S>) -> Self {
        self.predictors = predictors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = Some(column.into());
        self
    }

    pub fn with_tag_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.tag_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Require at least one predictor and distinct column names
    pub fn validate(&self) -> Result<()> {
        if self.predictors.is_empty() {
            return Err(MccvError::ConfigError(
                "schema must declare at least one predictor".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for name in std::iter::once(&self.response).chain(self.predictors.iter()) {
            if !seen.insert(name.as_str()) {
                return Err(MccvError::ConfigError(format!(
                    "column '{}' is declared more than once",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// CSV loader backed by polars
#[derive(Debug, Clone)]
pub struct DataLoader {
    delimiter: u8,
    infer_schema_length: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            infer_schema_length: 100,
        }
    }

    /// Set the field delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Load a CSV file with a header row
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let file = File::open(path.as_ref())?;

        let parse_opts = CsvParseOptions::default().with_separator(self.delimiter);

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| MccvError::DatasetError(e.to_string()))
    }

    /// Load a CSV file and map it to a dataset
    pub fn load_dataset(&self, path: impl AsRef<Path>, schema: &DatasetSchema) -> Result<Dataset> {
        let path = path.as_ref();
        let df = self.load_csv(path)?;
        debug!(path = %path.display(), rows = df.height(), cols = df.width(), "loaded csv");
        dataset_from_dataframe(&df, schema)
    }
}

impl Dataset {
    /// Build a dataset from a loaded table
    pub fn from_dataframe(df: &DataFrame, schema: &DatasetSchema) -> Result<Self> {
        dataset_from_dataframe(df, schema)
    }
}

/// Convert a DataFrame into a dataset according to `schema`.
pub fn dataset_from_dataframe(df: &DataFrame, schema: &DatasetSchema) -> Result<Dataset> {
    schema.validate()?;
    let n_rows = df.height();

    let response = numeric_column(df, &schema.response)?;
    let predictor_data: Vec<Vec<f64>> = schema
        .predictors
        .iter()
        .map(|name| numeric_column(df, name))
        .collect::<Result<_>>()?;

    let ids: Vec<String> = match &schema.id_column {
        Some(col) => string_column(df, col)?,
        None => (0..n_rows).map(|row| row.to_string()).collect(),
    };

    let tag_data: Vec<Vec<String>> = schema
        .tag_columns
        .iter()
        .map(|name| string_column(df, name))
        .collect::<Result<_>>()?;

    let observations = (0..n_rows)
        .map(|row| {
            let mut obs = Observation::new(ids[row].clone(), response[row]);
            for (name, values) in schema.predictors.iter().zip(&predictor_data) {
                obs = obs.with_predictor(name.clone(), values[row]);
            }
            for (name, values) in schema.tag_columns.iter().zip(&tag_data) {
                obs = obs.with_tag(name.clone(), values[row].clone());
            }
            obs
        })
        .collect();

    Dataset::new(schema.response.clone(), schema.predictors.clone(), observations)
}

fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| MccvError::FeatureNotFound(name.to_string()))?;
    let column_f64 = column.cast(&DataType::Float64)?;

    column_f64
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| {
                MccvError::DatasetError(format!(
                    "missing or non-numeric value in column '{}' at row {}",
                    name, row
                ))
            })
        })
        .collect()
}

fn string_column(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let column = df
        .column(name)
        .map_err(|_| MccvError::FeatureNotFound(name.to_string()))?;
    let series = column.as_materialized_series().cast(&DataType::String)?;

    series
        .str()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.map(|s| s.to_string()).ok_or_else(|| {
                MccvError::DatasetError(format!("missing value in column '{}' at row {}", name, row))
            })
        })
        .collect()
}

/// Convert a dataset back into a DataFrame (`id`, predictors, tags, response).
pub fn dataset_to_dataframe(dataset: &Dataset) -> Result<DataFrame> {
    let mut columns: Vec<Column> = Vec::with_capacity(dataset.predictor_names().len() + 2);

    let ids: Vec<String> = dataset.iter().map(|o| o.id().to_string()).collect();
    columns.push(Column::new("id".into(), ids));

    for name in dataset.predictor_names() {
        columns.push(Column::new(name.as_str().into(), dataset.column(name)?));
    }

    let tag_names: Vec<String> = dataset
        .get(0)
        .map(|o| o.tags().keys().cloned().collect())
        .unwrap_or_default();
    for tag in &tag_names {
        let values: Vec<String> = dataset
            .iter()
            .map(|o| o.tag(tag).unwrap_or_default().to_string())
            .collect();
        columns.push(Column::new(tag.as_str().into(), values));
    }

    columns.push(Column::new(dataset.response_name().into(), dataset.responses()));

    Ok(DataFrame::new(columns)?)
}

/// Write a DataFrame to CSV
pub fn save_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let mut file = File::create(path.as_ref())?;

    CsvWriter::new(&mut file)
        .finish(df)
        .map_err(|e| MccvError::DatasetError(e.to_string()))
}
