//! Dataset representation
//!
//! A [`Dataset`] is an ordered, read-only collection of [`Observation`]s with
//! unique identifiers. Every observation carries the same set of named numeric
//! predictors plus a numeric response; categorical columns are kept as string
//! tags and only serve grouping.

pub mod features;
pub mod loader;
pub mod synthetic;

pub use features::{group_by_tag, hinge, with_hinge_term};
pub use loader::{DataLoader, DatasetSchema};
pub use synthetic::QuadraticBenchmark;

use crate::error::{MccvError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// A single labeled observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    id: String,
    predictors: BTreeMap<String, f64>,
    response: f64,
    tags: BTreeMap<String, String>,
}

impl Observation {
    /// Create an observation with no predictors
    pub fn new(id: impl Into<String>, response: f64) -> Self {
        Self {
            id: id.into(),
            predictors: BTreeMap::new(),
            response,
            tags: BTreeMap::new(),
        }
    }

    /// Add a numeric predictor
    pub fn with_predictor(mut self, name: impl Into<String>, value: f64) -> Self {
        self.predictors.insert(name.into(), value);
        self
    }

    /// Add a categorical tag
    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(name.into(), value.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn response(&self) -> f64 {
        self.response
    }

    pub fn predictor(&self, name: &str) -> Option<f64> {
        self.predictors.get(name).copied()
    }

    /// Look up a predictor, failing when it is absent
    pub fn require(&self, name: &str) -> Result<f64> {
        self.predictor(name)
            .ok_or_else(|| MccvError::FeatureNotFound(format!("{} (observation {})", name, self.id)))
    }

    pub fn predictors(&self) -> &BTreeMap<String, f64> {
        &self.predictors
    }

    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(|s| s.as_str())
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }
}

/// Immutable collection of observations with unique identifiers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    response_name: String,
    predictor_names: Vec<String>,
    observations: Vec<Observation>,
}

impl Dataset {
    /// Build a dataset, validating identifiers and declared predictors.
    pub fn new(
        response_name: impl Into<String>,
        predictor_names: Vec<String>,
        observations: Vec<Observation>,
    ) -> Result<Self> {
        let dataset = Self {
            response_name: response_name.into(),
            predictor_names,
            observations,
        };
        dataset.validate()?;
        Ok(dataset)
    }

    /// Build a dataset from column vectors. Identifiers are the row numbers.
    pub fn from_columns(
        response_name: impl Into<String>,
        response: Vec<f64>,
        columns: Vec<(String, Vec<f64>)>,
    ) -> Result<Self> {
        let n = response.len();
        for (name, values) in &columns {
            if values.len() != n {
                return Err(MccvError::ShapeError {
                    expected: format!("{} length = {}", name, n),
                    actual: format!("{} length = {}", name, values.len()),
                });
            }
        }

        let observations = response
            .iter()
            .enumerate()
            .map(|(row, &y)| {
                columns.iter().fold(Observation::new(row.to_string(), y), |obs, (name, values)| {
                    obs.with_predictor(name.clone(), values[row])
                })
            })
            .collect();

        let predictor_names = columns.into_iter().map(|(name, _)| name).collect();
        Self::new(response_name, predictor_names, observations)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.observations.len());
        for obs in &self.observations {
            if !seen.insert(obs.id.as_str()) {
                return Err(MccvError::DatasetError(format!(
                    "duplicate observation identifier '{}'",
                    obs.id
                )));
            }
            if !obs.response.is_finite() {
                return Err(MccvError::DatasetError(format!(
                    "non-finite response in observation '{}'",
                    obs.id
                )));
            }
            for name in &self.predictor_names {
                match obs.predictor(name) {
                    Some(v) if v.is_finite() => {}
                    Some(_) => {
                        return Err(MccvError::DatasetError(format!(
                            "non-finite value for '{}' in observation '{}'",
                            name, obs.id
                        )))
                    }
                    None => {
                        return Err(MccvError::DatasetError(format!(
                            "observation '{}' is missing predictor '{}'",
                            obs.id, name
                        )))
                    }
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn get(&self, index: usize) -> Option<&Observation> {
        self.observations.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Observation> {
        self.observations.iter()
    }

    pub fn response_name(&self) -> &str {
        &self.response_name
    }

    pub fn predictor_names(&self) -> &[String] {
        &self.predictor_names
    }

    pub fn has_predictor(&self, name: &str) -> bool {
        self.predictor_names.iter().any(|p| p == name)
    }

    /// Response values in dataset order
    pub fn responses(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.response).collect()
    }

    /// Values of one predictor in dataset order
    pub fn column(&self, name: &str) -> Result<Vec<f64>> {
        if !self.has_predictor(name) {
            return Err(MccvError::FeatureNotFound(name.to_string()));
        }
        self.observations.iter().map(|o| o.require(name)).collect()
    }

    /// Derive a dataset with the same response but new observations and predictor list.
    pub(crate) fn derive(&self, predictor_names: Vec<String>, observations: Vec<Observation>) -> Result<Self> {
        Self::new(self.response_name.clone(), predictor_names, observations)
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Observation;
    type IntoIter = std::slice::Iter<'a, Observation>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
