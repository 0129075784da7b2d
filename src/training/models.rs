//! Model family traits
//!
//! A [`ModelSpec`] describes one candidate family (its name, the predictors it
//! reads and its hyperparameters). Fitting it to a training partition yields a
//! [`FittedModel`] that lives for exactly one (partition, family) cell.

use crate::data::Observation;
use crate::error::{MccvError, Result};
use ndarray::{Array1, Array2};

/// A predictor produced by fitting a model family to one training partition
pub trait FittedModel: Send + Sync + std::fmt::Debug {
    /// Predict the response for a single observation
    fn predict(&self, observation: &Observation) -> Result<f64>;

    /// Predict the response for every observation, in order
    fn predict_all(&self, observations: &[&Observation]) -> Result<Vec<f64>> {
        observations.iter().map(|obs| self.predict(obs)).collect()
    }
}

/// A named, configured model family
pub trait ModelSpec: Send + Sync {
    /// Label used in results (unique within a run)
    fn name(&self) -> &str;

    /// Family identifier, e.g. `linear` or `smooth`
    fn family(&self) -> &str;

    /// Predictor fields this family reads
    fn predictors(&self) -> Vec<&str>;

    /// Check hyperparameters before any data is seen.
    ///
    /// Runs ahead of splitting, so a bad setting aborts the run with
    /// [`MccvError::InvalidParameter`] instead of failing cell by cell.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Fit the family to a training partition.
    ///
    /// Fails with [`MccvError::FitError`] when the training data is degenerate
    /// for the family.
    fn fit(&self, train: &[&Observation]) -> Result<Box<dyn FittedModel>>;
}

impl std::fmt::Debug for dyn ModelSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSpec")
            .field("name", &self.name())
            .field("family", &self.family())
            .finish()
    }
}

/// Extract the named predictors and the response of `rows` into a row-major
/// design matrix and response vector.
pub fn design_matrix<S: AsRef<str>>(rows: &[&Observation], predictors: &[S]) -> Result<(Array2<f64>, Array1<f64>)> {
    let n_rows = rows.len();
    let n_cols = predictors.len();

    let mut x = Array2::zeros((n_rows, n_cols));
    for (r, obs) in rows.iter().enumerate() {
        for (c, name) in predictors.iter().enumerate() {
            x[[r, c]] = obs.require(name.as_ref())?;
        }
    }
    let y: Array1<f64> = rows.iter().map(|obs| obs.response()).collect();

    Ok((x, y))
}

/// Extract the named predictors of one observation
pub fn feature_row<S: AsRef<str>>(observation: &Observation, predictors: &[S]) -> Result<Array1<f64>> {
    predictors
        .iter()
        .map(|name| observation.require(name.as_ref()))
        .collect::<Result<Vec<f64>>>()
        .map(Array1::from)
}

/// Reject training sets that cannot identify `n_params` coefficients
pub(crate) fn require_rows(family: &str, n_rows: usize, n_params: usize) -> Result<()> {
    if n_rows < n_params {
        return Err(MccvError::FitError(format!(
            "{} needs at least {} training observations, got {}",
            family, n_params, n_rows
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_design_matrix() {
        let a = Observation::new("a", 1.0).with_predictor("x", 2.0).with_predictor("z", 3.0);
        let b = Observation::new("b", 4.0).with_predictor("x", 5.0).with_predictor("z", 6.0);
        let (x, y) = design_matrix(&[&a, &b], &["z", "x"]).unwrap();

        assert_eq!(x.dim(), (2, 2));
        assert_eq!(x[[0, 0]], 3.0);
        assert_eq!(x[[1, 1]], 5.0);
        assert_eq!(y.to_vec(), vec![1.0, 4.0]);
    }

    #[test]
    fn test_design_matrix_missing_predictor() {
        let a = Observation::new("a", 1.0).with_predictor("x", 2.0);
        assert!(matches!(
            design_matrix(&[&a], &["w"]),
            Err(MccvError::FeatureNotFound(_))
        ));
    }

    #[test]
    fn test_require_rows() {
        assert!(require_rows("linear", 3, 3).is_ok());
        assert!(matches!(require_rows("linear", 2, 3), Err(MccvError::FitError(_))));
    }
}
