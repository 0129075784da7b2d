//! Ordinary least squares regression

use super::models::{design_matrix, feature_row, require_rows, FittedModel, ModelSpec};
use crate::data::Observation;
use crate::error::{MccvError, Result};
use crate::utils::linalg::{numerical_rank, solve_spd};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Relative pivot tolerance below which predictors count as collinear
const COLLINEARITY_TOL: f64 = 1e-10;

/// Linear regression estimator on a dense design matrix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    /// Fitted coefficients (weights)
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept (bias)
    pub intercept: Option<f64>,
    /// Whether to fit intercept
    pub fit_intercept: bool,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearRegression {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            fit_intercept: true,
        }
    }

    /// Enable/disable fitting intercept
    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    /// Fit by solving the normal equations of the centered data.
    ///
    /// Fails with [`MccvError::FitError`] when there are not enough rows, a
    /// predictor is constant, or the predictors are perfectly collinear.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(MccvError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        let n_params = n_features + usize::from(self.fit_intercept);
        require_rows("linear regression", n_samples, n_params.max(1))?;
        let raw_ss = x.map_axis(Axis(0), |col| col.dot(&col));

        let (x_work, y_work, x_mean, y_mean) = if self.fit_intercept {
            let x_mean = x
                .mean_axis(Axis(0))
                .unwrap_or_else(|| Array1::zeros(n_features));
            let y_mean = y.mean().unwrap_or(0.0);
            let x_centered = x - &x_mean.clone().insert_axis(Axis(0));
            let y_centered = y - y_mean;
            (x_centered, y_centered, x_mean, y_mean)
        } else {
            (x.clone(), y.clone(), Array1::zeros(n_features), 0.0)
        };

        let coefficients = if n_features == 0 {
            Array1::zeros(0)
        } else {
            let xtx = x_work.t().dot(&x_work);
            check_identifiable(&xtx, &raw_ss)?;
            let xty = x_work.t().dot(&y_work);
            solve_spd(&xtx, &xty).ok_or_else(|| {
                MccvError::FitError("normal equations are singular".to_string())
            })?
        };

        let intercept = if self.fit_intercept {
            y_mean - coefficients.dot(&x_mean)
        } else {
            0.0
        };

        self.coefficients = Some(coefficients);
        self.intercept = Some(intercept);
        Ok(self)
    }

    /// Predict one row of predictor values
    pub fn predict_row(&self, row: &Array1<f64>) -> Result<f64> {
        let coefficients = self.coefficients.as_ref().ok_or_else(|| {
            MccvError::FitError("linear regression has not been fitted".to_string())
        })?;
        Ok(coefficients.dot(row) + self.intercept.unwrap_or(0.0))
    }

    /// Make predictions for every row
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or_else(|| {
            MccvError::FitError("linear regression has not been fitted".to_string())
        })?;
        Ok(x.dot(coefficients) + self.intercept.unwrap_or(0.0))
    }
}

/// Reject constant or perfectly collinear predictors.
///
/// A predictor counts as constant when its centered sum of squares is
/// negligible next to its own raw sum of squares `raw_ss[j]`. The Gram matrix
/// is then rescaled to unit diagonal, so neither test depends on the units of
/// any other predictor.
fn check_identifiable(xtx: &Array2<f64>, raw_ss: &Array1<f64>) -> Result<()> {
    let p = xtx.nrows();
    let norms: Vec<f64> = xtx.diag().iter().map(|v| v.max(0.0).sqrt()).collect();

    for (j, &norm) in norms.iter().enumerate() {
        if norm == 0.0 || norm * norm <= COLLINEARITY_TOL * raw_ss[j] {
            return Err(MccvError::FitError(format!(
                "predictor {} has no variation in the training data",
                j
            )));
        }
    }

    let scaled = Array2::from_shape_fn((p, p), |(i, j)| xtx[[i, j]] / (norms[i] * norms[j]));
    let rank = numerical_rank(&scaled, COLLINEARITY_TOL);
    if rank < p {
        return Err(MccvError::FitError(format!(
            "predictors are collinear (rank {} of {})",
            rank, p
        )));
    }
    Ok(())
}

/// Plain linear regression on declared predictors, no shrinkage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearSpec {
    name: String,
    predictors: Vec<String>,
}

impl LinearSpec {
    pub fn new<S: Into<String>>(predictors: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: "linear".to_string(),
            predictors: predictors.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl ModelSpec for LinearSpec {
    fn name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> &str {
        "linear"
    }

    fn predictors(&self) -> Vec<&str> {
        self.predictors.iter().map(|s| s.as_str()).collect()
    }

    fn fit(&self, train: &[&Observation]) -> Result<Box<dyn FittedModel>> {
        let (x, y) = design_matrix(train, &self.predictors)?;
        let mut model = LinearRegression::new();
        model.fit(&x, &y)?;
        Ok(Box::new(FittedLinear {
            predictors: self.predictors.clone(),
            model,
        }))
    }
}

/// Linear regression fitted to one training partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedLinear {
    predictors: Vec<String>,
    model: LinearRegression,
}

impl FittedLinear {
    pub(crate) fn new(predictors: Vec<String>, model: LinearRegression) -> Self {
        Self { predictors, model }
    }

    /// Coefficients in predictor order
    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.model.coefficients.as_ref()
    }

    pub fn intercept(&self) -> f64 {
        self.model.intercept.unwrap_or(0.0)
    }
}

impl FittedModel for FittedLinear {
    fn predict(&self, observation: &Observation) -> Result<f64> {
        let row = feature_row(observation, &self.predictors)?;
        self.model.predict_row(&row)
    }
}
