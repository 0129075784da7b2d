//! Piecewise-linear regression through an explicit change-point term
//!
//! The hinge predictor `max(0, x - threshold)` is built beforehand with
//! [`crate::data::with_hinge_term`]; this family only fits
//! `y = b0 + b1 x + b2 hinge` and reports the slopes on either side of the
//! change point.

use super::linear_models::{FittedLinear, LinearRegression};
use super::models::{design_matrix, FittedModel, ModelSpec};
use crate::data::Observation;
use crate::error::{MccvError, Result};
use serde::{Deserialize, Serialize};

/// Linear regression on a base predictor plus its hinge term
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PiecewiseLinearSpec {
    name: String,
    base: String,
    hinge: String,
}

impl PiecewiseLinearSpec {
    pub fn new(base: impl Into<String>, hinge: impl Into<String>) -> Self {
        Self {
            name: "piecewise".to_string(),
            base: base.into(),
            hinge: hinge.into(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl ModelSpec for PiecewiseLinearSpec {
    fn name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> &str {
        "piecewise"
    }

    fn predictors(&self) -> Vec<&str> {
        vec![self.base.as_str(), self.hinge.as_str()]
    }

    fn fit(&self, train: &[&Observation]) -> Result<Box<dyn FittedModel>> {
        let predictors = vec![self.base.clone(), self.hinge.clone()];
        let (x, y) = design_matrix(train, &predictors)?;

        if x.column(1).iter().any(|&h| h < 0.0) {
            return Err(MccvError::FitError(format!(
                "hinge term '{}' has negative values",
                self.hinge
            )));
        }
        if x.column(1).iter().all(|&h| h == 0.0) {
            return Err(MccvError::FitError(format!(
                "no training observation lies beyond the change point of '{}'",
                self.base
            )));
        }

        let mut model = LinearRegression::new();
        model.fit(&x, &y)?;
        Ok(Box::new(FittedPiecewise {
            inner: FittedLinear::new(predictors, model),
        }))
    }
}

/// Piecewise-linear model fitted to one training partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedPiecewise {
    inner: FittedLinear,
}

impl FittedPiecewise {
    /// Slope below the change point
    pub fn slope_before(&self) -> f64 {
        self.inner.coefficients().map(|c| c[0]).unwrap_or(0.0)
    }

    /// Slope above the change point
    pub fn slope_after(&self) -> f64 {
        self.inner.coefficients().map(|c| c[0] + c[1]).unwrap_or(0.0)
    }
}

impl FittedModel for FittedPiecewise {
    fn predict(&self, observation: &Observation) -> Result<f64> {
        self.inner.predict(observation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::hinge;

    fn kinked(n: usize) -> Vec<Observation> {
        (0..n)
            .map(|i| {
                let x = i as f64 / (n - 1) as f64;
                let y = 1.0 + 2.0 * x - 5.0 * hinge(x, 0.5);
                Observation::new(i.to_string(), y)
                    .with_predictor("x", x)
                    .with_predictor("x_after", hinge(x, 0.5))
            })
            .collect()
    }

    #[test]
    fn test_recovers_slopes() {
        let obs = kinked(21);
        let rows: Vec<&Observation> = obs.iter().collect();
        let spec = PiecewiseLinearSpec::new("x", "x_after");

        let (x, y) = design_matrix(&rows, &["x", "x_after"]).unwrap();
        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();
        let fitted = FittedPiecewise {
            inner: FittedLinear::new(vec!["x".into(), "x_after".into()], model),
        };
        assert!((fitted.slope_before() - 2.0).abs() < 1e-9);
        assert!((fitted.slope_after() + 3.0).abs() < 1e-9);

        let boxed = spec.fit(&rows).unwrap();
        let probe = Observation::new("p", 0.0)
            .with_predictor("x", 0.8)
            .with_predictor("x_after", hinge(0.8, 0.5));
        let expected = 1.0 + 2.0 * 0.8 - 5.0 * 0.3;
        assert!((boxed.predict(&probe).unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_all_before_change_point_fails() {
        let obs: Vec<Observation> = kinked(21).into_iter().take(8).collect();
        let rows: Vec<&Observation> = obs.iter().collect();
        let err = PiecewiseLinearSpec::new("x", "x_after").fit(&rows).unwrap_err();
        assert!(matches!(err, MccvError::FitError(_)));
    }
}
