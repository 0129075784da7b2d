//! Held-out error metric

use super::models::FittedModel;
use crate::data::Observation;
use crate::error::{MccvError, Result};

/// Root mean squared error between true and predicted responses
pub fn rmse(y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
    if y_true.len() != y_pred.len() {
        return Err(MccvError::ShapeError {
            expected: format!("{} predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }
    if y_true.is_empty() {
        return Err(MccvError::ScoreError("test partition is empty".to_string()));
    }
    if let Some(i) = y_pred.iter().position(|p| !p.is_finite()) {
        return Err(MccvError::ScoreError(format!(
            "non-finite prediction {} at test row {}",
            y_pred[i], i
        )));
    }

    let mse = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / y_true.len() as f64;
    Ok(mse.sqrt())
}

/// Score a fitted model on a held-out partition
pub fn score(fitted: &dyn FittedModel, test: &[&Observation]) -> Result<f64> {
    if test.is_empty() {
        return Err(MccvError::ScoreError("test partition is empty".to_string()));
    }
    let predictions = fitted.predict_all(test).map_err(|e| match e {
        local @ MccvError::ScoreError(_) => local,
        other => MccvError::ScoreError(format!("prediction failed: {}", other)),
    })?;
    let y_true: Vec<f64> = test.iter().map(|obs| obs.response()).collect();
    rmse(&y_true, &predictions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Constant(f64);

    impl FittedModel for Constant {
        fn predict(&self, _observation: &Observation) -> Result<f64> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_rmse() {
        assert_eq!(rmse(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]).unwrap(), 0.0);
        let value = rmse(&[0.0, 0.0], &[3.0, -4.0]).unwrap();
        assert!((value - 12.5_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_rmse_errors() {
        assert!(matches!(rmse(&[], &[]), Err(MccvError::ScoreError(_))));
        assert!(matches!(rmse(&[1.0], &[f64::NAN]), Err(MccvError::ScoreError(_))));
        assert!(matches!(rmse(&[1.0], &[1.0, 2.0]), Err(MccvError::ShapeError { .. })));
    }

    #[test]
    fn test_score_model() {
        let a = Observation::new("a", 1.0);
        let b = Observation::new("b", 3.0);
        assert!((score(&Constant(2.0), &[&a, &b]).unwrap() - 1.0).abs() < 1e-12);
        assert!(matches!(score(&Constant(2.0), &[]), Err(MccvError::ScoreError(_))));
        assert!(matches!(
            score(&Constant(f64::INFINITY), &[&a]),
            Err(MccvError::ScoreError(_))
        ));
    }
}
