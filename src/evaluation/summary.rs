//! Per-model RMSE distribution statistics

use crate::training::ResultsTable;
use serde::{Deserialize, Serialize};

/// Distribution of held-out RMSE for one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub model_name: String,
    /// Scored cells
    pub count: usize,
    /// Cells recorded as NaN
    pub failed: usize,
    pub mean: f64,
    /// Sample standard deviation (0 for fewer than two scores)
    pub std_dev: f64,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

impl ModelSummary {
    /// Summarize scores, skipping NaN cells.
    ///
    /// With no valid score every statistic is NaN.
    pub fn from_scores(model_name: impl Into<String>, scores: &[f64]) -> Self {
        let mut values: Vec<f64> = scores.iter().copied().filter(|v| !v.is_nan()).collect();
        values.sort_by(|a, b| a.total_cmp(b));
        let count = values.len();
        let failed = scores.len() - count;

        if values.is_empty() {
            return Self {
                model_name: model_name.into(),
                count,
                failed,
                mean: f64::NAN,
                std_dev: f64::NAN,
                min: f64::NAN,
                q1: f64::NAN,
                median: f64::NAN,
                q3: f64::NAN,
                max: f64::NAN,
            };
        }

        let mean = values.iter().sum::<f64>() / count as f64;
        let std_dev = if count > 1 {
            (values.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / (count - 1) as f64).sqrt()
        } else {
            0.0
        };

        Self {
            model_name: model_name.into(),
            count,
            failed,
            mean,
            std_dev,
            min: values[0],
            q1: quantile(&values, 0.25),
            median: quantile(&values, 0.5),
            q3: quantile(&values, 0.75),
            max: values[count - 1],
        }
    }

    /// Interquartile range
    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }
}

/// Quantile of sorted values by linear interpolation between order statistics
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// One summary per model, in registration order
pub fn summarize(table: &ResultsTable) -> Vec<ModelSummary> {
    table
        .model_names()
        .iter()
        .map(|name| ModelSummary::from_scores(name.clone(), &table.scores_for(name)))
        .collect()
}

/// Summary with the lowest median RMSE; models without scores are skipped
pub fn best_by_median(summaries: &[ModelSummary]) -> Option<&ModelSummary> {
    summaries
        .iter()
        .filter(|s| !s.median.is_nan())
        .min_by(|a, b| a.median.total_cmp(&b.median))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{CrossValidationConfig, ScoreRecord};

    #[test]
    fn test_from_scores() {
        let s = ModelSummary::from_scores("m", &[4.0, 1.0, f64::NAN, 3.0, 2.0]);
        assert_eq!(s.count, 4);
        assert_eq!(s.failed, 1);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 4.0);
        assert!((s.mean - 2.5).abs() < 1e-12);
        assert!((s.median - 2.5).abs() < 1e-12);
        assert!((s.q1 - 1.75).abs() < 1e-12);
        assert!((s.q3 - 3.25).abs() < 1e-12);
        assert!((s.std_dev - (5.0_f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_all_failed() {
        let s = ModelSummary::from_scores("m", &[f64::NAN, f64::NAN]);
        assert_eq!(s.count, 0);
        assert_eq!(s.failed, 2);
        assert!(s.median.is_nan());
        assert!(best_by_median(&[s]).is_none());
    }

    #[test]
    fn test_summarize_table() {
        let table = ResultsTable::new(
            vec!["b".into(), "a".into()],
            CrossValidationConfig::default(),
            vec![
                ScoreRecord::scored(0, "b", 2.0),
                ScoreRecord::scored(0, "a", 1.0),
                ScoreRecord::scored(1, "b", 4.0),
                ScoreRecord::scored(1, "a", 3.0),
            ],
        );
        let summaries = summarize(&table);
        assert_eq!(summaries[0].model_name, "b");
        assert_eq!(summaries[0].median, 3.0);
        assert_eq!(best_by_median(&summaries).map(|s| s.model_name.as_str()), Some("a"));
    }
}
