//! Derived features and dataset grouping
//!
//! These transforms run before the harness: they produce new datasets and
//! never modify the one they are given.

use super::{Dataset, Observation};
use crate::error::{MccvError, Result};
use std::collections::BTreeMap;

/// Change-point term: `max(0, x - threshold)`
pub fn hinge(x: f64, threshold: f64) -> f64 {
    (x - threshold).max(0.0)
}

/// Return a copy of `dataset` with `name = max(0, source - threshold)` appended
/// to every observation.
pub fn with_hinge_term(dataset: &Dataset, source: &str, threshold: f64, name: &str) -> Result<Dataset> {
    if !dataset.has_predictor(source) {
        return Err(MccvError::FeatureNotFound(source.to_string()));
    }
    if dataset.has_predictor(name) {
        return Err(MccvError::DatasetError(format!(
            "predictor '{}' already exists",
            name
        )));
    }
    if !threshold.is_finite() {
        return Err(MccvError::InvalidParameter {
            name: "threshold".to_string(),
            value: threshold.to_string(),
            reason: "must be finite".to_string(),
        });
    }

    let observations = dataset
        .iter()
        .map(|obs| {
            let x = obs.require(source)?;
            Ok(obs.clone().with_predictor(name, hinge(x, threshold)))
        })
        .collect::<Result<Vec<Observation>>>()?;

    let mut predictors = dataset.predictor_names().to_vec();
    predictors.push(name.to_string());
    dataset.derive(predictors, observations)
}

/// Split a dataset into one dataset per value of a categorical tag.
///
/// Every observation must carry the tag.
pub fn group_by_tag(dataset: &Dataset, tag: &str) -> Result<BTreeMap<String, Dataset>> {
    let mut groups: BTreeMap<String, Vec<Observation>> = BTreeMap::new();

    for obs in dataset {
        let key = obs.tag(tag).ok_or_else(|| {
            MccvError::DatasetError(format!("observation '{}' has no tag '{}'", obs.id(), tag))
        })?;
        groups.entry(key.to_string()).or_default().push(obs.clone());
    }

    groups
        .into_iter()
        .map(|(key, observations)| {
            let group = dataset.derive(dataset.predictor_names().to_vec(), observations)?;
            Ok((key, group))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        let obs = vec![
            Observation::new("a", 1.0).with_predictor("x", 0.2).with_tag("borough", "north"),
            Observation::new("b", 2.0).with_predictor("x", 0.5).with_tag("borough", "south"),
            Observation::new("c", 3.0).with_predictor("x", 0.9).with_tag("borough", "north"),
        ];
        Dataset::new("y", vec!["x".to_string()], obs).unwrap()
    }

    #[test]
    fn test_hinge() {
        assert_eq!(hinge(0.2, 0.5), 0.0);
        assert_eq!(hinge(0.5, 0.5), 0.0);
        assert!((hinge(0.9, 0.5) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_with_hinge_term() {
        let ds = with_hinge_term(&sample(), "x", 0.4, "x_after").unwrap();
        assert_eq!(ds.predictor_names(), &["x".to_string(), "x_after".to_string()]);
        let values = ds.column("x_after").unwrap();
        assert_eq!(values[0], 0.0);
        assert!((values[1] - 0.1).abs() < 1e-12);
        assert!((values[2] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_with_hinge_term_missing_source() {
        let err = with_hinge_term(&sample(), "z", 0.4, "z_after").unwrap_err();
        assert!(matches!(err, MccvError::FeatureNotFound(_)));
    }

    #[test]
    fn test_group_by_tag() {
        let groups = group_by_tag(&sample(), "borough").unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["north"].len(), 2);
        assert_eq!(groups["south"].len(), 1);
        assert_eq!(groups["south"].get(0).unwrap().id(), "b");
    }

    #[test]
    fn test_group_by_missing_tag() {
        assert!(group_by_tag(&sample(), "ward").is_err());
    }
}
