//! Integration test: cross-validation runs end-to-end

use mccv::data::{with_hinge_term, Dataset, Observation, QuadraticBenchmark};
use mccv::error::{MccvError, Result};
use mccv::evaluation::{best_by_median, summarize};
use mccv::training::{
    CrossValidationConfig, CrossValidationRunner, FailureKind, FittedModel, LinearSpec, ModelSpec,
    PiecewiseLinearSpec, SmoothSpec,
};

fn three_families() -> Vec<Box<dyn ModelSpec>> {
    vec![
        Box::new(LinearSpec::new(["x"])),
        Box::new(SmoothSpec::new("x").with_name("smoothed")),
        Box::new(SmoothSpec::new("x").with_name("wiggly").with_basis_size(40).with_lambda(1e-6)),
    ]
}

fn benchmark() -> Dataset {
    QuadraticBenchmark::new(100).with_seed(2024).generate().unwrap()
}

/// Predicts the response of the nearest training point, reproducing training data exactly
struct NearestNeighbourSpec;

#[derive(Debug)]
struct NearestNeighbour {
    points: Vec<(f64, f64)>,
}

impl FittedModel for NearestNeighbour {
    fn predict(&self, observation: &Observation) -> Result<f64> {
        let x = observation.require("x")?;
        self.points
            .iter()
            .min_by(|a, b| (a.0 - x).abs().total_cmp(&(b.0 - x).abs()))
            .map(|p| p.1)
            .ok_or_else(|| MccvError::FitError("no training points".to_string()))
    }
}

impl ModelSpec for NearestNeighbourSpec {
    fn name(&self) -> &str {
        "nearest"
    }

    fn family(&self) -> &str {
        "memorize"
    }

    fn predictors(&self) -> Vec<&str> {
        vec!["x"]
    }

    fn fit(&self, train: &[&Observation]) -> Result<Box<dyn FittedModel>> {
        let points = train
            .iter()
            .map(|o| Ok((o.require("x")?, o.response())))
            .collect::<Result<Vec<_>>>()?;
        Ok(Box::new(NearestNeighbour { points }))
    }
}

#[test]
fn test_record_count() {
    let config = CrossValidationConfig::new(100, 0.8).unwrap().with_seed(1);
    let table = CrossValidationRunner::new(config)
        .run(&benchmark(), &three_families())
        .unwrap();

    assert_eq!(table.len(), 300);
    for name in ["linear", "smoothed", "wiggly"] {
        assert_eq!(table.scores_for(name).len(), 100);
    }

    // partition-major, registration order within a partition
    let first: Vec<(usize, &str)> = table.records()[..3]
        .iter()
        .map(|r| (r.partition_index, r.model_name.as_str()))
        .collect();
    assert_eq!(first, vec![(0, "linear"), (0, "smoothed"), (0, "wiggly")]);
}

#[test]
fn test_smoothed_beats_linear_and_wiggly() {
    let config = CrossValidationConfig::new(100, 0.8).unwrap().with_seed(7);
    let table = CrossValidationRunner::new(config)
        .run(&benchmark(), &three_families())
        .unwrap();

    let summaries = summarize(&table);
    let median = |name: &str| {
        summaries
            .iter()
            .find(|s| s.model_name == name)
            .map(|s| s.median)
            .unwrap()
    };

    assert!(median("smoothed") < median("linear"));
    assert!(median("smoothed") < median("wiggly"));
    assert_eq!(best_by_median(&summaries).unwrap().model_name, "smoothed");
}

#[test]
fn test_seed_reproducible() {
    let data = benchmark();
    let config = CrossValidationConfig::new(20, 0.8).unwrap().with_seed(99);

    let a = CrossValidationRunner::new(config.clone()).run(&data, &three_families()).unwrap();
    let b = CrossValidationRunner::new(config.clone()).run(&data, &three_families()).unwrap();
    assert_eq!(a, b);

    let parallel = CrossValidationRunner::new(config.with_threads(4))
        .run(&data, &three_families())
        .unwrap();
    assert_eq!(a.records(), parallel.records());
}

#[test]
fn test_invalid_configuration() {
    assert!(matches!(
        CrossValidationConfig::new(10, 1.2),
        Err(MccvError::ConfigError(_))
    ));
    assert!(matches!(
        CrossValidationConfig::new(-1, 0.8),
        Err(MccvError::ConfigError(_))
    ));
}

#[test]
fn test_zero_splits_gives_empty_table() {
    let config = CrossValidationConfig::new(0, 0.8).unwrap();
    let table = CrossValidationRunner::new(config).run(&benchmark(), &three_families()).unwrap();
    assert!(table.is_empty());
}

#[test]
fn test_memorizing_model_has_held_out_error() {
    let config = CrossValidationConfig::new(30, 0.8).unwrap().with_seed(5);
    let models: Vec<Box<dyn ModelSpec>> = vec![Box::new(NearestNeighbourSpec)];
    let data = benchmark();
    let table = CrossValidationRunner::new(config).run(&data, &models).unwrap();

    assert!(table.scores_for("nearest").iter().all(|&r| r > 0.0));

    // the same model scored on its own training rows is perfect
    let rows: Vec<&Observation> = data.iter().collect();
    let fitted = NearestNeighbourSpec.fit(&rows).unwrap();
    assert_eq!(mccv::training::scoring::score(fitted.as_ref(), &rows).unwrap(), 0.0);
}

#[test]
fn test_fit_failure_recorded_as_nan() {
    // every row below the change point in most partitions of a short range
    let obs: Vec<Observation> = (0..20)
        .map(|i| {
            let x = i as f64;
            Observation::new(format!("r{}", i), 0.5 * x).with_predictor("x", x)
        })
        .collect();
    let data = Dataset::new("y", vec!["x".to_string()], obs).unwrap();
    let data = with_hinge_term(&data, "x", 18.5, "x_late").unwrap();

    let models: Vec<Box<dyn ModelSpec>> = vec![
        Box::new(LinearSpec::new(["x"])),
        Box::new(PiecewiseLinearSpec::new("x", "x_late")),
    ];
    let config = CrossValidationConfig::new(40, 0.5).unwrap().with_seed(11);
    let table = CrossValidationRunner::new(config).run(&data, &models).unwrap();

    assert_eq!(table.len(), 80);
    assert!(table.scores_for("linear").iter().all(|r| r.is_finite()));

    let failed: Vec<_> = table.failures().collect();
    assert!(!failed.is_empty());
    for record in failed {
        assert_eq!(record.model_name, "piecewise");
        assert!(record.rmse.is_nan());
        assert_eq!(record.failure.as_ref().map(|f| f.kind), Some(FailureKind::Fit));
    }
}

#[test]
fn test_run_grouped() {
    let obs: Vec<Observation> = (0..40)
        .map(|i| {
            let x = i as f64;
            let site = if i < 36 { "large" } else { "small" };
            Observation::new(i.to_string(), 3.0 * x + 1.0)
                .with_predictor("x", x)
                .with_tag("site", site)
        })
        .collect();
    let data = Dataset::new("y", vec!["x".to_string()], obs).unwrap();
    let models: Vec<Box<dyn ModelSpec>> = vec![Box::new(LinearSpec::new(["x"]))];

    // 0.9 of the 4 small rows leaves no test row
    let config = CrossValidationConfig::new(5, 0.9).unwrap().with_seed(3);
    let results = CrossValidationRunner::new(config).run_grouped(&data, "site", &models).unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results["large"].as_ref().unwrap().len(), 5);
    assert!(matches!(results["small"], Err(MccvError::ConfigError(_))));
}
