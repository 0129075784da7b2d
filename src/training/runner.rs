//! Cross-validation runner
//!
//! Draws the partitions, fits every model family to every training half,
//! scores it on the paired test half and assembles the results table.
//!
//! ## State machine
//!
//! ```text
//! Idle -> Splitting -> Scoring -> Aggregated -> Idle
//! ```
//!
//! Fatal errors return the runner to `Idle` without partial results. Local
//! fit/score errors never leave the cell they occur in: the cell is recorded
//! with a NaN score and the failure attached.

use super::config::CrossValidationConfig;
use super::cross_validation::{MonteCarloSplitter, Partition};
use super::models::ModelSpec;
use super::results::{CellFailure, ResultsTable, ScoreRecord};
use super::scoring;
use crate::data::{group_by_tag, Dataset};
use crate::error::{MccvError, Result};
use crate::utils::parallel_map_with_config;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runner lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunnerState {
    Idle,
    Splitting,
    Scoring,
    Aggregated,
}

/// Monte Carlo cross-validation over a set of model families
#[derive(Debug, Clone)]
pub struct CrossValidationRunner {
    config: CrossValidationConfig,
    state: RunnerState,
    transitions: Vec<RunnerState>,
}

impl CrossValidationRunner {
    pub fn new(config: CrossValidationConfig) -> Self {
        Self {
            config,
            state: RunnerState::Idle,
            transitions: Vec::new(),
        }
    }

    pub fn config(&self) -> &CrossValidationConfig {
        &self.config
    }

    /// Current state
    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// States entered during the most recent run, in order
    pub fn transitions(&self) -> &[RunnerState] {
        &self.transitions
    }

    fn transition(&mut self, next: RunnerState) {
        debug!(from = ?self.state, to = ?next, "runner state transition");
        self.state = next;
        self.transitions.push(next);
    }

    /// Run every model on every partition of `dataset`.
    ///
    /// Records are ordered by partition, then by the order of `models`.
    pub fn run(&mut self, dataset: &Dataset, models: &[Box<dyn ModelSpec>]) -> Result<ResultsTable> {
        self.transitions.clear();
        self.config.validate()?;
        check_models(dataset, models)?;

        let result = self.run_checked(dataset, models);
        if result.is_err() && self.state != RunnerState::Idle {
            self.transition(RunnerState::Idle);
        }
        result
    }

    fn run_checked(&mut self, dataset: &Dataset, models: &[Box<dyn ModelSpec>]) -> Result<ResultsTable> {
        let start = Instant::now();
        info!(
            observations = dataset.len(),
            splits = self.config.num_splits,
            models = models.len(),
            train_fraction = self.config.train_fraction,
            "starting cross-validation run"
        );

        self.transition(RunnerState::Splitting);
        let partitions = MonteCarloSplitter::new(&self.config)?.split(dataset)?;

        self.transition(RunnerState::Scoring);
        let cells: Vec<(usize, usize)> = (0..partitions.len())
            .flat_map(|p| (0..models.len()).map(move |m| (p, m)))
            .collect();

        let evaluate = |(p, m): (usize, usize)| evaluate_cell(&partitions[p], models[m].as_ref());
        let outcomes: Vec<Result<ScoreRecord>> = if self.config.parallel {
            parallel_map_with_config(cells, &self.config.parallel_config(), evaluate)?
        } else {
            cells.into_iter().map(evaluate).collect()
        };
        let records = outcomes.into_iter().collect::<Result<Vec<_>>>()?;

        self.transition(RunnerState::Aggregated);
        let model_names = models.iter().map(|m| m.name().to_string()).collect();
        let table = ResultsTable::new(model_names, self.config.clone(), records);

        info!(
            records = table.len(),
            failures = table.failures().count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "cross-validation run finished"
        );
        self.transition(RunnerState::Idle);
        Ok(table)
    }

    /// Run independently within each group of a categorical tag.
    ///
    /// A group too small to split gets its own error; other groups still run.
    pub fn run_grouped(
        &mut self,
        dataset: &Dataset,
        tag: &str,
        models: &[Box<dyn ModelSpec>],
    ) -> Result<BTreeMap<String, Result<ResultsTable>>> {
        check_models(dataset, models)?;
        let groups = group_by_tag(dataset, tag)?;

        let mut results = BTreeMap::new();
        for (group, subset) in groups {
            debug!(tag, group = %group, observations = subset.len(), "running group");
            let outcome = self.run(&subset, models);
            if let Err(e) = &outcome {
                warn!(tag, group = %group, error = %e, "group run failed");
            }
            results.insert(group, outcome);
        }
        Ok(results)
    }
}

/// Fatal pre-checks on the model list
fn check_models(dataset: &Dataset, models: &[Box<dyn ModelSpec>]) -> Result<()> {
    if models.is_empty() {
        return Err(MccvError::ConfigError("no model families registered".to_string()));
    }
    let mut names = HashSet::with_capacity(models.len());
    for model in models {
        model.validate()?;
        if !names.insert(model.name()) {
            return Err(MccvError::ConfigError(format!(
                "duplicate model name '{}'",
                model.name()
            )));
        }
        for predictor in model.predictors() {
            if !dataset.has_predictor(predictor) {
                return Err(MccvError::DatasetError(format!(
                    "model '{}' uses predictor '{}' which the dataset does not declare",
                    model.name(),
                    predictor
                )));
            }
        }
    }
    Ok(())
}

/// Fit on the training half and score on the test half of one partition
fn evaluate_cell(partition: &Partition<'_>, model: &dyn ModelSpec) -> Result<ScoreRecord> {
    let outcome = model
        .fit(&partition.train)
        .and_then(|fitted| scoring::score(fitted.as_ref(), &partition.test));

    match outcome {
        Ok(rmse) => {
            debug!(partition = partition.index, model = model.name(), rmse, "cell scored");
            Ok(ScoreRecord::scored(partition.index, model.name(), rmse))
        }
        Err(e) => {
            let failure = CellFailure::from_error(e)?;
            warn!(
                partition = partition.index,
                model = model.name(),
                kind = %failure.kind,
                "{}",
                failure.message
            );
            Ok(ScoreRecord::failed(partition.index, model.name(), failure))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Observation;
    use crate::training::{FittedModel, LinearSpec, SmoothSpec};

    fn line(n: usize) -> Dataset {
        let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v + 1.0).collect();
        Dataset::from_columns("y", y, vec![("x".to_string(), x)]).unwrap()
    }

    #[derive(Debug)]
    struct NanModel;

    impl FittedModel for NanModel {
        fn predict(&self, _observation: &Observation) -> Result<f64> {
            Ok(f64::NAN)
        }
    }

    struct NanSpec;

    impl ModelSpec for NanSpec {
        fn name(&self) -> &str {
            "nan"
        }
        fn family(&self) -> &str {
            "test"
        }
        fn predictors(&self) -> Vec<&str> {
            vec!["x"]
        }
        fn fit(&self, _train: &[&Observation]) -> Result<Box<dyn FittedModel>> {
            Ok(Box::new(NanModel))
        }
    }

    #[test]
    fn test_state_transitions() {
        let config = CrossValidationConfig::new(3, 0.8).unwrap().with_seed(1);
        let mut runner = CrossValidationRunner::new(config);
        assert_eq!(runner.state(), RunnerState::Idle);

        let models: Vec<Box<dyn ModelSpec>> = vec![Box::new(LinearSpec::new(["x"]))];
        let table = runner.run(&line(20), &models).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(runner.state(), RunnerState::Idle);
        assert_eq!(
            runner.transitions(),
            &[
                RunnerState::Splitting,
                RunnerState::Scoring,
                RunnerState::Aggregated,
                RunnerState::Idle
            ]
        );
    }

    #[test]
    fn test_score_failure_is_local() {
        let config = CrossValidationConfig::new(4, 0.75).unwrap().with_seed(2);
        let models: Vec<Box<dyn ModelSpec>> = vec![Box::new(LinearSpec::new(["x"])), Box::new(NanSpec)];
        let table = CrossValidationRunner::new(config).run(&line(20), &models).unwrap();

        assert_eq!(table.len(), 8);
        assert!(table.scores_for("linear").iter().all(|r| *r < 1e-9));
        assert!(table.scores_for("nan").iter().all(|r| r.is_nan()));
        assert_eq!(table.failures().count(), 4);
    }

    #[test]
    fn test_fatal_prechecks() {
        let config = CrossValidationConfig::new(4, 0.75).unwrap();
        let mut runner = CrossValidationRunner::new(config);
        let data = line(20);

        assert!(matches!(runner.run(&data, &[]), Err(MccvError::ConfigError(_))));

        let dup: Vec<Box<dyn ModelSpec>> = vec![Box::new(LinearSpec::new(["x"])), Box::new(LinearSpec::new(["x"]))];
        assert!(matches!(runner.run(&data, &dup), Err(MccvError::ConfigError(_))));

        let missing: Vec<Box<dyn ModelSpec>> = vec![Box::new(LinearSpec::new(["z"]))];
        assert!(matches!(runner.run(&data, &missing), Err(MccvError::DatasetError(_))));
        assert!(runner.transitions().is_empty());
    }

    #[test]
    fn test_invalid_hyperparameters_rejected_before_splitting() {
        let config = CrossValidationConfig::new(4, 0.75).unwrap().with_seed(1);
        let mut runner = CrossValidationRunner::new(config);
        let models: Vec<Box<dyn ModelSpec>> = vec![
            Box::new(LinearSpec::new(["x"])),
            Box::new(SmoothSpec::new("x").with_lambda(-1.0)),
        ];

        let err = runner.run(&line(20), &models).unwrap_err();
        assert!(matches!(err, MccvError::InvalidParameter { ref name, .. } if name == "lambda"));
        assert!(runner.transitions().is_empty());
        assert_eq!(runner.state(), RunnerState::Idle);
    }

    #[test]
    fn test_split_error_returns_to_idle() {
        let config = CrossValidationConfig::new(4, 0.9).unwrap();
        let mut runner = CrossValidationRunner::new(config);
        let models: Vec<Box<dyn ModelSpec>> = vec![Box::new(LinearSpec::new(["x"]))];

        assert!(matches!(runner.run(&line(3), &models), Err(MccvError::ConfigError(_))));
        assert_eq!(runner.state(), RunnerState::Idle);
    }
}
