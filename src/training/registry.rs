//! Model family registry
//!
//! Maps family names to factories so model sets can be declared as text,
//! e.g. on the command line or in a run file:
//!
//! ```text
//! linear=linear:predictors=x
//! smoothed=smooth:x=x,basis=10
//! wiggly=smooth:x=x,basis=40,lambda=1e-6
//! broken=piecewise:x=x,hinge=x_after_0.5
//! ```

use super::linear_models::LinearSpec;
use super::models::ModelSpec;
use super::piecewise::PiecewiseLinearSpec;
use super::smoothing::{Penalty, SmoothSpec};
use crate::error::{MccvError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

/// Hyperparameters of one model declaration, as text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelParams {
    values: BTreeMap<String, String>,
    default_predictors: Vec<String>,
}

impl ModelParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Predictors used when a declaration does not name its own
    pub fn with_default_predictors<S: Into<String>>(mut self, predictors: impl IntoIterator<Item = S>) -> Self {
        self.default_predictors = predictors.into_iter().map(Into::into).collect();
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Reject keys the family does not understand
    pub fn check_keys(&self, allowed: &[&str]) -> Result<()> {
        for key in self.values.keys() {
            if !allowed.contains(&key.as_str()) {
                return Err(MccvError::InvalidParameter {
                    name: key.clone(),
                    value: self.values[key].clone(),
                    reason: format!("unknown parameter, expected one of {:?}", allowed),
                });
            }
        }
        Ok(())
    }

    pub fn parse_or<T: FromStr>(&self, key: &str, default: T) -> Result<T> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse::<T>().map_err(|_| MccvError::InvalidParameter {
                name: key.to_string(),
                value: raw.to_string(),
                reason: format!("expected {}", std::any::type_name::<T>()),
            }),
        }
    }

    /// Single predictor from `key`, falling back to the first default
    pub fn predictor(&self, key: &str) -> Result<String> {
        self.get(key)
            .map(str::to_string)
            .or_else(|| self.default_predictors.first().cloned())
            .ok_or_else(|| MccvError::InvalidParameter {
                name: key.to_string(),
                value: String::new(),
                reason: "no predictor given".to_string(),
            })
    }

    /// `+`-separated predictor list from `key`, falling back to the defaults
    pub fn predictor_list(&self, key: &str) -> Result<Vec<String>> {
        let list: Vec<String> = match self.get(key) {
            Some(raw) => raw
                .split('+')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            None => self.default_predictors.clone(),
        };
        if list.is_empty() {
            return Err(MccvError::InvalidParameter {
                name: key.to_string(),
                value: self.get(key).unwrap_or_default().to_string(),
                reason: "no predictors given".to_string(),
            });
        }
        Ok(list)
    }

    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| MccvError::InvalidParameter {
            name: key.to_string(),
            value: String::new(),
            reason: "required".to_string(),
        })
    }
}

/// A textual `label=family:key=value,...` declaration
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDeclaration {
    pub label: String,
    pub family: String,
    pub params: BTreeMap<String, String>,
}

impl FromStr for ModelDeclaration {
    type Err = MccvError;

    fn from_str(s: &str) -> Result<Self> {
        let (head, tail) = match s.split_once(':') {
            Some((head, tail)) => (head.trim(), tail.trim()),
            None => (s.trim(), ""),
        };
        let (label, family) = match head.split_once('=') {
            Some((label, family)) => (label.trim(), family.trim()),
            None => (head, head),
        };
        if label.is_empty() || family.is_empty() {
            return Err(MccvError::ConfigError(format!(
                "model declaration must look like label=family:key=value, got '{}'",
                s
            )));
        }

        let mut params = BTreeMap::new();
        for pair in tail.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| MccvError::InvalidParameter {
                name: pair.to_string(),
                value: String::new(),
                reason: "expected key=value".to_string(),
            })?;
            params.insert(key.trim().to_string(), value.trim().to_string());
        }

        Ok(Self {
            label: label.to_string(),
            family: family.to_string(),
            params,
        })
    }
}

/// Parse `label=family:key=value,key=value`
pub fn parse_model_arg(arg: &str) -> Result<ModelDeclaration> {
    arg.parse()
}

type Factory = Box<dyn Fn(&str, &ModelParams) -> Result<Box<dyn ModelSpec>> + Send + Sync>;

/// A registered family
pub struct FamilyEntry {
    pub description: &'static str,
    /// `(parameter, meaning)` pairs
    pub parameters: Vec<(&'static str, &'static str)>,
    factory: Factory,
}

/// Family name to factory lookup
pub struct ModelRegistry {
    families: BTreeMap<String, FamilyEntry>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ModelRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            families: BTreeMap::new(),
        }
    }

    /// Registry with `linear`, `smooth` and `piecewise`
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register(
            "linear",
            "ordinary least squares with intercept",
            vec![("predictors", "'+'-separated predictor names")],
            |label, params| {
                params.check_keys(&["predictors"])?;
                Ok(Box::new(LinearSpec::new(params.predictor_list("predictors")?).with_name(label)))
            },
        );

        registry.register(
            "smooth",
            "penalized B-spline smoothing on one predictor",
            vec![
                ("x", "predictor to smooth over"),
                ("basis", "number of basis functions (default 10)"),
                ("degree", "spline degree (default 3)"),
                ("order", "difference penalty order (default 2)"),
                ("lambda", "fixed penalty, or 'gcv' (default)"),
            ],
            |label, params| {
                params.check_keys(&["x", "basis", "degree", "order", "lambda"])?;
                let penalty = match params.get("lambda") {
                    None | Some("gcv") => Penalty::default(),
                    Some(_) => Penalty::Fixed(params.parse_or("lambda", 0.0)?),
                };
                let spec = SmoothSpec::new(params.predictor("x")?)
                    .with_name(label)
                    .with_basis_size(params.parse_or("basis", 10)?)
                    .with_degree(params.parse_or("degree", 3)?)
                    .with_penalty_order(params.parse_or("order", 2)?)
                    .with_penalty(penalty);
                spec.validate()?;
                Ok(Box::new(spec))
            },
        );

        registry.register(
            "piecewise",
            "linear regression on a predictor plus its hinge term",
            vec![
                ("x", "base predictor"),
                ("hinge", "derived hinge predictor"),
            ],
            |label, params| {
                params.check_keys(&["x", "hinge"])?;
                let spec = PiecewiseLinearSpec::new(params.predictor("x")?, params.require("hinge")?)
                    .with_name(label);
                Ok(Box::new(spec))
            },
        );

        registry
    }

    /// Register a family factory, replacing any previous one of that name
    pub fn register<F>(
        &mut self,
        family: impl Into<String>,
        description: &'static str,
        parameters: Vec<(&'static str, &'static str)>,
        factory: F,
    ) where
        F: Fn(&str, &ModelParams) -> Result<Box<dyn ModelSpec>> + Send + Sync + 'static,
    {
        self.families.insert(
            family.into(),
            FamilyEntry {
                description,
                parameters,
                factory: Box::new(factory),
            },
        );
    }

    pub fn contains(&self, family: &str) -> bool {
        self.families.contains_key(family)
    }

    /// Registered families in name order
    pub fn families(&self) -> impl Iterator<Item = (&str, &FamilyEntry)> {
        self.families.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Build a spec named `label` from a family and parameters
    pub fn create(&self, family: &str, label: &str, params: &ModelParams) -> Result<Box<dyn ModelSpec>> {
        let entry = self
            .families
            .get(family)
            .ok_or_else(|| MccvError::UnknownModel(family.to_string()))?;
        (entry.factory)(label, params)
    }

    /// Build a spec from a parsed declaration
    pub fn build(&self, declaration: &ModelDeclaration, default_predictors: &[String]) -> Result<Box<dyn ModelSpec>> {
        let params = declaration
            .params
            .iter()
            .fold(ModelParams::new(), |p, (k, v)| p.with(k.clone(), v.clone()))
            .with_default_predictors(default_predictors.iter().cloned());
        self.create(&declaration.family, &declaration.label, &params)
    }

    /// Parse and build every declaration; labels must be unique
    pub fn build_all<S: AsRef<str>>(&self, declarations: &[S], default_predictors: &[String]) -> Result<Vec<Box<dyn ModelSpec>>> {
        let mut labels = BTreeSet::new();
        let mut specs = Vec::with_capacity(declarations.len());
        for raw in declarations {
            let declaration = parse_model_arg(raw.as_ref())?;
            if !labels.insert(declaration.label.clone()) {
                return Err(MccvError::ConfigError(format!(
                    "model label '{}' is declared more than once",
                    declaration.label
                )));
            }
            specs.push(self.build(&declaration, default_predictors)?);
        }
        Ok(specs)
    }
}
