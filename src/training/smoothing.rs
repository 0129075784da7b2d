//! Penalized B-spline smoothing (P-splines)
//!
//! ## Purpose
//!
//! Fits a smooth curve `f(x)` of the response on one predictor by minimizing
//!
//! ```text
//! ||y - B a||² + λ aᵀ Dᵀ D a
//! ```
//!
//! where `B` is a B-spline basis on equally spaced knots over the training
//! range and `D` is a difference operator on adjacent coefficients.
//!
//! ## Key concepts
//!
//! * **Basis size**: number of B-spline functions. More functions allow more
//!   wiggle; the penalty pulls them back.
//! * **Penalty**: fixed `λ`, or chosen per training partition by generalized
//!   cross-validation (GCV) over a log-spaced grid.
//! * **Effective degrees of freedom**: `tr((BᵀB + λP)⁻¹ BᵀB)`.
//!
//! ## Invariants
//!
//! * The training set has at least as many observations as basis functions.
//! * The predictor is not constant on the training set.
//! * Predictions outside the training range use the boundary value.

use super::models::{require_rows, FittedModel, ModelSpec};
use crate::data::Observation;
use crate::error::{MccvError, Result};
use crate::utils::linalg::{cholesky, cholesky_substitute, matrix_inverse};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// How the smoothing penalty is chosen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Penalty {
    /// Fixed penalty weight
    Fixed(f64),
    /// Minimize the GCV score over `n_grid` values between `min` and `max` (log scale)
    Gcv { min: f64, max: f64, n_grid: usize },
}

impl Default for Penalty {
    fn default() -> Self {
        Penalty::Gcv {
            min: 1e-4,
            max: 1e4,
            n_grid: 33,
        }
    }
}

impl Penalty {
    fn candidates(&self) -> Vec<f64> {
        match *self {
            Penalty::Fixed(lambda) => vec![lambda],
            Penalty::Gcv { min, max, n_grid } => {
                if n_grid <= 1 {
                    return vec![min];
                }
                let (lo, hi) = (min.ln(), max.ln());
                (0..n_grid)
                    .map(|i| (lo + (hi - lo) * i as f64 / (n_grid - 1) as f64).exp())
                    .collect()
            }
        }
    }

    fn validate(&self) -> Result<()> {
        let invalid = |value: String, reason: &str| MccvError::InvalidParameter {
            name: "lambda".to_string(),
            value,
            reason: reason.to_string(),
        };
        match *self {
            Penalty::Fixed(lambda) if !(lambda.is_finite() && lambda >= 0.0) => {
                Err(invalid(lambda.to_string(), "must be finite and non-negative"))
            }
            Penalty::Gcv { min, max, n_grid }
                if !(min > 0.0 && max >= min && max.is_finite()) || n_grid == 0 =>
            {
                Err(invalid(format!("gcv[{}, {}; {}]", min, max, n_grid), "invalid GCV grid"))
            }
            _ => Ok(()),
        }
    }
}

/// B-spline basis on equally spaced knots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BSplineBasis {
    knots: Vec<f64>,
    degree: usize,
    n_basis: usize,
    lower: f64,
    upper: f64,
}

impl BSplineBasis {
    /// Build a basis of `n_basis` functions of the given degree over `[lower, upper]`.
    pub fn new(lower: f64, upper: f64, n_basis: usize, degree: usize) -> Result<Self> {
        if n_basis < degree + 1 {
            return Err(MccvError::InvalidParameter {
                name: "basis".to_string(),
                value: n_basis.to_string(),
                reason: format!("must be at least degree + 1 = {}", degree + 1),
            });
        }
        if !(upper > lower) {
            return Err(MccvError::FitError(
                "smoothing predictor has no variation in the training data".to_string(),
            ));
        }

        let segments = n_basis - degree;
        let step = (upper - lower) / segments as f64;
        let knots = (0..n_basis + degree + 1)
            .map(|j| lower + (j as f64 - degree as f64) * step)
            .collect();

        Ok(Self {
            knots,
            degree,
            n_basis,
            lower,
            upper,
        })
    }

    pub fn n_basis(&self) -> usize {
        self.n_basis
    }

    pub fn range(&self) -> (f64, f64) {
        (self.lower, self.upper)
    }

    /// Evaluate all basis functions at `x` (Cox-de Boor recursion).
    pub fn evaluate(&self, x: f64) -> Array1<f64> {
        let x = x.clamp(self.lower, self.upper);
        let t = &self.knots;
        let n_intervals = t.len() - 1;

        // Knot span inside [t_d, t_n); the upper boundary belongs to the last span
        let span = (self.degree..self.n_basis)
            .rev()
            .find(|&j| t[j] <= x)
            .unwrap_or(self.degree);
        let mut b = vec![0.0; n_intervals];
        b[span] = 1.0;

        for p in 1..=self.degree {
            for j in 0..n_intervals - p {
                let left = if t[j + p] > t[j] {
                    (x - t[j]) / (t[j + p] - t[j]) * b[j]
                } else {
                    0.0
                };
                let right = if t[j + p + 1] > t[j + 1] {
                    (t[j + p + 1] - x) / (t[j + p + 1] - t[j + 1]) * b[j + 1]
                } else {
                    0.0
                };
                b[j] = left + right;
            }
        }

        b.truncate(self.n_basis);
        Array1::from(b)
    }

    /// Basis matrix with one row per value
    pub fn design(&self, xs: &[f64]) -> Array2<f64> {
        let mut out = Array2::zeros((xs.len(), self.n_basis));
        for (i, &x) in xs.iter().enumerate() {
            out.row_mut(i).assign(&self.evaluate(x));
        }
        out
    }
}

fn binomial(n: usize, k: usize) -> f64 {
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

/// Penalty matrix `DᵀD` for differences of the given order.
pub fn difference_penalty(n_basis: usize, order: usize) -> Result<Array2<f64>> {
    if order == 0 || order >= n_basis {
        return Err(MccvError::InvalidParameter {
            name: "order".to_string(),
            value: order.to_string(),
            reason: format!("must be between 1 and {}", n_basis.saturating_sub(1)),
        });
    }

    let rows = n_basis - order;
    let mut d = Array2::zeros((rows, n_basis));
    for i in 0..rows {
        for j in 0..=order {
            let sign = if (order - j) % 2 == 0 { 1.0 } else { -1.0 };
            d[[i, i + j]] = sign * binomial(order, j);
        }
    }
    Ok(d.t().dot(&d))
}

/// Penalized fit for one penalty weight
struct PenalizedFit {
    coefficients: Array1<f64>,
    lambda: f64,
    edf: f64,
    gcv: f64,
}

fn penalized_fit(
    btb: &Array2<f64>,
    bty: &Array1<f64>,
    penalty: &Array2<f64>,
    basis_matrix: &Array2<f64>,
    y: &Array1<f64>,
    lambda: f64,
) -> Option<PenalizedFit> {
    let n = y.len() as f64;
    let mut system = btb + &(penalty * lambda);

    // Ridge retry when the penalized system is numerically indefinite
    let l = cholesky(&system).or_else(|| {
        let k = system.nrows();
        let ridge = 1e-8 * system.diag().iter().map(|v| v.abs()).sum::<f64>() / k as f64;
        for i in 0..k {
            system[[i, i]] += ridge;
        }
        cholesky(&system)
    })?;

    let coefficients = cholesky_substitute(&l, bty);
    let residuals = y - &basis_matrix.dot(&coefficients);
    let rss = residuals.mapv(|r| r * r).sum();

    let edf = matrix_inverse(&system).map(|inv| inv.dot(btb).diag().sum())?;
    let denom = n - edf;
    let gcv = if denom > 0.0 {
        n * rss / (denom * denom)
    } else {
        f64::INFINITY
    };

    Some(PenalizedFit {
        coefficients,
        lambda,
        edf,
        gcv,
    })
}

/// Basis smoothing of the response on one predictor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmoothSpec {
    name: String,
    predictor: String,
    n_basis: usize,
    degree: usize,
    penalty_order: usize,
    penalty: Penalty,
}

impl SmoothSpec {
    /// Cubic P-spline with 10 basis functions, second-order penalty and GCV
    pub fn new(predictor: impl Into<String>) -> Self {
        Self {
            name: "smooth".to_string(),
            predictor: predictor.into(),
            n_basis: 10,
            degree: 3,
            penalty_order: 2,
            penalty: Penalty::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_basis_size(mut self, n_basis: usize) -> Self {
        self.n_basis = n_basis;
        self
    }

    pub fn with_degree(mut self, degree: usize) -> Self {
        self.degree = degree;
        self
    }

    pub fn with_penalty_order(mut self, order: usize) -> Self {
        self.penalty_order = order;
        self
    }

    /// Use a fixed smoothing penalty
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.penalty = Penalty::Fixed(lambda);
        self
    }

    pub fn with_penalty(mut self, penalty: Penalty) -> Self {
        self.penalty = penalty;
        self
    }

    pub fn penalty(&self) -> &Penalty {
        &self.penalty
    }
}

impl ModelSpec for SmoothSpec {
    fn name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> &str {
        "smooth"
    }

    fn predictors(&self) -> Vec<&str> {
        vec![self.predictor.as_str()]
    }

    fn validate(&self) -> Result<()> {
        if self.n_basis < self.degree + 1 {
            return Err(MccvError::InvalidParameter {
                name: "basis".to_string(),
                value: self.n_basis.to_string(),
                reason: format!("must be at least degree + 1 = {}", self.degree + 1),
            });
        }
        if self.penalty_order == 0 || self.penalty_order >= self.n_basis {
            return Err(MccvError::InvalidParameter {
                name: "order".to_string(),
                value: self.penalty_order.to_string(),
                reason: format!("must be between 1 and {}", self.n_basis - 1),
            });
        }
        self.penalty.validate()
    }

    fn fit(&self, train: &[&Observation]) -> Result<Box<dyn FittedModel>> {
        self.validate()?;
        require_rows("basis smoothing", train.len(), self.n_basis)?;

        let xs: Vec<f64> = train
            .iter()
            .map(|obs| obs.require(&self.predictor))
            .collect::<Result<_>>()?;
        let y: Array1<f64> = train.iter().map(|obs| obs.response()).collect();

        let lower = xs.iter().copied().fold(f64::INFINITY, f64::min);
        let upper = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let basis = BSplineBasis::new(lower, upper, self.n_basis, self.degree)?;

        let b = basis.design(&xs);
        let btb = b.t().dot(&b);
        let bty = b.t().dot(&y);
        let penalty = difference_penalty(self.n_basis, self.penalty_order)?;

        let best = self
            .penalty
            .candidates()
            .into_iter()
            .filter_map(|lambda| penalized_fit(&btb, &bty, &penalty, &b, &y, lambda))
            .min_by(|p, q| p.gcv.total_cmp(&q.gcv))
            .ok_or_else(|| {
                MccvError::FitError("penalized normal equations are singular".to_string())
            })?;

        Ok(Box::new(FittedSmooth {
            predictor: self.predictor.clone(),
            basis,
            coefficients: best.coefficients,
            lambda: best.lambda,
            edf: best.edf,
        }))
    }
}

/// Smoother fitted to one training partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedSmooth {
    predictor: String,
    basis: BSplineBasis,
    coefficients: Array1<f64>,
    lambda: f64,
    edf: f64,
}

impl FittedSmooth {
    /// Penalty weight used for the fit
    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Effective degrees of freedom
    pub fn edf(&self) -> f64 {
        self.edf
    }

    /// Evaluate the fitted curve at `x`
    pub fn curve(&self, x: f64) -> f64 {
        self.basis.evaluate(x).dot(&self.coefficients)
    }
}

impl FittedModel for FittedSmooth {
    fn predict(&self, observation: &Observation) -> Result<f64> {
        let x = observation.require(&self.predictor)?;
        Ok(self.curve(x))
    }
}
