//! Dense linear algebra helpers for the least-squares solvers

use ndarray::{concatenate, s, Array1, Array2, Axis};

/// Cholesky factor `L` of a symmetric positive-definite matrix (`A = L Lᵀ`).
pub fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    if n != a.ncols() {
        return None;
    }

    let mut l = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }

            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 || !diag.is_finite() {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }
    Some(l)
}

/// Solve `L Lᵀ x = b` given the Cholesky factor.
pub fn cholesky_substitute(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();

    // Forward substitution: L * y = b
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Backward substitution: L^T * x = y
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }
    x
}

/// Solve a symmetric positive-definite system, falling back to Gauss-Jordan.
pub fn solve_spd(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    if a.nrows() != b.len() {
        return None;
    }
    if let Some(l) = cholesky(a) {
        return Some(cholesky_substitute(&l, b));
    }
    matrix_inverse(a).map(|inv| inv.dot(b))
}

/// Inverse of a square matrix by Gauss-Jordan elimination with partial pivoting.
///
/// The smoother needs the full inverse of `BᵀB + λP` for the trace behind its
/// effective degrees of freedom, and [`solve_spd`] falls back to it when the
/// Cholesky factorization breaks down. Pivots below `1e-12` times the largest
/// absolute entry count as singular.
pub fn matrix_inverse(m: &Array2<f64>) -> Option<Array2<f64>> {
    let n = m.nrows();
    if n != m.ncols() {
        return None;
    }
    let scale = m.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if scale == 0.0 || !scale.is_finite() {
        return None;
    }
    let tol = 1e-12 * scale;

    let mut aug = concatenate(Axis(1), &[m.view(), Array2::<f64>::eye(n).view()]).ok()?;

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&a, &b| aug[[a, col]].abs().total_cmp(&aug[[b, col]].abs()))
            .unwrap_or(col);
        if aug[[pivot_row, col]].abs() < tol {
            return None;
        }
        if pivot_row != col {
            for j in 0..2 * n {
                aug.swap([col, j], [pivot_row, j]);
            }
        }

        let pivot = aug[[col, col]];
        aug.row_mut(col).mapv_inplace(|v| v / pivot);
        let pivot_line = aug.row(col).to_owned();

        for (row, mut line) in aug.axis_iter_mut(Axis(0)).enumerate() {
            let factor = line[col];
            if row != col && factor != 0.0 {
                line.scaled_add(-factor, &pivot_line);
            }
        }
    }

    Some(aug.slice(s![.., n..]).to_owned())
}

/// Numerical rank of a square matrix by Gaussian elimination with partial pivoting.
///
/// Pivots smaller than `rel_tol` times the largest absolute entry count as zero.
pub fn numerical_rank(m: &Array2<f64>, rel_tol: f64) -> usize {
    let (n_rows, n_cols) = m.dim();
    let mut a = m.clone();
    let scale = a.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if scale == 0.0 {
        return 0;
    }
    let tol = rel_tol * scale;

    let mut rank = 0;
    for col in 0..n_cols {
        if rank == n_rows {
            break;
        }
        let mut max_row = rank;
        for row in rank + 1..n_rows {
            if a[[row, col]].abs() > a[[max_row, col]].abs() {
                max_row = row;
            }
        }
        if a[[max_row, col]].abs() <= tol {
            continue;
        }
        if max_row != rank {
            for j in 0..n_cols {
                a.swap([rank, j], [max_row, j]);
            }
        }
        for row in rank + 1..n_rows {
            let factor = a[[row, col]] / a[[rank, col]];
            for j in col..n_cols {
                a[[row, j]] -= factor * a[[rank, j]];
            }
        }
        rank += 1;
    }
    rank
}
