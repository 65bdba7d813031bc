//! Dense Gaussian elimination with partial pivoting.
//!
//! The systems solved here are the small normal equations of local polynomial
//! fits (at most a dozen unknowns), so a dense solve is all that is needed.

use crate::error::{DarkIvError, Result};

/// Pivots below this magnitude mark the system as singular.
const PIVOT_TOLERANCE: f64 = 1e-15;

/// Solve the dense square system `a * x = b`.
pub fn solve_dense(a: &[Vec<f64>], b: &[f64]) -> Result<Vec<f64>> {
    let n = a.len();
    if b.len() != n || a.iter().any(|row| row.len() != n) {
        return Err(DarkIvError::DegenerateFit(format!(
            "dimension mismatch: matrix has {} rows, rhs length is {}",
            n,
            b.len()
        )));
    }
    if n == 0 {
        return Ok(Vec::new());
    }

    // Build augmented matrix [A | b]
    let mut aug: Vec<Vec<f64>> = Vec::with_capacity(n);
    for (row, &rhs) in a.iter().zip(b) {
        let mut r = Vec::with_capacity(n + 1);
        r.extend_from_slice(row);
        r.push(rhs);
        aug.push(r);
    }

    // Forward elimination with partial pivoting
    for k in 0..n {
        let mut max_val = aug[k][k].abs();
        let mut max_row = k;
        for (i, row) in aug.iter().enumerate().skip(k + 1) {
            let v = row[k].abs();
            if v > max_val {
                max_val = v;
                max_row = i;
            }
        }

        if max_val < PIVOT_TOLERANCE || !max_val.is_finite() {
            return Err(DarkIvError::DegenerateFit("singular matrix".into()));
        }

        if max_row != k {
            aug.swap(k, max_row);
        }

        let pivot_row = aug[k].clone();
        for row in aug.iter_mut().skip(k + 1) {
            let factor = row[k] / pivot_row[k];
            row[k] = 0.0;
            for j in (k + 1)..=n {
                row[j] -= factor * pivot_row[j];
            }
        }
    }

    // Back substitution
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = aug[i][n];
        for j in (i + 1)..n {
            sum -= aug[i][j] * x[j];
        }
        x[i] = sum / aug[i][i];
    }

    Ok(x)
}
