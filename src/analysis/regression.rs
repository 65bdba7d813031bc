//! Ordinary least squares line fit shared by every extraction step.

use crate::error::{DarkIvError, Result};

/// Result of fitting `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination. 1.0 when `y` is constant.
    pub r_squared: f64,
    pub n_points: usize,
    /// max(x) - min(x) over the fitted points.
    pub x_span: f64,
}

impl LinearFit {
    /// True when the line changes by a negligible amount across the fitted
    /// span compared to `y_scale`.
    pub fn slope_is_negligible(&self, y_scale: f64, epsilon: f64) -> bool {
        is_negligible(self.slope * self.x_span, y_scale, epsilon)
    }
}

/// Relative "is zero" test used for every tolerance decision in the engine.
pub fn is_negligible(delta: f64, scale: f64, epsilon: f64) -> bool {
    delta.abs() <= epsilon * scale.abs()
}

/// Fit a straight line through `(x, y)` by ordinary least squares.
///
/// Fails with `InsufficientData` for fewer than two points and with
/// `DegenerateFit` when the `x` values are not distinct (relative spread below
/// `epsilon`).
pub fn fit_line(x: &[f64], y: &[f64], epsilon: f64) -> Result<LinearFit> {
    if x.len() != y.len() {
        return Err(DarkIvError::InsufficientData(format!(
            "fit needs paired samples, got {} x and {} y",
            x.len(),
            y.len()
        )));
    }
    let n = x.len();
    if n < 2 {
        return Err(DarkIvError::InsufficientData(format!(
            "line fit needs at least 2 points, got {n}"
        )));
    }

    let nf = n as f64;
    let mean_x = x.iter().sum::<f64>() / nf;
    let mean_y = y.iter().sum::<f64>() / nf;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    let mut syy = 0.0;
    let mut sum_x2 = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
        sum_x2 += xi * xi;
    }

    if is_negligible(sxx, sum_x2, epsilon) {
        return Err(DarkIvError::DegenerateFit(format!(
            "x values are not distinct across {n} points"
        )));
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    let r_squared = if syy > 0.0 {
        (sxy * sxy) / (sxx * syy)
    } else {
        1.0
    };

    let (x_min, x_max) = x
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

    Ok(LinearFit {
        slope,
        intercept,
        r_squared,
        n_points: n,
        x_span: x_max - x_min,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn exact_line() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [1.0, 3.0, 5.0, 7.0];
        let fit = fit_line(&x, &y, 1e-9).unwrap();
        assert_abs_diff_eq!(fit.slope, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(fit.intercept, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(fit.r_squared, 1.0, epsilon = 1e-12);
        assert_eq!(fit.n_points, 4);
        assert_abs_diff_eq!(fit.x_span, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn noisy_line_least_squares() {
        // Residuals +1, -1, -1, +1 around y = x cancel in the slope
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [1.0, 0.0, 1.0, 4.0];
        let fit = fit_line(&x, &y, 1e-9).unwrap();
        assert_abs_diff_eq!(fit.slope, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(fit.intercept, 0.0, epsilon = 1e-12);
        assert!(fit.r_squared < 1.0);
    }

    #[test]
    fn single_point_is_insufficient() {
        let err = fit_line(&[1.0], &[2.0], 1e-9).unwrap_err();
        assert!(matches!(err, DarkIvError::InsufficientData(_)));
    }

    #[test]
    fn repeated_x_is_degenerate() {
        let err = fit_line(&[0.3, 0.3, 0.3], &[1.0, 2.0, 3.0], 1e-9).unwrap_err();
        assert!(matches!(err, DarkIvError::DegenerateFit(_)));
    }

    #[test]
    fn flat_line_has_negligible_slope() {
        let fit = fit_line(&[0.0, 0.1, 0.2], &[5.0, 5.0, 5.0], 1e-9).unwrap();
        assert_eq!(fit.slope, 0.0);
        assert_eq!(fit.r_squared, 1.0);
        assert!(fit.slope_is_negligible(5.0, 1e-9));
    }

    #[test]
    fn negligible_is_relative() {
        assert!(is_negligible(1e-20, 1e-10, 1e-9));
        assert!(!is_negligible(1e-12, 1e-10, 1e-9));
        assert!(is_negligible(0.0, 0.0, 1e-9));
    }
}
