//! Savitzky-Golay style local polynomial smoothing.
//!
//! Each sample is replaced by the value, at its own voltage, of a least-squares
//! polynomial fitted over `window` consecutive samples. Interior samples use a
//! centered window; samples within `window / 2` of either end reuse the first or
//! last full window and evaluate the polynomial off-center.
//!
//! Fits run in the voltage coordinate, so non-uniform grids are handled and any
//! polynomial of degree <= `order` passes through unchanged.

use crate::config::SmoothingConfig;
use crate::error::{DarkIvError, Result};
use crate::linalg::solve_dense;
use crate::series::{MeasurementSeries, SmoothedSeries};

/// Smooth the current density of `series`.
///
/// Fails with `Config` for an invalid window/order and with `InsufficientData`
/// when the series is shorter than the window.
pub fn smooth(series: &MeasurementSeries, config: &SmoothingConfig) -> Result<SmoothedSeries> {
    config.validate()?;
    let n = series.len();
    if n < config.window {
        return Err(DarkIvError::InsufficientData(format!(
            "smoothing window {} exceeds series length {}",
            config.window, n
        )));
    }

    let _span = tracing::debug_span!("smooth", n, window = config.window, order = config.order)
        .entered();

    let v = series.voltage();
    let j = series.current_density();
    let half = config.window / 2;

    let smoothed = (0..n)
        .map(|i| {
            let start = i.saturating_sub(half).min(n - config.window);
            let end = start + config.window;
            local_fit_at(&v[start..end], &j[start..end], v[i], config.order)
        })
        .collect::<Result<Vec<f64>>>()?;

    Ok(SmoothedSeries::from_source(series, smoothed))
}

/// Value at `x0` of the degree-`order` least-squares polynomial through
/// `(xs, ys)`.
///
/// The abscissa is shifted to `x0` and scaled to [-1, 1] so the normal
/// equations stay well conditioned; the fitted constant term is then the value
/// at `x0`.
fn local_fit_at(xs: &[f64], ys: &[f64], x0: f64, order: usize) -> Result<f64> {
    let scale = xs
        .iter()
        .map(|x| (x - x0).abs())
        .fold(0.0_f64, f64::max);
    if scale == 0.0 {
        return Err(DarkIvError::DegenerateFit(
            "smoothing window has no voltage spread".into(),
        ));
    }

    let terms = order + 1;
    // Power sums of u up to 2 * order fill the Hankel normal matrix.
    let mut power_sums = vec![0.0; 2 * order + 1];
    let mut rhs = vec![0.0; terms];
    for (&x, &y) in xs.iter().zip(ys) {
        let u = (x - x0) / scale;
        let mut p = 1.0;
        for (k, sum) in power_sums.iter_mut().enumerate() {
            *sum += p;
            if k < terms {
                rhs[k] += y * p;
            }
            p *= u;
        }
    }

    let normal: Vec<Vec<f64>> = (0..terms)
        .map(|r| (0..terms).map(|c| power_sums[r + c]).collect())
        .collect();
    let coeffs = solve_dense(&normal, &rhs).map_err(|e| {
        DarkIvError::DegenerateFit(format!("local polynomial fit failed near V = {x0}: {e}"))
    })?;
    Ok(coeffs[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn grid(n: usize, start: f64, step: f64) -> Vec<f64> {
        (0..n).map(|i| start + step * i as f64).collect()
    }

    #[test]
    fn preserves_length_and_grid() {
        let v = grid(25, -0.2, 0.05);
        let j: Vec<f64> = v.iter().map(|x| x.sin()).collect();
        let series = MeasurementSeries::new(v.clone(), j).unwrap();
        let out = smooth(&series, &SmoothingConfig::default()).unwrap();
        assert_eq!(out.len(), 25);
        assert_eq!(out.voltage(), v.as_slice());
    }

    #[test]
    fn constant_input_is_unchanged() {
        let v = grid(20, 0.0, 0.01);
        let series = MeasurementSeries::new(v, vec![3.5e-6; 20]).unwrap();
        let out = smooth(&series, &SmoothingConfig::default()).unwrap();
        for &y in out.current_density() {
            assert_abs_diff_eq!(y, 3.5e-6, epsilon = 1e-18);
        }
    }

    #[test]
    fn cubic_input_is_reproduced_including_edges() {
        let v = grid(30, -0.5, 0.05);
        let j: Vec<f64> = v
            .iter()
            .map(|x| 2.0 - 0.5 * x + 3.0 * x * x - 1.5 * x * x * x)
            .collect();
        let series = MeasurementSeries::new(v, j.clone()).unwrap();
        let out = smooth(&series, &SmoothingConfig { window: 9, order: 3 }).unwrap();
        for (a, b) in out.current_density().iter().zip(&j) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-10);
        }
    }

    #[test]
    fn linear_input_on_non_uniform_grid() {
        let v = vec![0.0, 0.01, 0.03, 0.04, 0.08, 0.09, 0.15, 0.2, 0.21, 0.3];
        let j: Vec<f64> = v.iter().map(|x| 1e-3 * x - 2e-5).collect();
        let series = MeasurementSeries::new(v, j.clone()).unwrap();
        let out = smooth(&series, &SmoothingConfig { window: 5, order: 1 }).unwrap();
        for (a, b) in out.current_density().iter().zip(&j) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-15);
        }
    }

    #[test]
    fn reduces_alternating_noise() {
        let v = grid(41, 0.0, 0.01);
        let clean: Vec<f64> = v.iter().map(|x| 1.0 + x).collect();
        let noisy: Vec<f64> = clean
            .iter()
            .enumerate()
            .map(|(i, y)| if i % 2 == 0 { y + 0.01 } else { y - 0.01 })
            .collect();
        let series = MeasurementSeries::new(v, noisy.clone()).unwrap();
        let out = smooth(&series, &SmoothingConfig::default()).unwrap();

        let err = |ys: &[f64]| -> f64 {
            ys.iter()
                .zip(&clean)
                .skip(5)
                .take(31)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max)
        };
        assert!(err(out.current_density()) < 0.5 * err(&noisy));
    }

    #[test]
    fn window_longer_than_series_fails() {
        let v = grid(8, 0.0, 0.1);
        let series = MeasurementSeries::new(v, vec![1.0; 8]).unwrap();
        let err = smooth(&series, &SmoothingConfig::default()).unwrap_err();
        assert!(matches!(err, DarkIvError::InsufficientData(_)), "got: {err}");
    }

    #[test]
    fn even_window_is_config_error() {
        let v = grid(20, 0.0, 0.1);
        let series = MeasurementSeries::new(v, vec![1.0; 20]).unwrap();
        let err = smooth(&series, &SmoothingConfig { window: 6, order: 2 }).unwrap_err();
        assert!(matches!(err, DarkIvError::Config(_)), "got: {err}");
    }

    #[test]
    fn window_equal_to_length_is_allowed() {
        let v = grid(11, 0.0, 0.1);
        let series = MeasurementSeries::new(v, vec![2.0; 11]).unwrap();
        let out = smooth(&series, &SmoothingConfig::default()).unwrap();
        assert_eq!(out.len(), 11);
    }
}
