//! Differential resistance Rdiff = dV/dJ along the smoothed curve.

use crate::error::{DarkIvError, Result};
use crate::series::{CurvePoint, SmoothedSeries};

use super::regression::is_negligible;

/// Centered-difference dV/dJ at every point (one-sided at both ends).
///
/// Points where the current barely changes are undefined instead of carrying
/// a huge resistance.
pub fn differential_resistance(series: &SmoothedSeries, epsilon: f64) -> Result<Vec<CurvePoint>> {
    let n = series.len();
    if n < 3 {
        return Err(DarkIvError::InsufficientData(format!(
            "differential resistance needs at least 3 points, got {n}"
        )));
    }

    let v = series.voltage();
    let j = series.current_density();

    let curve = (0..n)
        .map(|i| {
            let (a, b) = match i {
                0 => (0, 1),
                i if i == n - 1 => (n - 2, n - 1),
                i => (i - 1, i + 1),
            };
            let dj = j[b] - j[a];
            let scale = j[a].abs().max(j[b].abs());
            let value = (!is_negligible(dj, scale, epsilon)).then(|| (v[b] - v[a]) / dj);
            CurvePoint {
                voltage: v[i],
                value,
            }
        })
        .collect();

    Ok(curve)
}
