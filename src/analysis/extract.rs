//! Physical parameter extraction from a (smoothed) dark IV curve.
//!
//! - Rsh: inverse slope of J(V) around zero bias.
//! - n, J0: slope and intercept of ln J(V) in the exponential regime.
//! - Rs: excess voltage over the ideal diode at high forward bias, per unit J.
//! - n(V): local ideality factor from d(ln J)/dV.
//!
//! Every function works on an immutable series and returns its own error, so
//! one unavailable parameter never hides the others.

use crate::config::{AnalysisConfig, ExponentialRegion};
use crate::error::{DarkIvError, Result};
use crate::series::{CurvePoint, MeasurementSeries};

use super::regression::{fit_line, is_negligible, LinearFit};

/// Outcome of the ln J vs V regression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialFit {
    /// Ideality factor n.
    pub ideality: f64,
    /// Saturation current density J0 (A/cm^2).
    pub saturation_current: f64,
    /// Voltage window the fit was restricted to (inclusive).
    pub window: (f64, f64),
    pub fit: LinearFit,
}

/// Shunt resistance (Ohm cm^2) from a line fit of J against V over
/// `config.rsh_voltage_range`.
pub fn shunt_resistance(series: &MeasurementSeries, config: &AnalysisConfig) -> Result<f64> {
    let (low, high) = config.rsh_voltage_range;
    let (v, j): (Vec<f64>, Vec<f64>) = series
        .points()
        .filter(|&(v, _)| v >= low && v <= high)
        .unzip();

    if v.len() < 2 {
        return Err(DarkIvError::InsufficientRange(format!(
            "shunt fit needs at least 2 points in [{low}, {high}] V, found {}",
            v.len()
        )));
    }

    let fit = fit_line(&v, &j, config.numeric_epsilon)?;
    let j_scale = max_abs(&j);
    if fit.slope_is_negligible(j_scale, config.numeric_epsilon) {
        return Err(DarkIvError::DegenerateFit(format!(
            "shunt conductance is zero within tolerance over [{low}, {high}] V"
        )));
    }

    let rsh = 1.0 / fit.slope;
    tracing::debug!(points = v.len(), rsh, r_squared = fit.r_squared, "shunt fit");
    if rsh < 0.0 {
        tracing::warn!(rsh, "negative shunt resistance");
    }
    Ok(rsh)
}

/// Resolve the exponential-region window, running auto detection if
/// configured.
pub fn exponential_window(
    series: &MeasurementSeries,
    config: &AnalysisConfig,
) -> Result<(f64, f64)> {
    match config.exponential_region {
        ExponentialRegion::Fixed { low, high } => Ok((low, high)),
        ExponentialRegion::Auto {
            min_voltage,
            half_width,
            ideality_bounds: (n_low, n_high),
        } => {
            let curve = LocalIdealityCurve::new(
                series,
                config.thermal_voltage(),
                config.numeric_epsilon,
            );
            let best = curve
                .iter()
                .filter(|p| p.voltage > min_voltage)
                .filter_map(|p| p.value.map(|n| (p.voltage, n)))
                .filter(|&(_, n)| n > n_low && n < n_high)
                .fold(None, |best: Option<(f64, f64)>, (v, n)| match best {
                    Some((_, best_n)) if best_n <= n => best,
                    _ => Some((v, n)),
                });

            match best {
                Some((center, n_min)) => {
                    tracing::debug!(center, n_min, "auto-detected exponential region");
                    Ok((center - half_width, center + half_width))
                }
                None => Err(DarkIvError::InsufficientRange(format!(
                    "no forward point above {min_voltage} V has a local ideality factor \
                     in ({n_low}, {n_high})"
                ))),
            }
        }
    }
}

/// Ideality factor and saturation current density from a line fit of ln J
/// against V inside the exponential region. Points with J <= 0 are skipped.
pub fn ideality_and_saturation(
    series: &MeasurementSeries,
    config: &AnalysisConfig,
) -> Result<ExponentialFit> {
    let (low, high) = exponential_window(series, config)?;
    let (v, ln_j): (Vec<f64>, Vec<f64>) = series
        .points()
        .filter(|&(v, j)| v >= low && v <= high && j > 0.0)
        .map(|(v, j)| (v, j.ln()))
        .unzip();

    if v.len() < 3 {
        return Err(DarkIvError::InsufficientRange(format!(
            "exponential fit needs at least 3 forward points in [{low:.4}, {high:.4}] V, found {}",
            v.len()
        )));
    }

    let fit = fit_line(&v, &ln_j, config.numeric_epsilon)?;
    if fit.slope <= 0.0 || fit.slope_is_negligible(max_abs(&ln_j), config.numeric_epsilon) {
        return Err(DarkIvError::DegenerateFit(format!(
            "non-positive ln(J) slope {} in [{low:.4}, {high:.4}] V",
            fit.slope
        )));
    }

    let ideality = 1.0 / (config.thermal_voltage() * fit.slope);
    let saturation_current = fit.intercept.exp();
    if !(saturation_current.is_finite() && saturation_current > 0.0) {
        return Err(DarkIvError::DegenerateFit(format!(
            "ln(J) intercept {} puts J0 outside the floating-point range",
            fit.intercept
        )));
    }
    tracing::debug!(
        points = v.len(),
        ideality,
        saturation_current,
        r_squared = fit.r_squared,
        "exponential fit"
    );

    Ok(ExponentialFit {
        ideality,
        saturation_current,
        window: (low, high),
        fit,
    })
}

/// Series resistance (Ohm cm^2) from the voltage excess over the ideal diode
/// at V >= `config.high_voltage_threshold`.
///
/// With a single qualifying point Rs = dV / J; with more, Rs is the slope of
/// dV against J. A negative Rs whose voltage drop is negligible against the
/// applied voltage is reported as 0.
pub fn series_resistance(
    series: &MeasurementSeries,
    diode: std::result::Result<&ExponentialFit, &DarkIvError>,
    config: &AnalysisConfig,
) -> Result<f64> {
    let diode = diode.map_err(|e| {
        DarkIvError::DependencyUnavailable(format!("series resistance needs n and J0: {e}"))
    })?;
    if !(diode.saturation_current.is_finite() && diode.saturation_current > 0.0) {
        return Err(DarkIvError::DegenerateFit(format!(
            "saturation current {} cannot anchor the ideal diode",
            diode.saturation_current
        )));
    }
    let threshold = config.high_voltage_threshold;
    let n_vt = diode.ideality * config.thermal_voltage();

    let (j, excess): (Vec<f64>, Vec<f64>) = series
        .points()
        .filter(|&(v, j)| v >= threshold && j > 0.0)
        .map(|(v, j)| (j, v - n_vt * (j / diode.saturation_current).ln()))
        .unzip();

    let rs = match j.len() {
        0 => {
            return Err(DarkIvError::InsufficientRange(format!(
                "no forward points at or above {threshold} V"
            )))
        }
        1 => excess[0] / j[0],
        _ => fit_line(&j, &excess, config.numeric_epsilon)?.slope,
    };

    if !rs.is_finite() {
        return Err(DarkIvError::DegenerateFit(format!(
            "series resistance {rs} above {threshold} V"
        )));
    }
    if rs < 0.0 {
        // A drop below tolerance of the applied voltage is an ideal contact.
        let v_scale = series
            .points()
            .filter(|&(v, _)| v >= threshold)
            .fold(0.0_f64, |m, (v, _)| m.max(v.abs()));
        if is_negligible(rs * max_abs(&j), v_scale, config.numeric_epsilon) {
            return Ok(0.0);
        }
        return Err(DarkIvError::DegenerateFit(format!(
            "negative series resistance {rs} above {threshold} V"
        )));
    }
    tracing::debug!(points = j.len(), rs, "series resistance");
    Ok(rs)
}

/// Local ideality factor n(V) over the forward-bias points (V > 0, J > 0).
///
/// Holds a copy of the forward points; values are computed while iterating,
/// and `iter` can be called any number of times.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalIdealityCurve {
    forward: Vec<(f64, f64)>,
    thermal_voltage: f64,
    epsilon: f64,
}

impl LocalIdealityCurve {
    pub fn new(series: &MeasurementSeries, thermal_voltage: f64, epsilon: f64) -> Self {
        let forward = series
            .points()
            .filter(|&(v, j)| v > 0.0 && j > 0.0)
            .collect();
        Self {
            forward,
            thermal_voltage,
            epsilon,
        }
    }

    pub fn iter(&self) -> LocalIdealityIter<'_> {
        LocalIdealityIter {
            curve: self,
            index: 0,
        }
    }

    /// Number of points the curve yields (defined or not).
    pub fn len(&self) -> usize {
        if self.forward.len() < 2 {
            0
        } else {
            self.forward.len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn point(&self, i: usize) -> CurvePoint {
        let last = self.forward.len() - 1;
        let (a, c) = match i {
            0 => (0, 1),
            i if i == last => (last - 1, last),
            i => (i - 1, i + 1),
        };
        let (va, ja) = self.forward[a];
        let (vc, jc) = self.forward[c];

        let value = if is_negligible(jc - ja, ja.max(jc), self.epsilon) {
            None
        } else {
            let slope = (jc.ln() - ja.ln()) / (vc - va);
            (slope > 0.0).then(|| 1.0 / (self.thermal_voltage * slope))
        };

        CurvePoint {
            voltage: self.forward[i].0,
            value,
        }
    }
}

impl<'a> IntoIterator for &'a LocalIdealityCurve {
    type Item = CurvePoint;
    type IntoIter = LocalIdealityIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a `LocalIdealityCurve`.
#[derive(Debug, Clone)]
pub struct LocalIdealityIter<'a> {
    curve: &'a LocalIdealityCurve,
    index: usize,
}

impl Iterator for LocalIdealityIter<'_> {
    type Item = CurvePoint;

    fn next(&mut self) -> Option<CurvePoint> {
        if self.index >= self.curve.len() {
            return None;
        }
        let p = self.curve.point(self.index);
        self.index += 1;
        Some(p)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.curve.len().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for LocalIdealityIter<'_> {}

fn max_abs(values: &[f64]) -> f64 {
    values.iter().fold(0.0_f64, |m, v| m.max(v.abs()))
}
