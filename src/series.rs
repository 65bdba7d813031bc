//! Measurement series data model.
//!
//! The loader produces a `MeasurementSeries`; the smoother produces a
//! `SmoothedSeries` on the same voltage grid. Both are immutable once built.

use crate::error::{DarkIvError, Result};

/// Voltage/current-density samples sorted by strictly increasing voltage.
///
/// Voltage in volts, current density in A/cm^2.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementSeries {
    voltage: Vec<f64>,
    current_density: Vec<f64>,
}

impl MeasurementSeries {
    /// Build a series, checking equal lengths, finite values and strictly
    /// increasing voltage.
    pub fn new(voltage: Vec<f64>, current_density: Vec<f64>) -> Result<Self> {
        if voltage.len() != current_density.len() {
            return Err(DarkIvError::Parse(format!(
                "length mismatch: {} voltages, {} current densities",
                voltage.len(),
                current_density.len()
            )));
        }
        if let Some(i) = voltage
            .iter()
            .zip(&current_density)
            .position(|(v, j)| !v.is_finite() || !j.is_finite())
        {
            return Err(DarkIvError::Parse(format!("non-finite value at index {i}")));
        }
        if let Some(i) = voltage.windows(2).position(|w| w[1] <= w[0]) {
            return Err(DarkIvError::Parse(format!(
                "voltage not strictly increasing at index {}: {} then {}",
                i + 1,
                voltage[i],
                voltage[i + 1]
            )));
        }
        Ok(Self {
            voltage,
            current_density,
        })
    }

    /// Build a series from unordered (V, J) pairs: sorts by voltage and
    /// averages the current density of duplicate voltages.
    pub fn from_unsorted(mut pairs: Vec<(f64, f64)>) -> Result<Self> {
        if pairs.iter().any(|(v, j)| !v.is_finite() || !j.is_finite()) {
            return Err(DarkIvError::Parse("non-finite value in input pairs".into()));
        }
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut voltage: Vec<f64> = Vec::with_capacity(pairs.len());
        let mut current_density: Vec<f64> = Vec::with_capacity(pairs.len());
        let mut run_len = 0usize;
        for (v, j) in pairs {
            match voltage.last() {
                Some(&last) if last == v => {
                    // Running mean over the duplicate run
                    run_len += 1;
                    if let Some(m) = current_density.last_mut() {
                        *m += (j - *m) / run_len as f64;
                    }
                }
                _ => {
                    voltage.push(v);
                    current_density.push(j);
                    run_len = 1;
                }
            }
        }
        Self::new(voltage, current_density)
    }

    pub fn voltage(&self) -> &[f64] {
        &self.voltage
    }

    pub fn current_density(&self) -> &[f64] {
        &self.current_density
    }

    pub fn len(&self) -> usize {
        self.voltage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voltage.is_empty()
    }

    /// Iterate over (V, J) pairs.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.voltage
            .iter()
            .copied()
            .zip(self.current_density.iter().copied())
    }

    /// Same voltage grid with every current density multiplied by `k`.
    pub fn scaled(&self, k: f64) -> Result<Self> {
        Self::new(
            self.voltage.clone(),
            self.current_density.iter().map(|j| j * k).collect(),
        )
    }
}

/// A series whose current density was replaced by a locally smoothed estimate.
///
/// Shares the voltage grid of its source, so indices line up with the raw
/// series.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothedSeries {
    series: MeasurementSeries,
}

impl SmoothedSeries {
    /// Pair smoothed values with the source grid.
    pub(crate) fn from_source(source: &MeasurementSeries, smoothed: Vec<f64>) -> Self {
        debug_assert_eq!(source.len(), smoothed.len());
        Self {
            series: MeasurementSeries {
                voltage: source.voltage.clone(),
                current_density: smoothed,
            },
        }
    }

    /// Wrap an unsmoothed series when smoothing was skipped.
    pub(crate) fn passthrough(source: &MeasurementSeries) -> Self {
        Self {
            series: source.clone(),
        }
    }

    pub fn as_series(&self) -> &MeasurementSeries {
        &self.series
    }

    pub fn voltage(&self) -> &[f64] {
        self.series.voltage()
    }

    pub fn current_density(&self) -> &[f64] {
        self.series.current_density()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// One entry of a derived curve. `value` is `None` where the quantity is
/// undefined at that voltage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePoint {
    pub voltage: f64,
    pub value: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_monotonic_voltage() {
        let err = MeasurementSeries::new(vec![0.0, 0.2, 0.1], vec![1.0, 2.0, 3.0]).unwrap_err();
        assert!(err.to_string().contains("strictly increasing"), "got: {err}");
    }

    #[test]
    fn rejects_length_mismatch() {
        assert!(MeasurementSeries::new(vec![0.0, 0.1], vec![1.0]).is_err());
    }

    #[test]
    fn rejects_nan() {
        assert!(MeasurementSeries::new(vec![0.0, 0.1], vec![1.0, f64::NAN]).is_err());
    }

    #[test]
    fn from_unsorted_sorts_and_averages_duplicates() {
        let s = MeasurementSeries::from_unsorted(vec![
            (0.2, 4.0),
            (0.0, 1.0),
            (0.1, 2.0),
            (0.1, 4.0),
            (0.1, 6.0),
        ])
        .unwrap();
        assert_eq!(s.voltage(), &[0.0, 0.1, 0.2]);
        assert_eq!(s.current_density(), &[1.0, 4.0, 4.0]);
    }

    #[test]
    fn scaled_keeps_grid() {
        let s = MeasurementSeries::new(vec![0.0, 0.1], vec![1.0, -2.0]).unwrap();
        let k = s.scaled(3.0).unwrap();
        assert_eq!(k.voltage(), s.voltage());
        assert_eq!(k.current_density(), &[3.0, -6.0]);
    }
}
