//! Analysis engine: smoothing, parameter extraction and derived curves for
//! one sample, plus the batch driver.

pub mod batch;
pub mod differential;
pub mod extract;
pub mod regression;
pub mod smoothing;

use crate::config::AnalysisConfig;
use crate::error::{DarkIvError, ErrorKind, Result};
use crate::series::{CurvePoint, MeasurementSeries, SmoothedSeries};

pub use extract::{ExponentialFit, LocalIdealityCurve};

/// Fewest raw points a sample needs before any analysis is attempted.
pub const MIN_SAMPLE_POINTS: usize = 3;

/// A scalar parameter: either a value or the reason it could not be computed.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    Value(f64),
    Unavailable { kind: ErrorKind, detail: String },
}

impl Extracted {
    pub fn value(&self) -> Option<f64> {
        match self {
            Extracted::Value(v) => Some(*v),
            Extracted::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Extracted::Value(_))
    }

    pub fn from_error(e: &DarkIvError) -> Self {
        Extracted::Unavailable {
            kind: e.kind(),
            detail: e.to_string(),
        }
    }
}

impl From<Result<f64>> for Extracted {
    fn from(result: Result<f64>) -> Self {
        match result {
            Ok(v) => Extracted::Value(v),
            Err(e) => Extracted::from_error(&e),
        }
    }
}

/// The four single-diode parameters of one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedParameters {
    /// Shunt resistance (Ohm cm^2).
    pub rsh: Extracted,
    /// Series resistance (Ohm cm^2).
    pub rs: Extracted,
    /// Saturation current density (A/cm^2).
    pub j0: Extracted,
    /// Ideality factor.
    pub ideality: Extracted,
    /// Diagnostics of the ln J regression, when it succeeded.
    pub exponential_fit: Option<ExponentialFit>,
}

/// Whether the smoother ran for a sample.
#[derive(Debug, Clone, PartialEq)]
pub enum SmoothingOutcome {
    Applied { window: usize, order: usize },
    /// The raw series was analyzed unsmoothed.
    Skipped { reason: String },
}

/// Everything computed for one sample. Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleAnalysis {
    pub raw: MeasurementSeries,
    pub smoothed: SmoothedSeries,
    pub smoothing: SmoothingOutcome,
    pub parameters: ExtractedParameters,
    pub local_ideality: LocalIdealityCurve,
    pub differential_resistance: Vec<CurvePoint>,
}

/// Run the full extraction pipeline on one sample.
///
/// Fails only for sample-level problems: invalid configuration, fewer than
/// `MIN_SAMPLE_POINTS` points, or a series the smoother cannot handle.
/// Individual parameters that cannot be computed are reported as
/// `Extracted::Unavailable`.
pub fn analyze(series: &MeasurementSeries, config: &AnalysisConfig) -> Result<SampleAnalysis> {
    let _span = tracing::info_span!("analyze_sample", points = series.len()).entered();
    config.validate()?;

    if series.len() < MIN_SAMPLE_POINTS {
        return Err(DarkIvError::InsufficientData(format!(
            "sample has {} points, at least {MIN_SAMPLE_POINTS} are required",
            series.len()
        )));
    }

    let (smoothed, smoothing) = match smoothing::smooth(series, &config.smoothing) {
        Ok(s) => (
            s,
            SmoothingOutcome::Applied {
                window: config.smoothing.window,
                order: config.smoothing.order,
            },
        ),
        Err(DarkIvError::InsufficientData(reason)) if config.skip_smoothing_when_short => {
            tracing::warn!(%reason, "smoothing skipped");
            (
                SmoothedSeries::passthrough(series),
                SmoothingOutcome::Skipped { reason },
            )
        }
        Err(e) => return Err(e),
    };

    let differential_resistance =
        differential::differential_resistance(&smoothed, config.numeric_epsilon)?;
    let parameters = extract_parameters(smoothed.as_series(), config);
    let local_ideality = LocalIdealityCurve::new(
        smoothed.as_series(),
        config.thermal_voltage(),
        config.numeric_epsilon,
    );

    Ok(SampleAnalysis {
        raw: series.clone(),
        smoothed,
        smoothing,
        parameters,
        local_ideality,
        differential_resistance,
    })
}

/// Compute Rsh, n, J0 and Rs independently; a failure in one leaves the
/// others intact.
pub fn extract_parameters(
    series: &MeasurementSeries,
    config: &AnalysisConfig,
) -> ExtractedParameters {
    let rsh = extract::shunt_resistance(series, config);
    let exponential = extract::ideality_and_saturation(series, config);
    let rs = extract::series_resistance(series, exponential.as_ref(), config);

    let parameters = ExtractedParameters {
        rsh: rsh.into(),
        rs: rs.into(),
        j0: match &exponential {
            Ok(f) => Extracted::Value(f.saturation_current),
            Err(e) => Extracted::from_error(e),
        },
        ideality: match &exponential {
            Ok(f) => Extracted::Value(f.ideality),
            Err(e) => Extracted::from_error(e),
        },
        exponential_fit: exponential.ok(),
    };

    for (name, p) in [
        ("Rsh", &parameters.rsh),
        ("Rs", &parameters.rs),
        ("J0", &parameters.j0),
        ("n", &parameters.ideality),
    ] {
        if let Extracted::Unavailable { kind, detail } = p {
            tracing::warn!(parameter = name, %kind, %detail, "parameter unavailable");
        }
    }
    parameters
}
