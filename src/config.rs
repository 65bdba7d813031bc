//! Analysis configuration.
//!
//! Every knob of the extraction engine lives here, including the physical
//! constants, so analyses at non-standard temperatures are reproducible.
//! Configurations deserialize from TOML; missing keys take their defaults.
//!
//! ```toml
//! area = 0.25
//! temperature_k = 300.0
//! rsh_voltage_range = [-0.1, 0.1]
//!
//! [smoothing]
//! window = 9
//! order = 2
//!
//! [exponential_region]
//! mode = "fixed"
//! low = 0.35
//! high = 0.55
//! ```

use serde_derive::Deserialize;
use std::path::Path;

use crate::error::{DarkIvError, Result};

/// Boltzmann constant (J/K).
pub const BOLTZMANN: f64 = 1.380649e-23;
/// Elementary charge (C).
pub const ELEMENTARY_CHARGE: f64 = 1.602176634e-19;
/// Standard test condition temperature (K).
pub const T_STC: f64 = 298.15;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct PhysicalConstants {
    pub boltzmann: f64,
    pub elementary_charge: f64,
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        Self {
            boltzmann: BOLTZMANN,
            elementary_charge: ELEMENTARY_CHARGE,
        }
    }
}

impl PhysicalConstants {
    /// Thermal voltage k_B T / q in volts.
    pub fn thermal_voltage(&self, temperature_k: f64) -> f64 {
        self.boltzmann * temperature_k / self.elementary_charge
    }
}

/// Local polynomial smoothing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Number of samples per local fit. Odd, at least 3.
    pub window: usize,
    /// Polynomial order, below `window`.
    pub order: usize,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self { window: 11, order: 3 }
    }
}

impl SmoothingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window < 3 {
            return Err(DarkIvError::Config(format!(
                "smoothing window must be at least 3, got {}",
                self.window
            )));
        }
        if self.window % 2 == 0 {
            return Err(DarkIvError::Config(format!(
                "smoothing window must be odd, got {}",
                self.window
            )));
        }
        if self.order >= self.window {
            return Err(DarkIvError::Config(format!(
                "polynomial order {} must be below window {}",
                self.order, self.window
            )));
        }
        Ok(())
    }
}

/// How the diode (exponential) regime of the forward curve is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ExponentialRegion {
    /// Fixed inclusive voltage window.
    Fixed { low: f64, high: f64 },
    /// Center a window of +/- `half_width` on the forward point with the
    /// smallest plausible local ideality factor above `min_voltage`.
    Auto {
        #[serde(default = "default_auto_min_voltage")]
        min_voltage: f64,
        #[serde(default = "default_auto_half_width")]
        half_width: f64,
        #[serde(default = "default_auto_ideality_bounds")]
        ideality_bounds: (f64, f64),
    },
}

fn default_auto_min_voltage() -> f64 {
    0.1
}

fn default_auto_half_width() -> f64 {
    0.05
}

fn default_auto_ideality_bounds() -> (f64, f64) {
    (0.5, 5.0)
}

impl Default for ExponentialRegion {
    fn default() -> Self {
        ExponentialRegion::Auto {
            min_voltage: default_auto_min_voltage(),
            half_width: default_auto_half_width(),
            ideality_bounds: default_auto_ideality_bounds(),
        }
    }
}

/// Preprocessing switches applied by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Subtract the current measured closest to 0 V.
    pub zero_offset_correction: bool,
    /// Mirror the curve so the largest current sits in the first quadrant.
    pub polarity_correction: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            zero_offset_correction: true,
            polarity_correction: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Device area in cm^2.
    pub area: f64,
    pub smoothing: SmoothingConfig,
    /// Analyze the raw series when it is shorter than the smoothing window,
    /// instead of failing the sample.
    pub skip_smoothing_when_short: bool,
    /// Inclusive voltage window for the shunt fit.
    pub rsh_voltage_range: (f64, f64),
    pub exponential_region: ExponentialRegion,
    /// Lowest voltage used for the series-resistance estimate.
    pub high_voltage_threshold: f64,
    pub temperature_k: f64,
    pub constants: PhysicalConstants,
    /// Relative tolerance for every "is zero" decision.
    pub numeric_epsilon: f64,
    pub loader: LoaderConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            area: 1.0,
            smoothing: SmoothingConfig::default(),
            skip_smoothing_when_short: false,
            rsh_voltage_range: (-0.2, 0.2),
            exponential_region: ExponentialRegion::default(),
            high_voltage_threshold: 0.6,
            temperature_k: T_STC,
            constants: PhysicalConstants::default(),
            numeric_epsilon: 1e-9,
            loader: LoaderConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Parse a TOML configuration and validate it.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: AnalysisConfig =
            toml::from_str(input).map_err(|e| DarkIvError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Thermal voltage at the configured temperature.
    pub fn thermal_voltage(&self) -> f64 {
        self.constants.thermal_voltage(self.temperature_k)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.area.is_finite() && self.area > 0.0) {
            return Err(DarkIvError::Config(format!(
                "area must be positive, got {}",
                self.area
            )));
        }
        self.smoothing.validate()?;
        check_range("rsh_voltage_range", self.rsh_voltage_range)?;
        match self.exponential_region {
            ExponentialRegion::Fixed { low, high } => {
                check_range("exponential_region", (low, high))?;
            }
            ExponentialRegion::Auto {
                min_voltage,
                half_width,
                ideality_bounds,
            } => {
                if !min_voltage.is_finite() {
                    return Err(DarkIvError::Config("auto min_voltage must be finite".into()));
                }
                if !(half_width.is_finite() && half_width > 0.0) {
                    return Err(DarkIvError::Config(format!(
                        "auto half_width must be positive, got {half_width}"
                    )));
                }
                check_range("ideality_bounds", ideality_bounds)?;
            }
        }
        if !self.high_voltage_threshold.is_finite() {
            return Err(DarkIvError::Config("high_voltage_threshold must be finite".into()));
        }
        if !(self.temperature_k.is_finite() && self.temperature_k > 0.0) {
            return Err(DarkIvError::Config(format!(
                "temperature must be positive, got {} K",
                self.temperature_k
            )));
        }
        if !(self.constants.boltzmann > 0.0 && self.constants.elementary_charge > 0.0) {
            return Err(DarkIvError::Config("physical constants must be positive".into()));
        }
        if !(self.numeric_epsilon > 0.0 && self.numeric_epsilon < 1.0) {
            return Err(DarkIvError::Config(format!(
                "numeric_epsilon must lie in (0, 1), got {}",
                self.numeric_epsilon
            )));
        }
        Ok(())
    }
}

fn check_range(name: &str, (low, high): (f64, f64)) -> Result<()> {
    if !(low.is_finite() && high.is_finite()) || low > high {
        return Err(DarkIvError::Config(format!(
            "{name} must be a finite (low, high) pair with low <= high, got ({low}, {high})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn defaults_are_valid() {
        let config = AnalysisConfig::default();
        config.validate().unwrap();
        assert_eq!(config.smoothing.window, 11);
        assert_eq!(config.smoothing.order, 3);
        assert_eq!(config.rsh_voltage_range, (-0.2, 0.2));
    }

    #[test]
    fn thermal_voltage_at_stc() {
        let vt = AnalysisConfig::default().thermal_voltage();
        assert_relative_eq!(vt, 0.025693, max_relative = 1e-4);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = AnalysisConfig::from_toml_str(
            r#"
area = 0.25
temperature_k = 300.0

[smoothing]
window = 7
"#,
        )
        .unwrap();
        assert_eq!(config.area, 0.25);
        assert_eq!(config.temperature_k, 300.0);
        assert_eq!(config.smoothing.window, 7);
        assert_eq!(config.smoothing.order, 3);
        assert_eq!(config.exponential_region, ExponentialRegion::default());
    }

    #[test]
    fn fixed_region_from_toml() {
        let config = AnalysisConfig::from_toml_str(
            r#"
rsh_voltage_range = [-0.1, 0.1]

[exponential_region]
mode = "fixed"
low = 0.3
high = 0.5
"#,
        )
        .unwrap();
        assert_eq!(config.rsh_voltage_range, (-0.1, 0.1));
        assert_eq!(
            config.exponential_region,
            ExponentialRegion::Fixed { low: 0.3, high: 0.5 }
        );
    }

    #[test]
    fn auto_region_partial_fields() {
        let config = AnalysisConfig::from_toml_str(
            r#"
[exponential_region]
mode = "auto"
half_width = 0.08
"#,
        )
        .unwrap();
        match config.exponential_region {
            ExponentialRegion::Auto {
                min_voltage,
                half_width,
                ideality_bounds,
            } => {
                assert_eq!(min_voltage, 0.1);
                assert_eq!(half_width, 0.08);
                assert_eq!(ideality_bounds, (0.5, 5.0));
            }
            other => panic!("expected auto region, got {other:?}"),
        }
    }

    #[test]
    fn even_window_is_rejected() {
        let err = AnalysisConfig::from_toml_str("[smoothing]\nwindow = 10\n").unwrap_err();
        assert!(err.to_string().contains("odd"), "got: {err}");
    }

    #[test]
    fn order_not_below_window_is_rejected() {
        let cfg = SmoothingConfig { window: 5, order: 5 };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn non_positive_area_is_rejected() {
        let config = AnalysisConfig {
            area: 0.0,
            ..AnalysisConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_range_is_rejected() {
        let config = AnalysisConfig {
            rsh_voltage_range: (0.2, -0.2),
            ..AnalysisConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("rsh_voltage_range"), "got: {err}");
    }
}
