//! Dark current-voltage analysis of photovoltaic devices.
//!
//! Loads a measured IV curve, smooths it, and extracts the single-diode
//! parameters (shunt resistance, series resistance, saturation current
//! density, ideality factor) together with the local ideality factor n(V) and
//! the differential resistance dV/dJ.
//!
//! ```no_run
//! use darkiv::{analysis, loader, AnalysisConfig};
//!
//! let config = AnalysisConfig::default();
//! let series = loader::load("cell_01.csv", &config)?;
//! let result = analysis::analyze(&series, &config)?;
//! println!("n = {:?}", result.parameters.ideality.value());
//! # Ok::<(), darkiv::DarkIvError>(())
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod linalg;
pub mod loader;
pub mod output;
pub mod series;
pub mod stats;

pub use config::AnalysisConfig;
pub use error::{DarkIvError, ErrorKind, Result};
pub use series::{CurvePoint, MeasurementSeries, SmoothedSeries};
