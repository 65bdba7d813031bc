//! Batch driver: analyze many independent samples in parallel.
//!
//! Each sample is processed by its own rayon task with its own series; only
//! the configuration is shared, read-only. A failed sample is reported in its
//! slot and never stops the rest of the batch. Output order matches input
//! order.

use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::loader;
use crate::series::MeasurementSeries;

use super::SampleAnalysis;

/// A named series waiting to be analyzed.
#[derive(Debug, Clone)]
pub struct SampleInput {
    pub name: String,
    pub series: MeasurementSeries,
}

/// Per-sample outcome of a batch run.
#[derive(Debug)]
pub struct SampleReport {
    pub name: String,
    pub outcome: Result<SampleAnalysis>,
}

impl SampleReport {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Analyze in-memory samples.
pub fn run(samples: Vec<SampleInput>, config: &AnalysisConfig) -> Vec<SampleReport> {
    let _span = tracing::info_span!("batch", samples = samples.len()).entered();
    let reports: Vec<SampleReport> = samples
        .into_par_iter()
        .map(|sample| {
            let outcome = super::analyze(&sample.series, config);
            finish(sample.name, outcome)
        })
        .collect();
    log_summary(&reports);
    reports
}

/// Load and analyze files. A file that cannot be read or parsed is a failed
/// sample like any other.
pub fn run_files(paths: &[PathBuf], config: &AnalysisConfig) -> Vec<SampleReport> {
    let _span = tracing::info_span!("batch_files", files = paths.len()).entered();
    let reports: Vec<SampleReport> = paths
        .par_iter()
        .map(|path| {
            let outcome = loader::load(path, config).and_then(|s| super::analyze(&s, config));
            finish(sample_name(path), outcome)
        })
        .collect();
    log_summary(&reports);
    reports
}

fn finish(name: String, outcome: Result<SampleAnalysis>) -> SampleReport {
    if let Err(e) = &outcome {
        tracing::warn!(sample = %name, error = %e, "sample failed");
    }
    SampleReport { name, outcome }
}

fn log_summary(reports: &[SampleReport]) {
    let ok = reports.iter().filter(|r| r.is_ok()).count();
    tracing::info!(ok, failed = reports.len() - ok, "batch finished");
}

/// File name used to label a sample in reports.
pub fn sample_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
