//! Run statistics for `--stats` output.

use std::time::{Duration, Instant};

use crate::analysis::batch::SampleReport;
use crate::error::ErrorKind;

/// Phase timings and sample counters for one CLI run.
///
/// Created when `--stats` is passed, threaded as `Option<&mut Stats>`.
pub struct Stats {
    total_start: Instant,
    phases: Vec<(&'static str, Duration)>,
    pub samples_ok: u32,
    pub samples_failed: u32,
    /// Samples with at least one unavailable parameter.
    pub samples_partial: u32,
    /// Failure counts by reason.
    pub failures: Vec<(ErrorKind, u32)>,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    pub fn new() -> Self {
        Self {
            total_start: Instant::now(),
            phases: Vec::new(),
            samples_ok: 0,
            samples_failed: 0,
            samples_partial: 0,
            failures: Vec::new(),
        }
    }

    /// Record a completed phase with its duration.
    pub fn add_phase(&mut self, name: &'static str, duration: Duration) {
        self.phases.push((name, duration));
    }

    /// Tally the outcome of a batch.
    pub fn record_reports(&mut self, reports: &[SampleReport]) {
        for report in reports {
            match &report.outcome {
                Ok(analysis) => {
                    self.samples_ok += 1;
                    let p = &analysis.parameters;
                    if [&p.rsh, &p.rs, &p.j0, &p.ideality]
                        .iter()
                        .any(|e| !e.is_available())
                    {
                        self.samples_partial += 1;
                    }
                }
                Err(e) => {
                    self.samples_failed += 1;
                    let kind = e.kind();
                    match self.failures.iter_mut().find(|(k, _)| *k == kind) {
                        Some((_, count)) => *count += 1,
                        None => self.failures.push((kind, 1)),
                    }
                }
            }
        }
    }

    /// Print the stats table to stderr.
    pub fn display(&self) {
        let total = self.total_start.elapsed();
        eprintln!();
        eprintln!("=== darkiv run stats ===");

        for (name, dur) in &self.phases {
            eprintln!("  {:<24} {:>8.3}s", name, dur.as_secs_f64());
        }

        eprintln!("  Samples analyzed:       {}", self.samples_ok);
        if self.samples_partial > 0 {
            eprintln!("    with missing params:  {}", self.samples_partial);
        }
        eprintln!("  Samples failed:         {}", self.samples_failed);
        for (kind, count) in &self.failures {
            eprintln!("    {:<22} {}", kind.to_string(), count);
        }

        eprintln!("  ─────────────────────────────────");
        eprintln!("  Total:                  {:>8.3}s", total.as_secs_f64());
    }
}
