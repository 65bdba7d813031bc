//! Results output formatting (CSV).

use crate::analysis::batch::SampleReport;
use crate::analysis::{Extracted, SampleAnalysis};
use crate::error::Result;
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

/// Placeholder written for an unavailable parameter.
const NOT_AVAILABLE: &str = "NA";

/// Write one summary row per sample.
///
/// Format:
/// ```csv
/// file,Rsh_ohm_cm2,Rs_ohm_cm2,J0_A_cm2,n,r_squared,status
/// a.csv,1.02e6,4.9e-1,1.01e-12,1.1032,0.99998,ok
/// b.csv,9.8e4,NA,NA,NA,NA,"Rs: dependency_unavailable; J0: insufficient_range"
/// c.csv,NA,NA,NA,NA,NA,failed: insufficient_data: sample has 2 points...
/// ```
pub fn write_summary_csv<W: Write>(reports: &[SampleReport], writer: &mut W) -> Result<()> {
    writeln!(writer, "file,Rsh_ohm_cm2,Rs_ohm_cm2,J0_A_cm2,n,r_squared,status")?;
    for report in reports {
        write!(writer, "{}", csv_field(&report.name))?;
        match &report.outcome {
            Ok(analysis) => {
                let p = &analysis.parameters;
                let r_squared = p.exponential_fit.map_or_else(
                    || NOT_AVAILABLE.to_string(),
                    |f| format!("{:.6}", f.fit.r_squared),
                );
                writeln!(
                    writer,
                    ",{},{},{},{},{},{}",
                    format_exp(&p.rsh),
                    format_exp(&p.rs),
                    format_exp(&p.j0),
                    format_fixed(&p.ideality),
                    r_squared,
                    csv_field(&status(analysis)),
                )?;
            }
            Err(e) => {
                let status = format!("failed: {}: {}", e.kind(), e);
                writeln!(
                    writer,
                    ",{na},{na},{na},{na},{na},{}",
                    csv_field(&status),
                    na = NOT_AVAILABLE
                )?;
            }
        }
    }
    Ok(())
}

/// Write the per-point curves of one sample, aligned on its voltage grid.
///
/// Format:
/// ```csv
/// V,J,J_smooth,n_local,R_diff
/// -0.5,-5.0e-6,-5.0e-6,,1.0e5
/// 0.45,1.2e-5,1.2e-5,1.104,2.8e1
/// ```
///
/// Undefined entries are left empty.
pub fn write_curves_csv<W: Write>(analysis: &SampleAnalysis, writer: &mut W) -> Result<()> {
    writeln!(writer, "V,J,J_smooth,n_local,R_diff")?;

    let mut ideality = analysis.local_ideality.iter().peekable();
    let rows = analysis
        .raw
        .points()
        .zip(analysis.smoothed.current_density())
        .zip(&analysis.differential_resistance);

    for (((v, j), j_smooth), rdiff) in rows {
        let n_local = match ideality.peek() {
            Some(p) if p.voltage == v => ideality.next().and_then(|p| p.value),
            _ => None,
        };
        writeln!(
            writer,
            "{},{:e},{:e},{},{}",
            v,
            j,
            j_smooth,
            optional(n_local),
            optional(rdiff.value)
        )?;
    }
    Ok(())
}

/// Curve file name for each sample, in input order.
///
/// `<stem>_curves.csv`, with the sample index inserted when the stem was
/// already used (`a.csv` and `a.txt` give `a_curves.csv` and `a_1_curves.csv`).
pub fn curve_file_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut taken = HashSet::new();
    names
        .into_iter()
        .enumerate()
        .map(|(index, name)| {
            let stem = Path::new(name)
                .file_stem()
                .map_or_else(|| name.to_string(), |s| s.to_string_lossy().into_owned());
            let mut candidate = format!("{stem}_curves.csv");
            let mut suffix = index;
            while taken.contains(&candidate) {
                candidate = format!("{stem}_{suffix}_curves.csv");
                suffix += 1;
            }
            taken.insert(candidate.clone());
            candidate
        })
        .collect()
}

fn status(analysis: &SampleAnalysis) -> String {
    let p = &analysis.parameters;
    let missing: Vec<String> = [("Rsh", &p.rsh), ("Rs", &p.rs), ("J0", &p.j0), ("n", &p.ideality)]
        .into_iter()
        .filter_map(|(name, e)| match e {
            Extracted::Value(_) => None,
            Extracted::Unavailable { kind, .. } => Some(format!("{name}: {kind}")),
        })
        .collect();
    if missing.is_empty() {
        "ok".to_string()
    } else {
        missing.join("; ")
    }
}

fn format_exp(e: &Extracted) -> String {
    e.value()
        .map_or_else(|| NOT_AVAILABLE.to_string(), |v| format!("{v:.4e}"))
}

fn format_fixed(e: &Extracted) -> String {
    e.value()
        .map_or_else(|| NOT_AVAILABLE.to_string(), |v| format!("{v:.4}"))
}

fn optional(v: Option<f64>) -> String {
    v.map(|x| format!("{x:e}")).unwrap_or_default()
}

/// Quote a field if it contains a delimiter, quote or newline.
fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', ';']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
