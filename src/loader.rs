//! Delimited-text loader for dark IV measurements.
//!
//! # Supported input
//!
//! ```text
//! # comment line
//! Voltage (V),Current (A)
//! -0.5,-1.2e-6
//! 0.0,0
//! 0.5,3.3m
//! ```
//!
//! Delimiters: tab, semicolon, comma or runs of whitespace, chosen from the
//! first content line. Values accept the engineering suffixes
//! T, G, MEG, K, M, U, N, P, F (case-insensitive; `M` is milli).
//!
//! Spreadsheets (`.xlsx`, `.xlsm`, `.xlsb`, `.xls`, `.ods`) are read through
//! calamine; the first worksheet is treated like a delimited file.
//!
//! Column roles come from the header (see [`detect_schema`]). A two-column
//! file without a recognizable header is read as (voltage, current).

use calamine::{open_workbook_auto, Reader};
use nom::branch::alt;
use nom::bytes::complete::tag_no_case;
use nom::combinator::{all_consuming, map, opt};
use nom::number::complete::double;
use nom::IResult;
use nom::Parser;
use std::path::Path;

use crate::config::AnalysisConfig;
use crate::error::{DarkIvError, Result};
use crate::series::MeasurementSeries;

/// Extensions read as delimited text.
const TEXT_EXTENSIONS: &[&str] = &["csv", "txt", "tsv", "dat", "iv"];
/// Extensions read as workbooks.
const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

const VOLTAGE_NAMES: &[&str] = &["v", "u", "voltage", "voltage (v)", "bias", "bias (v)"];
const CURRENT_NAMES: &[&str] = &["i", "current", "current (a)"];
const DENSITY_NAMES: &[&str] = &[
    "j",
    "current density",
    "current density (a/cm2)",
    "current density (a/cm^2)",
    "j (a/cm2)",
    "j (a/cm^2)",
];

/// Whether the current column holds raw current or current density.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrentKind {
    /// Amperes; divided by the device area on load.
    Current,
    /// A/cm^2; used as is.
    Density,
}

/// Column indices of the semantic roles in a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMapping {
    pub voltage: usize,
    pub current: usize,
    pub current_kind: CurrentKind,
}

/// Cells of a delimited file, split but not yet interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub headers: Option<Vec<String>>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn column_count(&self) -> usize {
        match &self.headers {
            Some(h) => h.len(),
            None => self.rows.first().map_or(0, Vec::len),
        }
    }
}

/// Read and preprocess a measurement file.
pub fn load(path: impl AsRef<Path>, config: &AnalysisConfig) -> Result<MeasurementSeries> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    if SPREADSHEET_EXTENSIONS.contains(&ext.as_str()) {
        let _span = tracing::debug_span!("load_workbook", path = %path.display()).entered();
        let table = read_workbook(path)?;
        return measurement_from_table(&table, config);
    }
    if !TEXT_EXTENSIONS.contains(&ext.as_str()) {
        return Err(DarkIvError::UnsupportedFormat(format!(
            "{}: unsupported file extension '{}'",
            path.display(),
            ext
        )));
    }

    let _span = tracing::debug_span!("load", path = %path.display()).entered();
    let content = std::fs::read_to_string(path)?;
    parse_measurement(&content, config)
}

/// Parse delimited text into a preprocessed measurement series.
pub fn parse_measurement(input: &str, config: &AnalysisConfig) -> Result<MeasurementSeries> {
    let table = parse_table(input)?;
    measurement_from_table(&table, config)
}

/// Map, convert and preprocess the cells of a text file or worksheet.
pub fn measurement_from_table(
    table: &RawTable,
    config: &AnalysisConfig,
) -> Result<MeasurementSeries> {
    if let Some(headers) = &table.headers {
        if !table.rows.is_empty() && table.rows.iter().all(|r| r.len() != headers.len()) {
            return Err(DarkIvError::Schema(format!(
                "header has {} cells {headers:?} but data rows have {}",
                headers.len(),
                table.rows[0].len()
            )));
        }
    }

    let mapping = match &table.headers {
        Some(headers) => detect_schema(headers)?,
        None if table.column_count() == 2 => ColumnMapping {
            voltage: 0,
            current: 1,
            current_kind: CurrentKind::Current,
        },
        None => {
            return Err(DarkIvError::Schema(format!(
                "no header and {} columns; cannot tell voltage from current",
                table.column_count()
            )))
        }
    };

    let mut skipped = 0usize;
    let pairs: Vec<(f64, f64)> = table
        .rows
        .iter()
        .filter_map(|row| {
            let v = row.get(mapping.voltage).and_then(|c| numeric_cell(c));
            let i = row.get(mapping.current).and_then(|c| numeric_cell(c));
            match (v, i) {
                (Some(v), Some(i)) => Some((v, i)),
                _ => {
                    skipped += 1;
                    None
                }
            }
        })
        .collect();

    if skipped > 0 {
        tracing::debug!(skipped, "skipped non-numeric rows");
    }
    if pairs.is_empty() {
        return Err(DarkIvError::Parse("no numeric data rows".into()));
    }

    preprocess(pairs, mapping.current_kind, config)
}

/// Split delimited text into header and data cells.
///
/// Blank lines and lines starting with `#` are ignored. The first content line
/// is a header unless every cell in it is numeric.
pub fn parse_table(input: &str) -> Result<RawTable> {
    let mut lines = input
        .trim_start_matches('\u{feff}')
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'));

    let first = lines
        .next()
        .ok_or_else(|| DarkIvError::Parse("input contains no data".into()))?;
    let delimiter = Delimiter::detect(first);

    let first_cells = delimiter.split(first);
    let is_header = first_cells.iter().any(|c| numeric_cell(c).is_none());

    let mut rows = Vec::new();
    let headers = if is_header {
        Some(first_cells)
    } else {
        rows.push(first_cells);
        None
    };
    rows.extend(lines.map(|l| delimiter.split(l)));

    Ok(RawTable { headers, rows })
}

/// Read the first worksheet of a workbook into a raw table.
///
/// Empty rows are dropped. The first remaining row is a header unless every
/// cell in it is numeric.
pub fn read_workbook(path: &Path) -> Result<RawTable> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| DarkIvError::Parse(format!("{}: {e}", path.display())))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| DarkIvError::Parse(format!("{}: workbook has no sheets", path.display())))?
        .map_err(|e| DarkIvError::Parse(format!("{}: {e}", path.display())))?;

    let mut rows = range
        .rows()
        .map(|row| row.iter().map(|c| c.to_string().trim().to_string()).collect::<Vec<_>>())
        .filter(|row| row.iter().any(|c| !c.is_empty()));

    let first = rows
        .next()
        .ok_or_else(|| DarkIvError::Parse(format!("{}: first sheet is empty", path.display())))?;
    let is_header = first.iter().any(|c| numeric_cell(c).is_none());

    let mut data = Vec::new();
    let headers = if is_header {
        Some(first)
    } else {
        data.push(first);
        None
    };
    data.extend(rows);
    tracing::debug!(rows = data.len(), "read worksheet");

    Ok(RawTable {
        headers,
        rows: data,
    })
}

/// Map header names to voltage and current columns.
///
/// Exact (case-insensitive) names win, then exact names once a trailing unit
/// such as `(V)` or `[A]` is stripped, then substring matches. Fails with
/// `Schema` when a role cannot be assigned, unless there are exactly two
/// columns, which are then taken as (voltage, current).
pub fn detect_schema(headers: &[String]) -> Result<ColumnMapping> {
    let normalized: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
    let exact = |names: &[&str]| {
        normalized
            .iter()
            .position(|h| names.contains(&h.as_str()))
            .or_else(|| normalized.iter().position(|h| names.contains(&strip_unit(h))))
    };
    let partial = |needles: &[&str], skip: Option<usize>| {
        normalized
            .iter()
            .enumerate()
            .position(|(i, h)| Some(i) != skip && needles.iter().any(|n| h.contains(n)))
    };

    let voltage = exact(VOLTAGE_NAMES).or_else(|| partial(&["voltage", "bias"], None));

    let current = match (exact(DENSITY_NAMES), exact(CURRENT_NAMES)) {
        (Some(i), _) => Some((i, CurrentKind::Density)),
        (None, Some(i)) => Some((i, CurrentKind::Current)),
        (None, None) => partial(&["density"], voltage)
            .map(|i| (i, CurrentKind::Density))
            .or_else(|| partial(&["current"], voltage).map(|i| (i, CurrentKind::Current))),
    };

    match (voltage, current) {
        (Some(v), Some((c, kind))) if v != c => Ok(ColumnMapping {
            voltage: v,
            current: c,
            current_kind: kind,
        }),
        _ if headers.len() == 2 => {
            tracing::debug!(?headers, "header not recognized, using column order");
            Ok(ColumnMapping {
                voltage: 0,
                current: 1,
                current_kind: CurrentKind::Current,
            })
        }
        _ => Err(DarkIvError::Schema(format!(
            "could not identify voltage and current columns among {headers:?}"
        ))),
    }
}

/// Header name without a trailing unit: `"v (v)"` -> `"v"`, `"i [a]"` -> `"i"`.
fn strip_unit(header: &str) -> &str {
    match header.find(['(', '[']) {
        Some(i) if i > 0 => header[..i].trim_end(),
        _ => header,
    }
}

/// Sort, deduplicate, correct offset and polarity, and normalize by area.
///
/// `pairs` are (voltage, current) in file order.
pub fn preprocess(
    mut pairs: Vec<(f64, f64)>,
    kind: CurrentKind,
    config: &AnalysisConfig,
) -> Result<MeasurementSeries> {
    if pairs.is_empty() {
        return Err(DarkIvError::InsufficientData("no data points".into()));
    }

    if config.loader.zero_offset_correction {
        let (v0, i0) = pairs
            .iter()
            .copied()
            .fold(None, |best: Option<(f64, f64)>, p| match best {
                Some(b) if b.0.abs() <= p.0.abs() => Some(b),
                _ => Some(p),
            })
            .unwrap_or((f64::INFINITY, 0.0));
        if v0.abs() < 0.5 {
            tracing::debug!(v0, offset = i0, "zero-offset correction");
            for p in &mut pairs {
                p.1 -= i0;
            }
        }
    }

    if config.loader.polarity_correction {
        let peak = pairs
            .iter()
            .copied()
            .fold(None, |best: Option<(f64, f64)>, p| match best {
                Some(b) if b.1.abs() >= p.1.abs() => Some(b),
                _ => Some(p),
            });
        if let Some((v_peak, i_peak)) = peak {
            let (flip_v, flip_i) = match (v_peak < 0.0, i_peak < 0.0) {
                (true, true) => (true, true),
                (true, false) if i_peak > 0.0 => (true, false),
                (false, true) if v_peak > 0.0 => (false, true),
                _ => (false, false),
            };
            if flip_v || flip_i {
                tracing::debug!(flip_v, flip_i, "polarity correction");
                for p in &mut pairs {
                    if flip_v {
                        p.0 = -p.0;
                    }
                    if flip_i {
                        p.1 = -p.1;
                    }
                }
            }
        }
    }

    let divisor = match kind {
        CurrentKind::Current => config.area,
        CurrentKind::Density => 1.0,
    };
    let pairs = pairs.into_iter().map(|(v, i)| (v, i / divisor)).collect();
    MeasurementSeries::from_unsorted(pairs)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Delimiter {
    Char(char),
    Whitespace,
}

impl Delimiter {
    fn detect(line: &str) -> Self {
        ['\t', ';', ',']
            .into_iter()
            .find(|&c| line.contains(c))
            .map_or(Delimiter::Whitespace, Delimiter::Char)
    }

    fn split(self, line: &str) -> Vec<String> {
        let clean = |c: &str| c.trim().trim_matches('"').to_string();
        match self {
            Delimiter::Char(d) => line.split(d).map(clean).collect(),
            Delimiter::Whitespace => line.split_whitespace().map(clean).collect(),
        }
    }
}

/// A cell parsed completely as a number, or `None`.
fn numeric_cell(cell: &str) -> Option<f64> {
    all_consuming(eng_value)
        .parse(cell.trim())
        .ok()
        .map(|(_, v)| v)
        .filter(|v| v.is_finite())
}

// ---------------------------------------------------------------------------
// Engineering suffix value parser
// ---------------------------------------------------------------------------

/// Parse a numeric value with optional engineering suffix.
/// Handles: 10k, 100n, 4.7u, 1MEG, 1e-3, -3.3, etc.
fn eng_value(input: &str) -> IResult<&str, f64> {
    let (rest, num) = double(input)?;
    let (rest, suffix) = opt(eng_suffix).parse(rest)?;
    Ok((rest, num * suffix.unwrap_or(1.0)))
}

/// Match an engineering suffix and return its multiplier.
fn eng_suffix(input: &str) -> IResult<&str, f64> {
    // MEG must come before M
    alt((
        map(tag_no_case("MEG"), |_: &str| 1e6),
        map(tag_no_case("T"), |_: &str| 1e12),
        map(tag_no_case("G"), |_: &str| 1e9),
        map(tag_no_case("K"), |_: &str| 1e3),
        map(tag_no_case("M"), |_: &str| 1e-3),
        map(tag_no_case("U"), |_: &str| 1e-6),
        map(tag_no_case("N"), |_: &str| 1e-9),
        map(tag_no_case("P"), |_: &str| 1e-12),
        map(tag_no_case("F"), |_: &str| 1e-15),
    ))
    .parse(input)
}
