//! CSV ingest and validation.
//!
//! This module turns measurement exports into clean, strictly time-ordered
//! series that are safe to analyze.
//!
//! Design goals:
//! - **Strict schema** for required columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Forgiving headers** (case, surrounding whitespace, BOM, a few aliases)
//! - **Separation of concerns**: no fitting logic here

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use csv::StringRecord;
use tracing::warn;

use crate::domain::Measurements;
use crate::error::AppError;

/// Accepted header names per logical column, first match wins.
const TIME_COLUMNS: [&str; 3] = ["time", "t", "tiempo"];
const BIOMASS_COLUMNS: [&str; 3] = ["biomass", "x", "biomasa"];
const SUBSTRATE_COLUMNS: [&str; 3] = ["substrate", "s", "sustrato"];
const PRODUCT_COLUMNS: [&str; 3] = ["product", "p", "producto"];
const OXYGEN_COLUMNS: [&str; 4] = ["do", "dissolved_oxygen", "od", "oxygen"];

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingested measurement series plus bookkeeping about dropped rows.
#[derive(Debug, Clone)]
pub struct IngestedMeasurements {
    pub data: Measurements,
    /// False when the file had no product column and zeros were substituted.
    pub has_product: bool,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Ingested dissolved-oxygen time course.
#[derive(Debug, Clone)]
pub struct IngestedOxygen {
    pub time: Vec<f64>,
    pub dissolved_oxygen: Vec<f64>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Load `time,biomass,substrate[,product]` measurements.
///
/// The label defaults to the file stem.
pub fn load_measurements(path: &Path) -> Result<IngestedMeasurements, AppError> {
    let (headers, records) = read_records(path)?;
    let header_map = build_header_map(&headers);

    let time_idx = require_column(&header_map, &TIME_COLUMNS)?;
    let biomass_idx = require_column(&header_map, &BIOMASS_COLUMNS)?;
    let substrate_idx = require_column(&header_map, &SUBSTRATE_COLUMNS)?;
    let product_idx = find_column(&header_map, &PRODUCT_COLUMNS);

    let mut data = Measurements {
        label: file_label(path),
        ..Measurements::default()
    };
    let mut row_errors = Vec::new();
    let rows_read = records.len();

    for (line, record) in records {
        let record = match record {
            Ok(r) => r,
            Err(message) => {
                row_errors.push(RowError { line, message });
                continue;
            }
        };
        let row = (|| -> Result<[f64; 4], String> {
            let t = parse_required(&record, time_idx, TIME_COLUMNS[0])?;
            let x = parse_required(&record, biomass_idx, BIOMASS_COLUMNS[0])?;
            let s = parse_required(&record, substrate_idx, SUBSTRATE_COLUMNS[0])?;
            let p = match product_idx {
                Some(idx) => parse_required(&record, idx, PRODUCT_COLUMNS[0])?,
                None => 0.0,
            };
            check_time(t, data.time.last().copied())?;
            Ok([t, x, s, p])
        })();

        match row {
            Ok([t, x, s, p]) => {
                data.time.push(t);
                data.biomass.push(x);
                data.substrate.push(s);
                data.product.push(p);
            }
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    report_row_errors(path, &row_errors);
    if data.is_empty() {
        return Err(AppError::new(
            3,
            format!("No valid rows in '{}'.", path.display()),
        ));
    }
    data.validate()?;

    Ok(IngestedMeasurements {
        data,
        has_product: product_idx.is_some(),
        row_errors,
        rows_read,
    })
}

/// Load a `time,do` dissolved-oxygen file.
pub fn load_oxygen(path: &Path) -> Result<IngestedOxygen, AppError> {
    let (headers, records) = read_records(path)?;
    let header_map = build_header_map(&headers);

    let time_idx = require_column(&header_map, &TIME_COLUMNS)?;
    let do_idx = require_column(&header_map, &OXYGEN_COLUMNS)?;

    let mut time = Vec::new();
    let mut dissolved_oxygen = Vec::new();
    let mut row_errors = Vec::new();
    let rows_read = records.len();

    for (line, record) in records {
        let parsed = record.and_then(|record| {
            let t = parse_required(&record, time_idx, TIME_COLUMNS[0])?;
            let c = parse_required(&record, do_idx, OXYGEN_COLUMNS[0])?;
            check_time(t, time.last().copied())?;
            Ok((t, c))
        });
        match parsed {
            Ok((t, c)) => {
                time.push(t);
                dissolved_oxygen.push(c);
            }
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    report_row_errors(path, &row_errors);
    if time.is_empty() {
        return Err(AppError::new(
            3,
            format!("No valid rows in '{}'.", path.display()),
        ));
    }

    Ok(IngestedOxygen {
        time,
        dissolved_oxygen,
        row_errors,
        rows_read,
    })
}

type Records = Vec<(usize, Result<StringRecord, String>)>;

fn read_records(path: &Path) -> Result<(StringRecord, Records), AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display()))
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();

    // +2: records start on the line after the header, lines are 1-based.
    let records = reader
        .records()
        .enumerate()
        .map(|(idx, r)| (idx + 2, r.map_err(|e| format!("CSV parse error: {e}"))))
        .collect();

    Ok((headers, records))
}

fn report_row_errors(path: &Path, row_errors: &[RowError]) {
    for err in row_errors {
        warn!(file = %path.display(), line = err.line, "skipped row: {}", err.message);
    }
}

fn file_label(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        map.entry(normalize_header_name(name)).or_insert(idx);
    }
    map
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn find_column(header_map: &HashMap<String, usize>, names: &[&str]) -> Option<usize> {
    names.iter().find_map(|n| header_map.get(*n).copied())
}

fn require_column(header_map: &HashMap<String, usize>, names: &[&str]) -> Result<usize, AppError> {
    find_column(header_map, names).ok_or_else(|| {
        AppError::new(
            2,
            format!("Missing required column: `{}` (accepted: {})", names[0], names.join(", ")),
        )
    })
}

fn parse_required(record: &StringRecord, idx: usize, name: &str) -> Result<f64, String> {
    let raw = record
        .get(idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing value: `{name}`"))?;
    let v = raw
        .parse::<f64>()
        .map_err(|_| format!("Invalid `{name}` value '{raw}'"))?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(format!("Non-finite `{name}` value"))
    }
}

fn check_time(t: f64, previous: Option<f64>) -> Result<(), String> {
    if t < 0.0 {
        return Err(format!("Negative time {t}"));
    }
    match previous {
        Some(prev) if t <= prev => Err(format!("Time {t} does not increase (previous {prev})")),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_normalized() {
        assert_eq!(normalize_header_name("\u{feff} Time "), "time");
        let headers = StringRecord::from(vec!["Tiempo", "Biomasa", "Sustrato"]);
        let map = build_header_map(&headers);
        assert_eq!(find_column(&map, &TIME_COLUMNS), Some(0));
        assert_eq!(find_column(&map, &SUBSTRATE_COLUMNS), Some(2));
        assert_eq!(find_column(&map, &PRODUCT_COLUMNS), None);
    }

    #[test]
    fn time_must_increase() {
        assert!(check_time(1.0, Some(0.5)).is_ok());
        assert!(check_time(1.0, Some(1.0)).is_err());
        assert!(check_time(-1.0, None).is_err());
    }

    #[test]
    fn parse_rejects_blank_and_text() {
        let rec = StringRecord::from(vec!["1.5", "", "abc"]);
        assert_eq!(parse_required(&rec, 0, "time"), Ok(1.5));
        assert!(parse_required(&rec, 1, "biomass").is_err());
        assert!(parse_required(&rec, 2, "substrate").is_err());
        assert!(parse_required(&rec, 9, "product").is_err());
    }
}
