//! Input ingest: catalog CSV, zone and fault JSON, and the shared
//! header-addressed CSV machinery used by the dataset loaders.
//!
//! Design goals:
//! - **Strict schema** for required columns (clear errors, exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Deterministic behavior** (rows keep file order)

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;

use crate::domain::{CatalogEvent, FaultSource, Zone};
use crate::error::AppError;
use crate::geometry::normalize_lon;

pub(crate) type HeaderMap = HashMap<String, usize>;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub id: Option<String>,
    pub message: String,
}

/// Parsed rows plus the rows that were rejected.
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub rows: Vec<T>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

impl<T> Loaded<T> {
    pub fn rows_used(&self) -> usize {
        self.rows.len()
    }
}

/// Open a data file; a missing file is a configuration error.
pub(crate) fn open_data_file(path: &Path) -> Result<File, AppError> {
    File::open(path).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            AppError::config(format!("Data file '{}' not found.", path.display()))
        } else {
            AppError::io(path, e)
        }
    })
}

/// Read a header-addressed CSV, parsing each row with `parse`.
///
/// Missing required columns fail the whole file; row failures are collected.
pub(crate) fn read_rows<R, T, F>(
    reader: R,
    what: &str,
    required: &[&str],
    parse: F,
) -> Result<Loaded<T>, AppError>
where
    R: Read,
    F: Fn(&StringRecord, &HeaderMap) -> Result<T, String>,
{
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::input(format!("Failed to read {what} headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    for name in required {
        if !header_map.contains_key(*name) {
            return Err(AppError::input(format!("{what}: missing required column `{name}`")));
        }
    }

    let mut rows = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // records() starts after the header line; lines are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    id: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse(&record, &header_map) {
            Ok(row) => rows.push(row),
            Err(message) => row_errors.push(RowError {
                line,
                id: record.get(0).map(str::to_string),
                message,
            }),
        }
    }

    Ok(Loaded {
        rows,
        row_errors,
        rows_read,
    })
}

fn build_header_map(headers: &StringRecord) -> HeaderMap {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports may prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

pub(crate) fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HeaderMap,
    name: &str,
) -> Result<&'a str, String> {
    let idx = header_map
        .get(name)
        .ok_or_else(|| format!("Missing required column: `{name}`"))?;
    record
        .get(*idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

pub(crate) fn get_optional<'a>(record: &'a StringRecord, header_map: &HeaderMap, name: &str) -> Option<&'a str> {
    let idx = header_map.get(name)?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}

pub(crate) fn parse_f64_field(record: &StringRecord, header_map: &HeaderMap, name: &str) -> Result<f64, String> {
    let raw = get_required(record, header_map, name)?;
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(format!("Invalid `{name}` value '{raw}'.")),
    }
}

/// Longitude column, normalized from `[0, 360)` when needed.
pub(crate) fn parse_lon_field(record: &StringRecord, header_map: &HeaderMap, name: &str) -> Result<f64, String> {
    parse_f64_field(record, header_map, name).map(normalize_lon)
}

pub(crate) fn parse_lat_field(record: &StringRecord, header_map: &HeaderMap, name: &str) -> Result<f64, String> {
    let lat = parse_f64_field(record, header_map, name)?;
    if lat.abs() > 90.0 {
        return Err(format!("Latitude {lat} is out of range."));
    }
    Ok(lat)
}

fn parse_time(s: &str) -> Result<NaiveDateTime, String> {
    const FMTS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y/%m/%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in FMTS {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(t);
        }
    }
    // Date-only rows are placed at midnight.
    if let Some(t) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(t);
    }
    Err(format!(
        "Invalid time '{s}'. Expected YYYY-MM-DDTHH:MM:SS, YYYY-MM-DD HH:MM:SS or YYYY-MM-DD."
    ))
}

/// Parse a `time,lon,lat,depth,mag` catalog.
pub fn read_catalog_csv<R: Read>(reader: R) -> Result<Loaded<CatalogEvent>, AppError> {
    read_rows(reader, "catalog", &["time", "lon", "lat", "depth", "mag"], |record, map| {
        let time = parse_time(get_required(record, map, "time")?)?;
        let depth = parse_f64_field(record, map, "depth")?;
        if depth < 0.0 {
            return Err(format!("Negative depth {depth}."));
        }
        Ok(CatalogEvent {
            time,
            lon: parse_lon_field(record, map, "lon")?,
            lat: parse_lat_field(record, map, "lat")?,
            depth,
            mag: parse_f64_field(record, map, "mag")?,
        })
    })
}

pub fn load_catalog_csv(path: &Path) -> Result<Loaded<CatalogEvent>, AppError> {
    let loaded = read_catalog_csv(open_data_file(path)?)?;
    if loaded.rows.is_empty() {
        return Err(AppError::input(format!(
            "Catalog '{}' has no valid events ({} rows read).",
            path.display(),
            loaded.rows_read
        )));
    }
    Ok(loaded)
}

/// Zones as a JSON array. Identifiers must be unique.
pub fn parse_zones_json(text: &str) -> Result<Vec<Zone>, AppError> {
    let zones: Vec<Zone> =
        serde_json::from_str(text).map_err(|e| AppError::input(format!("Invalid zones JSON: {e}")))?;
    let mut seen = HashSet::new();
    for zone in &zones {
        if !seen.insert(zone.id.as_str()) {
            return Err(AppError::input(format!("Duplicate zone id '{}'.", zone.id)));
        }
    }
    Ok(zones)
}

pub fn load_zones_json(path: &Path) -> Result<Vec<Zone>, AppError> {
    let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => AppError::config(format!("Zones file '{}' not found.", path.display())),
        _ => AppError::io(path, e),
    })?;
    parse_zones_json(&text)
}

/// Faults as a JSON array.
pub fn parse_faults_json(text: &str) -> Result<Vec<FaultSource>, AppError> {
    serde_json::from_str(text).map_err(|e| AppError::input(format!("Invalid faults JSON: {e}")))
}

pub fn load_faults_json(path: &Path) -> Result<Vec<FaultSource>, AppError> {
    let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => AppError::config(format!("Faults file '{}' not found.", path.display())),
        _ => AppError::io(path, e),
    })?;
    parse_faults_json(&text)
}
