//! Export zone records (CSV/JSON) and catalogs (CSV).
//!
//! The CSV layout is the attribute schema of the store, so spreadsheet
//! exports and attribute tables always agree on names.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::catalog::EventCatalog;
use crate::domain::{SkippedZone, ZoneRecord};
use crate::error::AppError;
use crate::store::{ZONE_SCHEMA, zone_attributes};

/// Write one CSV row per zone record.
pub fn write_records_csv<W: Write>(out: W, records: &[ZoneRecord]) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(out);

    let mut header = vec!["zone_id"];
    header.extend(ZONE_SCHEMA.iter().map(|d| d.name));
    writer.write_record(&header)?;

    for record in records {
        let attrs = zone_attributes(record);
        let mut row = vec![record.zone_id.clone()];
        row.extend(
            ZONE_SCHEMA
                .iter()
                .map(|d| attrs.get(d.name).map(|v| v.to_field()).unwrap_or_default()),
        );
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn export_records_csv(path: &Path, records: &[ZoneRecord]) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| AppError::io(path, e))?;
    write_records_csv(file, records)
        .map_err(|e| AppError::input(format!("Failed to write export CSV '{}': {e}", path.display())))
}

#[derive(Debug, Serialize)]
struct RecordsDocument<'a> {
    span_years: Option<f64>,
    records: &'a [ZoneRecord],
    skipped: &'a [SkippedZone],
}

/// Full records (every posterior rate, reasons for unavailable estimates)
/// as pretty JSON.
pub fn export_records_json(
    path: &Path,
    records: &[ZoneRecord],
    skipped: &[SkippedZone],
    span_years: Option<f64>,
) -> Result<(), AppError> {
    let doc = RecordsDocument {
        span_years,
        records,
        skipped,
    };
    let file = File::create(path).map_err(|e| AppError::io(path, e))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, &doc)
        .map_err(|e| AppError::internal(format!("Failed to serialize records: {e}")))?;
    out.flush().map_err(|e| AppError::io(path, e))
}

/// Write a catalog in the `time,lon,lat,depth,mag` ingest layout.
pub fn write_catalog_csv<W: Write>(out: W, catalog: &EventCatalog) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["time", "lon", "lat", "depth", "mag"])?;
    for e in catalog.events() {
        writer.write_record([
            e.time.format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
            format!("{:.4}", e.lon),
            format!("{:.4}", e.lat),
            format!("{:.1}", e.depth),
            format!("{:.2}", e.mag),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn export_catalog_csv(path: &Path, catalog: &EventCatalog) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| AppError::io(path, e))?;
    write_catalog_csv(file, catalog)
        .map_err(|e| AppError::input(format!("Failed to write catalog CSV '{}': {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CatalogEvent;
    use crate::io::ingest::read_catalog_csv;
    use crate::store::tests::record;
    use chrono::NaiveDate;

    #[test]
    fn csv_has_schema_columns_and_blank_unavailable_cells() {
        let mut buf = Vec::new();
        write_records_csv(&mut buf, &[record()]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("zone_id,area_km2,mmax,prior_src"));
        assert_eq!(header.split(',').count(), ZONE_SCHEMA.len() + 1);

        let row: Vec<&str> = lines.next().unwrap().split(',').collect();
        let barba = 1 + ZONE_SCHEMA.iter().position(|d| d.name == "mr_barba").unwrap();
        assert_eq!(row[0], "Z1");
        assert_eq!(row[barba], "");
    }

    #[test]
    fn json_export_keeps_reasons() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        let skipped = [SkippedZone {
            zone_id: "Z9".to_string(),
            reason: "2 vertices".to_string(),
        }];
        export_records_json(&path, &[record()], &skipped, Some(50.0)).unwrap();

        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["records"][0]["moment"]["from_strain_barba"]["status"], "unavailable");
        assert_eq!(value["skipped"][0]["zone_id"], "Z9");
        assert_eq!(value["span_years"], 50.0);
    }

    #[test]
    fn catalog_csv_reads_back() {
        let catalog = EventCatalog::new(vec![CatalogEvent {
            time: NaiveDate::from_ymd_opt(1999, 8, 17).unwrap().and_hms_opt(0, 1, 39).unwrap(),
            lon: 29.97,
            lat: 40.76,
            depth: 17.0,
            mag: 7.6,
        }]);
        let mut buf = Vec::new();
        write_catalog_csv(&mut buf, &catalog).unwrap();
        let loaded = read_catalog_csv(buf.as_slice()).unwrap();
        assert!(loaded.row_errors.is_empty());
        assert_eq!(loaded.rows, catalog.events());
    }
}
