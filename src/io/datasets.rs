//! Background and strain dataset loaders.
//!
//! All tables are header-addressed CSV:
//!
//! | dataset          | columns                                   |
//! |------------------|-------------------------------------------|
//! | Mmax             | `zone_id,mmax[,weight]` (rows are bins)   |
//! | completeness     | `zone_id,mc,start_year`                   |
//! | scalar strain    | `lon,lat,strain`                          |
//! | tensor strain    | `lon,lat,epp,ett,ept`                     |
//! | regime polygons  | `regime,lon1,lat1,...,lon5,lat5`          |
//!
//! Longitudes above 180 are shifted by -360.

use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use std::path::Path;

use tracing::warn;

use crate::domain::{CompletenessPeriod, LonLat, MmaxBin, ScalarStrainSample, TensorStrainSample, Zone, ZonePriors};
use crate::error::AppError;
use crate::io::ingest::{
    Loaded, get_optional, get_required, open_data_file, parse_f64_field, parse_lat_field, parse_lon_field,
    read_rows,
};
use crate::strain::RegimePolygonRecord;

/// Vertices per regime polygon record.
pub const REGIME_POLYGON_VERTICES: usize = 5;

/// Per-zone table rows keyed by zone id.
pub type ZoneTable<T> = BTreeMap<String, Vec<T>>;

fn group_by_zone<T>(rows: Vec<(String, T)>) -> ZoneTable<T> {
    let mut table: ZoneTable<T> = BTreeMap::new();
    for (id, row) in rows {
        table.entry(id).or_default().push(row);
    }
    table
}

pub fn read_mmax_table<R: Read>(reader: R) -> Result<(ZoneTable<MmaxBin>, Loaded<()>), AppError> {
    let loaded = read_rows(reader, "Mmax table", &["zone_id", "mmax"], |record, map| {
        let id = get_required(record, map, "zone_id")?.to_string();
        let mmax = parse_f64_field(record, map, "mmax")?;
        let weight = match get_optional(record, map, "weight") {
            Some(raw) => raw
                .parse::<f64>()
                .ok()
                .filter(|w| w.is_finite() && *w > 0.0)
                .ok_or_else(|| format!("Invalid `weight` value '{raw}'."))?,
            None => 1.0,
        };
        Ok((id, MmaxBin { mmax, weight }))
    })?;
    Ok(split_table(loaded))
}

pub fn read_completeness_table<R: Read>(
    reader: R,
) -> Result<(ZoneTable<CompletenessPeriod>, Loaded<()>), AppError> {
    let loaded = read_rows(reader, "completeness table", &["zone_id", "mc", "start_year"], |record, map| {
        let id = get_required(record, map, "zone_id")?.to_string();
        Ok((
            id,
            CompletenessPeriod {
                magnitude: parse_f64_field(record, map, "mc")?,
                start_year: parse_f64_field(record, map, "start_year")?,
            },
        ))
    })?;
    let (mut table, report) = split_table(loaded);
    for periods in table.values_mut() {
        periods.sort_by(|a, b| a.start_year.total_cmp(&b.start_year));
    }
    Ok((table, report))
}

/// Group keyed rows; the returned `Loaded<()>` carries only the row report.
fn split_table<T>(loaded: Loaded<(String, T)>) -> (ZoneTable<T>, Loaded<()>) {
    let report = Loaded {
        rows: vec![(); loaded.rows.len()],
        row_errors: loaded.row_errors,
        rows_read: loaded.rows_read,
    };
    (group_by_zone(loaded.rows), report)
}

pub fn read_scalar_strain<R: Read>(reader: R) -> Result<Loaded<ScalarStrainSample>, AppError> {
    read_rows(reader, "scalar strain grid", &["lon", "lat", "strain"], |record, map| {
        Ok(ScalarStrainSample {
            lon: parse_lon_field(record, map, "lon")?,
            lat: parse_lat_field(record, map, "lat")?,
            value: parse_f64_field(record, map, "strain")?,
        })
    })
}

pub fn read_tensor_strain<R: Read>(reader: R) -> Result<Loaded<TensorStrainSample>, AppError> {
    read_rows(reader, "tensor strain grid", &["lon", "lat", "epp", "ett", "ept"], |record, map| {
        Ok(TensorStrainSample {
            lon: parse_lon_field(record, map, "lon")?,
            lat: parse_lat_field(record, map, "lat")?,
            epp: parse_f64_field(record, map, "epp")?,
            ett: parse_f64_field(record, map, "ett")?,
            ept: parse_f64_field(record, map, "ept")?,
        })
    })
}

pub fn read_regime_polygons<R: Read>(reader: R) -> Result<Loaded<RegimePolygonRecord>, AppError> {
    let columns: Vec<(String, String)> = (1..=REGIME_POLYGON_VERTICES)
        .map(|i| (format!("lon{i}"), format!("lat{i}")))
        .collect();
    let mut required = vec!["regime"];
    for (lon, lat) in &columns {
        required.push(lon.as_str());
        required.push(lat.as_str());
    }

    read_rows(reader, "regime polygons", &required, |record, map| {
        let code = get_required(record, map, "regime")?.to_string();
        let vertices = columns
            .iter()
            .map(|(lon, lat)| {
                Ok(LonLat::new(
                    parse_lon_field(record, map, lon)?,
                    parse_lat_field(record, map, lat)?,
                ))
            })
            .collect::<Result<Vec<_>, String>>()?;
        Ok(RegimePolygonRecord { code, vertices })
    })
}

/// Apply Mmax bins and completeness histories to zones by id.
///
/// The highest-weight bin becomes the zone's Mmax. Zones with several bins
/// and no explicit priors get a prior block carrying all of them.
pub fn apply_zone_tables(
    zones: &mut [Zone],
    mmax: Option<&ZoneTable<MmaxBin>>,
    completeness: Option<&ZoneTable<CompletenessPeriod>>,
) {
    {
        let known: HashSet<&str> = zones.iter().map(|z| z.id.as_str()).collect();
        let table_ids = mmax
            .into_iter()
            .flat_map(|t| t.keys())
            .chain(completeness.into_iter().flat_map(|t| t.keys()));
        for id in table_ids {
            if !known.contains(id.as_str()) {
                warn!(zone = %id, "table row refers to an unknown zone");
            }
        }
    }

    for zone in zones.iter_mut() {
        if let Some(periods) = completeness.and_then(|t| t.get(&zone.id)) {
            zone.completeness = periods.clone();
        }
        if let Some(bins) = mmax.and_then(|t| t.get(&zone.id)) {
            if let Some(best) = bins.iter().copied().reduce(|a, b| if b.weight > a.weight { b } else { a }) {
                zone.mmax = best.mmax;
            }
            if bins.len() > 1 && zone.priors.is_none() {
                let (mut priors, _) = ZonePriors::for_zone(zone);
                priors.mmax_bins = bins.clone();
                zone.priors = Some(priors);
            }
        }
    }
}

pub fn load_mmax_table(path: &Path) -> Result<(ZoneTable<MmaxBin>, Loaded<()>), AppError> {
    read_mmax_table(open_data_file(path)?)
}

pub fn load_completeness_table(path: &Path) -> Result<(ZoneTable<CompletenessPeriod>, Loaded<()>), AppError> {
    read_completeness_table(open_data_file(path)?)
}

pub fn load_scalar_strain(path: &Path) -> Result<Loaded<ScalarStrainSample>, AppError> {
    read_scalar_strain(open_data_file(path)?)
}

pub fn load_tensor_strain(path: &Path) -> Result<Loaded<TensorStrainSample>, AppError> {
    read_tensor_strain(open_data_file(path)?)
}

pub fn load_regime_polygons(path: &Path) -> Result<Loaded<RegimePolygonRecord>, AppError> {
    read_regime_polygons(open_data_file(path)?)
}
