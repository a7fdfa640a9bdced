//! Regime constants and the coarse deformation-regime map.

use geo::{Intersects, MultiPolygon, Point};
use tracing::warn;

use crate::domain::{CoarseRegime, FineRegime, LonLat, RegimeParameters};
use crate::geometry::ZonePolygon;

/// Coupled thickness / corner magnitude per fine regime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimeTable {
    entries: [(FineRegime, RegimeParameters); 6],
}

const fn params(cz_km: f64, corner_mag: f64) -> RegimeParameters {
    RegimeParameters { cz_km, corner_mag }
}

impl RegimeTable {
    /// Plate-boundary class values after Bird & Kagan (2004).
    pub const BIRD_KAGAN: RegimeTable = RegimeTable {
        entries: [
            (FineRegime::Crb, params(3.0, 7.64)),
            (FineRegime::Ctf, params(8.6, 8.01)),
            (FineRegime::Ccb, params(18.0, 8.46)),
            (FineRegime::Osr, params(0.13, 5.86)),
            (FineRegime::Otf, params(1.8, 6.55)),
            (FineRegime::Ocb, params(13.0, 8.04)),
        ],
    };

    pub fn get(&self, regime: FineRegime) -> RegimeParameters {
        let idx = match regime {
            FineRegime::Crb => 0,
            FineRegime::Ctf => 1,
            FineRegime::Ccb => 2,
            FineRegime::Osr => 3,
            FineRegime::Otf => 4,
            FineRegime::Ocb => 5,
        };
        self.entries[idx].1
    }

    /// Thickness used by the scalar (Barba) estimator, which only knows the
    /// coarse regime: transform values for both classes.
    pub fn scalar_thickness(&self, coarse: CoarseRegime) -> f64 {
        match coarse {
            CoarseRegime::Continental => self.get(FineRegime::Ctf).cz_km,
            CoarseRegime::RidgeTransform => self.get(FineRegime::Otf).cz_km,
        }
    }
}

impl Default for RegimeTable {
    fn default() -> Self {
        Self::BIRD_KAGAN
    }
}

/// One fixed-size polygon of the regime dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct RegimePolygonRecord {
    pub code: String,
    pub vertices: Vec<LonLat>,
}

/// Result of looking a point up in the regime map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegimeLookup {
    Known(CoarseRegime),
    /// Inside a polygon whose code is neither `C` nor `R`.
    Other(String),
    Outside,
}

/// Union of regime polygons per coarse code.
///
/// Membership includes cell boundaries, so a point on an edge shared by two
/// cells of the same code belongs to that code.
#[derive(Debug, Clone)]
pub struct DeformationRegimeMap {
    continental: MultiPolygon<f64>,
    ridge: MultiPolygon<f64>,
    other: Vec<(String, MultiPolygon<f64>)>,
}

impl Default for DeformationRegimeMap {
    fn default() -> Self {
        Self {
            continental: MultiPolygon::new(vec![]),
            ridge: MultiPolygon::new(vec![]),
            other: Vec::new(),
        }
    }
}

impl DeformationRegimeMap {
    /// Build the per-code unions. Degenerate records are logged and skipped.
    pub fn from_records(records: &[RegimePolygonRecord]) -> Self {
        let mut continental = Vec::new();
        let mut ridge = Vec::new();
        let mut other: Vec<(String, Vec<geo::Polygon<f64>>)> = Vec::new();

        for (idx, record) in records.iter().enumerate() {
            let owner = format!("regime record {}", idx + 1);
            let poly = match ZonePolygon::from_vertices(&owner, &record.vertices) {
                Ok(p) => p.as_geo().clone(),
                Err(e) => {
                    warn!("skipping {owner}: {e}");
                    continue;
                }
            };
            match CoarseRegime::from_code(&record.code) {
                Some(CoarseRegime::Continental) => continental.push(poly),
                Some(CoarseRegime::RidgeTransform) => ridge.push(poly),
                None => {
                    let code = record.code.trim().to_string();
                    match other.iter_mut().find(|(c, _)| *c == code) {
                        Some((_, polys)) => polys.push(poly),
                        None => other.push((code, vec![poly])),
                    }
                }
            }
        }

        Self {
            continental: MultiPolygon::new(continental),
            ridge: MultiPolygon::new(ridge),
            other: other
                .into_iter()
                .map(|(code, polys)| (code, MultiPolygon::new(polys)))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.continental.0.is_empty() && self.ridge.0.is_empty() && self.other.is_empty()
    }

    pub fn lookup(&self, p: LonLat) -> RegimeLookup {
        let point = Point::new(p.lon, p.lat);
        if self.continental.intersects(&point) {
            return RegimeLookup::Known(CoarseRegime::Continental);
        }
        if self.ridge.intersects(&point) {
            return RegimeLookup::Known(CoarseRegime::RidgeTransform);
        }
        for (code, polys) in &self.other {
            if polys.intersects(&point) {
                return RegimeLookup::Other(code.clone());
            }
        }
        RegimeLookup::Outside
    }

    /// Coarse regime with the Continental fallback.
    ///
    /// The flag is `true` when the fallback was used (outside every union or
    /// an unrecognised code). Points beyond the dataset grid land here.
    pub fn coarse_or_continental(&self, p: LonLat) -> (CoarseRegime, bool) {
        match self.lookup(p) {
            RegimeLookup::Known(regime) => (regime, false),
            RegimeLookup::Other(_) | RegimeLookup::Outside => (CoarseRegime::Continental, true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn box_record(code: &str, lon0: f64, lat0: f64) -> RegimePolygonRecord {
        RegimePolygonRecord {
            code: code.to_string(),
            vertices: vec![
                LonLat::new(lon0, lat0),
                LonLat::new(lon0 + 1.0, lat0),
                LonLat::new(lon0 + 1.0, lat0 + 1.0),
                LonLat::new(lon0, lat0 + 1.0),
                LonLat::new(lon0, lat0),
            ],
        }
    }

    #[test]
    fn table_has_six_distinct_entries() {
        let table = RegimeTable::BIRD_KAGAN;
        for regime in FineRegime::ALL {
            assert!(table.get(regime).cz_km > 0.0, "{}", regime.code());
        }
        assert_eq!(table.scalar_thickness(CoarseRegime::Continental), 8.6);
        assert_eq!(table.scalar_thickness(CoarseRegime::RidgeTransform), 1.8);
    }

    #[test]
    fn lookup_by_union() {
        let map = DeformationRegimeMap::from_records(&[
            box_record("C", 0.0, 0.0),
            box_record("C", 1.0, 0.0),
            box_record("R", 10.0, 0.0),
            box_record("X", 20.0, 0.0),
        ]);
        assert_eq!(map.lookup(LonLat::new(1.5, 0.5)), RegimeLookup::Known(CoarseRegime::Continental));
        assert_eq!(map.lookup(LonLat::new(10.5, 0.5)), RegimeLookup::Known(CoarseRegime::RidgeTransform));
        assert_eq!(map.lookup(LonLat::new(20.5, 0.5)), RegimeLookup::Other("X".to_string()));
        assert_eq!(map.lookup(LonLat::new(50.0, 50.0)), RegimeLookup::Outside);
    }

    #[test]
    fn shared_edge_belongs_to_the_code() {
        let map = DeformationRegimeMap::from_records(&[box_record("R", 0.0, 0.0), box_record("R", 1.0, 0.0)]);
        assert_eq!(map.lookup(LonLat::new(1.0, 0.5)), RegimeLookup::Known(CoarseRegime::RidgeTransform));
        assert_eq!(
            map.coarse_or_continental(LonLat::new(1.0, 0.5)),
            (CoarseRegime::RidgeTransform, false)
        );
        // Outer corner of the tiling.
        assert_eq!(map.lookup(LonLat::new(2.0, 1.0)), RegimeLookup::Known(CoarseRegime::RidgeTransform));
    }

    #[test]
    fn empty_map_is_default() {
        let map = DeformationRegimeMap::default();
        assert!(map.is_empty());
        assert_eq!(map.lookup(LonLat::new(0.0, 0.0)), RegimeLookup::Outside);
    }

    #[test]
    fn unknown_points_fall_back_to_continental() {
        let map = DeformationRegimeMap::from_records(&[box_record("R", 0.0, 0.0)]);
        assert_eq!(
            map.coarse_or_continental(LonLat::new(0.5, 0.5)),
            (CoarseRegime::RidgeTransform, false)
        );
        assert_eq!(
            map.coarse_or_continental(LonLat::new(5.0, 5.0)),
            (CoarseRegime::Continental, true)
        );
    }
}
