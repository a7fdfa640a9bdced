//! Validated zone polygons over `geo`, with spherical area and buffered
//! membership tests.

use geo::{
    Centroid, ChamberlainDuquetteArea, Closest, ClosestPoint, Contains, HaversineDistance,
    Intersects, LineString, Point, Polygon,
};

use crate::domain::LonLat;
use crate::error::AppError;

/// A validated, simple lon/lat polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct ZonePolygon {
    polygon: Polygon<f64>,
}

impl ZonePolygon {
    /// Build a polygon from a vertex ring.
    ///
    /// A duplicated closing vertex is dropped before validation. At least three
    /// distinct, finite vertices spanning a non-zero area are required.
    pub fn from_vertices(owner: &str, vertices: &[LonLat]) -> Result<Self, AppError> {
        let mut ring = vertices.to_vec();
        if ring.len() >= 2 && ring.first() == ring.last() {
            ring.pop();
        }

        if let Some(bad) = ring
            .iter()
            .find(|v| !(v.lon.is_finite() && v.lat.is_finite()) || v.lat.abs() > 90.0)
        {
            return Err(AppError::geometry(
                owner,
                format!("invalid vertex ({}, {})", bad.lon, bad.lat),
            ));
        }
        if ring.len() < 3 {
            return Err(AppError::geometry(
                owner,
                format!("{} vertices after closing-vertex removal (need >= 3)", ring.len()),
            ));
        }
        if planar_area(&ring).abs() < 1e-12 {
            return Err(AppError::geometry(owner, "vertices are collinear (zero area)"));
        }

        let exterior: LineString<f64> = ring.iter().map(|v| (v.lon, v.lat)).collect::<Vec<_>>().into();
        Ok(Self {
            polygon: Polygon::new(exterior, vec![]),
        })
    }

    /// Ring vertices in input order, without the closing vertex.
    pub fn vertices(&self) -> Vec<LonLat> {
        let coords = &self.polygon.exterior().0;
        let open = coords.len().saturating_sub(1);
        coords[..open].iter().map(|c| LonLat::new(c.x, c.y)).collect()
    }

    pub fn vertex_count(&self) -> usize {
        self.polygon.exterior().0.len().saturating_sub(1)
    }

    /// Strict interior membership (boundary points are outside).
    pub fn contains(&self, p: LonLat) -> bool {
        self.polygon.contains(&Point::new(p.lon, p.lat))
    }

    /// Membership in the polygon grown by `buffer_km`.
    pub fn contains_within(&self, p: LonLat, buffer_km: f64) -> bool {
        if self.contains(p) {
            return true;
        }
        buffer_km > 0.0 && self.distance_km(p) <= buffer_km
    }

    /// Great-circle distance from `p` to the nearest point of the polygon.
    pub fn distance_km(&self, p: LonLat) -> f64 {
        let point = Point::new(p.lon, p.lat);
        match self.polygon.closest_point(&point) {
            Closest::Intersection(_) => 0.0,
            Closest::SinglePoint(q) => point.haversine_distance(&q) / 1000.0,
            Closest::Indeterminate => f64::INFINITY,
        }
    }

    pub fn intersects(&self, other: &ZonePolygon) -> bool {
        self.polygon.intersects(&other.polygon)
    }

    pub fn centroid(&self) -> Option<LonLat> {
        self.polygon.centroid().map(|c| LonLat::new(c.x(), c.y()))
    }

    /// Area on the sphere in m².
    pub fn area_m2(&self) -> f64 {
        self.polygon.chamberlain_duquette_unsigned_area()
    }

    pub fn area_km2(&self) -> f64 {
        self.area_m2() / 1.0e6
    }

    pub fn as_geo(&self) -> &Polygon<f64> {
        &self.polygon
    }
}

/// Shoelace area in squared degrees (signed).
fn planar_area(ring: &[LonLat]) -> f64 {
    let n = ring.len();
    let mut twice = 0.0;
    for i in 0..n {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        twice += a.lon * b.lat - b.lon * a.lat;
    }
    twice / 2.0
}

/// Normalize a longitude given in `[0, 360)` to `(-180, 180]`.
pub fn normalize_lon(lon: f64) -> f64 {
    if lon > 180.0 { lon - 360.0 } else { lon }
}
