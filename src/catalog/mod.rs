//! In-memory earthquake catalog.
//!
//! The engine reads catalogs only through filtered views: `cut` returns a new
//! catalog restricted to a region and a depth/magnitude window, and the
//! caller asks it for `size`, `time_span_years` or its events.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{Datelike, Timelike};

use crate::domain::{CatalogEvent, LonLat};
use crate::error::AppError;
use crate::geometry::ZonePolygon;

const DAYS_PER_YEAR: f64 = 365.25;

/// Spatial restriction of a catalog cut.
#[derive(Debug, Clone, Copy)]
pub enum CutRegion<'a> {
    Polygon(&'a ZonePolygon),
    /// Polygon grown by a buffer distance in km.
    Buffered(&'a ZonePolygon, f64),
}

impl CutRegion<'_> {
    fn admits(&self, p: LonLat) -> bool {
        match self {
            CutRegion::Polygon(poly) => poly.contains(p),
            CutRegion::Buffered(poly, km) => poly.contains_within(p, *km),
        }
    }
}

/// Event filter; `None` bounds are open.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogFilter<'a> {
    pub region: Option<CutRegion<'a>>,
    pub min_depth: Option<f64>,
    pub max_depth: Option<f64>,
    pub min_mag: Option<f64>,
    pub max_mag: Option<f64>,
    /// Treat `max_mag` as an exclusive bound.
    pub max_mag_exclusive: bool,
}

impl CatalogFilter<'_> {
    fn admits(&self, e: &CatalogEvent) -> bool {
        if self.min_depth.is_some_and(|d| e.depth < d) || self.max_depth.is_some_and(|d| e.depth > d) {
            return false;
        }
        if self.min_mag.is_some_and(|m| e.mag < m) {
            return false;
        }
        if let Some(m) = self.max_mag {
            let over = if self.max_mag_exclusive { e.mag >= m } else { e.mag > m };
            if over {
                return false;
            }
        }
        match &self.region {
            Some(region) => region.admits(LonLat::new(e.lon, e.lat)),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventCatalog {
    events: Vec<CatalogEvent>,
}

impl EventCatalog {
    /// Build a catalog; events are kept in origin-time order.
    pub fn new(mut events: Vec<CatalogEvent>) -> Self {
        events.sort_by_key(|e| e.time);
        Self { events }
    }

    pub fn cut(&self, filter: &CatalogFilter<'_>) -> EventCatalog {
        Self {
            events: self.events.iter().filter(|e| filter.admits(e)).copied().collect(),
        }
    }

    pub fn size(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[CatalogEvent] {
        &self.events
    }

    /// Years between the first and the last event.
    ///
    /// Returns `None` for catalogs that cannot define a positive span.
    pub fn time_span_years(&self) -> Option<f64> {
        let first = self.events.first()?;
        let last = self.events.last()?;
        let seconds = (last.time - first.time).num_seconds() as f64;
        let years = seconds / 86_400.0 / DAYS_PER_YEAR;
        (years > 0.0).then_some(years)
    }

    /// Write the whitespace-separated catalog file read by the activity solver.
    ///
    /// Columns: year month day hour minute second lat lon depth mag.
    pub fn write_solver_file(&self, path: &Path) -> Result<(), AppError> {
        let file = File::create(path).map_err(|e| AppError::io(path, e))?;
        let mut out = BufWriter::new(file);
        for e in &self.events {
            let t = e.time;
            let second = t.second() as f64 + t.nanosecond() as f64 / 1.0e9;
            writeln!(
                out,
                "{} {} {} {} {} {:.2} {:.4} {:.4} {:.1} {:.2}",
                t.year(),
                t.month(),
                t.day(),
                t.hour(),
                t.minute(),
                second,
                e.lat,
                e.lon,
                e.depth,
                e.mag
            )
            .map_err(|err| AppError::io(path, err))?;
        }
        out.flush().map_err(|err| AppError::io(path, err))?;
        Ok(())
    }
}
