//! Synthetic Gutenberg-Richter catalogs for demos and tests.
//!
//! Event count is Poisson with the mean implied by `(a, b)` over the window,
//! magnitudes follow the exponential law truncated to `[mmin, mmax]`, origin
//! times are uniform and epicentres are rejection-sampled inside a polygon.

use chrono::{Duration, NaiveDate};
use geo::BoundingRect;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{Exp, Poisson};
use std::f64::consts::LN_10;

use crate::catalog::EventCatalog;
use crate::domain::{CatalogEvent, LonLat};
use crate::error::AppError;
use crate::geometry::ZonePolygon;

/// Largest expected event count accepted.
const MAX_EXPECTED_EVENTS: f64 = 1.0e6;
const MAX_LOCATION_ATTEMPTS: usize = 10_000;
const SECONDS_PER_YEAR: f64 = 365.25 * 86_400.0;

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticCatalogSpec {
    /// Annual cumulative a-value.
    pub a: f64,
    pub b: f64,
    pub mmin: f64,
    pub mmax: f64,
    pub start_year: i32,
    pub years: f64,
    pub min_depth_km: f64,
    pub max_depth_km: f64,
    pub seed: u64,
}

impl SyntheticCatalogSpec {
    /// Mean number of events in `[mmin, mmax]` over the window.
    pub fn expected_count(&self) -> f64 {
        let above_min = 10f64.powf(self.a - self.b * self.mmin);
        let above_max = 10f64.powf(self.a - self.b * self.mmax);
        self.years * (above_min - above_max)
    }

    fn validate(&self) -> Result<(), AppError> {
        if !(self.b.is_finite() && self.b > 0.0) {
            return Err(AppError::input(format!("b-value must be positive (b={}).", self.b)));
        }
        if !(self.mmin.is_finite() && self.mmax.is_finite() && self.mmax > self.mmin) {
            return Err(AppError::input(format!(
                "Magnitude range {}..{} is empty.",
                self.mmin, self.mmax
            )));
        }
        if !(self.years.is_finite() && self.years > 0.0) {
            return Err(AppError::input(format!("Catalog length must be positive ({} years).", self.years)));
        }
        if !(self.min_depth_km >= 0.0 && self.max_depth_km >= self.min_depth_km) {
            return Err(AppError::input(format!(
                "Invalid depth range {}..{} km.",
                self.min_depth_km, self.max_depth_km
            )));
        }
        let expected = self.expected_count();
        if !(expected.is_finite() && expected <= MAX_EXPECTED_EVENTS) {
            return Err(AppError::input(format!(
                "Expected event count {expected:.0} is too large; lower `a` or the window."
            )));
        }
        Ok(())
    }
}

/// Generate a catalog whose epicentres lie inside `region`.
pub fn generate_catalog(spec: &SyntheticCatalogSpec, region: &ZonePolygon) -> Result<EventCatalog, AppError> {
    spec.validate()?;

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let expected = spec.expected_count();
    let count = if expected > 0.0 {
        let poisson = Poisson::new(expected)
            .map_err(|e| AppError::internal(format!("Poisson({expected}) unavailable: {e}")))?;
        poisson.sample(&mut rng) as usize
    } else {
        0
    };

    let magnitudes = Exp::new(spec.b * LN_10)
        .map_err(|e| AppError::internal(format!("Exp(b ln10) unavailable: {e}")))?;
    let bbox = region
        .as_geo()
        .bounding_rect()
        .ok_or_else(|| AppError::internal("Region polygon has no bounding box."))?;
    let start = NaiveDate::from_ymd_opt(spec.start_year, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| AppError::input(format!("Invalid start year {}.", spec.start_year)))?;
    let window_secs = spec.years * SECONDS_PER_YEAR;

    let mut events = Vec::with_capacity(count);
    for _ in 0..count {
        let mag = loop {
            let m = spec.mmin + magnitudes.sample(&mut rng);
            if m <= spec.mmax {
                break m;
            }
        };

        let mut location = None;
        for _ in 0..MAX_LOCATION_ATTEMPTS {
            let p = LonLat::new(
                rng.gen_range(bbox.min().x..=bbox.max().x),
                rng.gen_range(bbox.min().y..=bbox.max().y),
            );
            if region.contains(p) {
                location = Some(p);
                break;
            }
        }
        let location = location.ok_or_else(|| {
            AppError::input("Could not place an epicentre inside the region; polygon too thin.")
        })?;

        let offset = rng.gen_range(0.0..window_secs);
        events.push(CatalogEvent {
            time: start + Duration::milliseconds((offset * 1000.0) as i64),
            lon: location.lon,
            lat: location.lat,
            depth: rng.gen_range(spec.min_depth_km..=spec.max_depth_km),
            mag: (mag * 100.0).round() / 100.0,
        });
    }

    Ok(EventCatalog::new(events))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region() -> ZonePolygon {
        ZonePolygon::from_vertices(
            "r",
            &[
                LonLat::new(7.0, 46.0),
                LonLat::new(9.0, 46.0),
                LonLat::new(8.0, 47.5),
            ],
        )
        .unwrap()
    }

    fn spec() -> SyntheticCatalogSpec {
        SyntheticCatalogSpec {
            a: 4.0,
            b: 1.0,
            mmin: 3.0,
            mmax: 6.5,
            start_year: 1950,
            years: 50.0,
            min_depth_km: 2.0,
            max_depth_km: 20.0,
            seed: 7,
        }
    }

    #[test]
    fn same_seed_same_catalog() {
        let a = generate_catalog(&spec(), &region()).unwrap();
        let b = generate_catalog(&spec(), &region()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn events_respect_bounds() {
        let catalog = generate_catalog(&spec(), &region()).unwrap();
        // Mean is 50 * (10 - 10^-2.5) ~ 500.
        assert!(catalog.size() > 400 && catalog.size() < 600, "n={}", catalog.size());
        let poly = region();
        for e in catalog.events() {
            assert!(e.mag >= 3.0 && e.mag <= 6.5);
            assert!(e.depth >= 2.0 && e.depth <= 20.0);
            assert!(poly.contains(LonLat::new(e.lon, e.lat)));
        }
        assert!(catalog.time_span_years().unwrap() < 50.0);
    }

    #[test]
    fn magnitudes_follow_the_b_value() {
        let mut s = spec();
        s.a = 5.0;
        let catalog = generate_catalog(&s, &region()).unwrap();
        let above_4 = catalog.events().iter().filter(|e| e.mag >= 4.0).count() as f64;
        let ratio = above_4 / catalog.size() as f64;
        // b = 1: about one event in ten is a unit above mmin.
        assert!((ratio - 0.1).abs() < 0.02, "ratio={ratio}");
    }

    #[test]
    fn invalid_specs_are_rejected() {
        let mut s = spec();
        s.mmax = 2.0;
        assert!(generate_catalog(&s, &region()).is_err());

        let mut s = spec();
        s.a = 12.0;
        assert!(generate_catalog(&s, &region()).is_err());
    }
}
