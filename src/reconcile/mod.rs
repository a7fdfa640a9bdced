//! Per-zone moment-rate reconciliation.
//!
//! Four independent estimates are computed for each zone and returned side
//! by side; nothing here averages or weights them.
//!
//! - catalog: Kanamori moments of the cut catalog / (area * span)
//! - activity: GR integral per posterior sample / span (and * area)
//! - strain: Barba scalar grid and Bird tensor grid over the zone
//! - slip: slip-rate brackets of intersecting faults / span

use tracing::{debug, warn};

use crate::catalog::{CatalogFilter, CutRegion, EventCatalog};
use crate::config::{CatalogRegion, PhysicalConstants, ReconcileConfig};
use crate::domain::{
    ActivitySample, Estimate, FaultSource, MomentRateEstimate, ScalarStrainSample, SlipRange,
    TensorStrainSample, Zone,
};
use crate::error::AppError;
use crate::geometry::ZonePolygon;
use crate::models::{magnitude_to_moment, moment_rate_from_activity, moment_rate_from_slip};
use crate::strain::{
    DeformationRegimeMap, RegimeTable, StrainClassifier, StrainIntegral, scalar_moment_rate,
    tensor_moment_rate,
};

const CATALOG: &str = "fromCatalog";
const SLIP: &str = "fromSlip";

/// Strain datasets; either grid may be absent.
#[derive(Debug, Clone, Default)]
pub struct StrainDatasets {
    pub scalar: Option<Vec<ScalarStrainSample>>,
    pub tensor: Option<Vec<TensorStrainSample>>,
    pub regimes: DeformationRegimeMap,
}

/// A fault whose outline passed validation.
#[derive(Debug, Clone)]
struct PreparedFault {
    source: FaultSource,
    polygon: ZonePolygon,
}

/// Reconciled estimates plus notes for the zone record.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneMoment {
    pub estimate: MomentRateEstimate,
    pub notes: Vec<String>,
}

pub struct MomentRateReconciler<'a> {
    config: &'a ReconcileConfig,
    constants: &'a PhysicalConstants,
    table: &'a RegimeTable,
    catalog: &'a EventCatalog,
    strain: &'a StrainDatasets,
    faults: Vec<PreparedFault>,
    span_years: Option<f64>,
}

impl<'a> MomentRateReconciler<'a> {
    /// Prepare shared state for a batch: validated fault outlines and the
    /// catalog time span of the depth/magnitude window.
    pub fn new(
        config: &'a ReconcileConfig,
        constants: &'a PhysicalConstants,
        table: &'a RegimeTable,
        catalog: &'a EventCatalog,
        strain: &'a StrainDatasets,
        faults: &[FaultSource],
    ) -> Self {
        let faults = faults
            .iter()
            .filter_map(|fault| match ZonePolygon::from_vertices(&fault.id, &fault.vertices) {
                Ok(polygon) => Some(PreparedFault {
                    source: fault.clone(),
                    polygon,
                }),
                Err(e) => {
                    warn!("skipping fault: {e}");
                    None
                }
            })
            .collect();

        let span_years = config
            .span_years
            .or_else(|| catalog.cut(&window_filter(config, None)).time_span_years());
        debug!(?span_years, "catalog time span");

        Self {
            config,
            constants,
            table,
            catalog,
            strain,
            faults,
            span_years,
        }
    }

    pub fn span_years(&self) -> Option<f64> {
        self.span_years
    }

    /// All four estimates for one zone.
    ///
    /// `activity` carries the zone's posterior samples, or the reason they
    /// are missing.
    pub fn reconcile(
        &self,
        zone: &Zone,
        polygon: &ZonePolygon,
        area_km2: f64,
        activity: Result<&[ActivitySample], &str>,
    ) -> ZoneMoment {
        let mut notes = Vec::new();

        let from_catalog = self
            .from_catalog(zone, polygon, area_km2, &mut notes)
            .map_err(|e| e.with_zone(&zone.id))
            .into();

        let (from_activity, from_activity_area) = match activity {
            Ok(samples) => match self.from_activity(zone, samples) {
                Ok(rates) => {
                    let scaled = rates.iter().map(|r| r * area_km2).collect();
                    (Estimate::Available { value: rates }, Estimate::Available { value: scaled })
                }
                Err(e) => {
                    let reason = e.with_zone(&zone.id).to_string();
                    (Estimate::unavailable(reason.clone()), Estimate::unavailable(reason))
                }
            },
            Err(reason) => (Estimate::unavailable(reason), Estimate::unavailable(reason)),
        };

        let classifier = StrainClassifier::new(self.table, self.constants);
        let from_strain_barba = match &self.strain.scalar {
            Some(samples) => strain_estimate(
                zone,
                scalar_moment_rate(polygon, samples, &self.strain.regimes, &classifier),
                &mut notes,
            ),
            None => Estimate::unavailable("scalar strain dataset not loaded"),
        };
        let from_strain_bird = match &self.strain.tensor {
            Some(samples) => strain_estimate(
                zone,
                tensor_moment_rate(polygon, samples, &self.strain.regimes, &classifier),
                &mut notes,
            ),
            None => Estimate::unavailable("tensor strain dataset not loaded"),
        };

        let from_slip = self
            .from_slip(polygon, &mut notes)
            .map_err(|e| e.with_zone(&zone.id))
            .into();

        ZoneMoment {
            estimate: MomentRateEstimate {
                from_catalog,
                from_activity,
                from_activity_area,
                from_strain_barba,
                from_strain_bird,
                from_slip,
            },
            notes,
        }
    }

    fn span(&self, estimator: &'static str) -> Result<f64, AppError> {
        self.span_years
            .ok_or_else(|| AppError::numeric(estimator, "catalog time span is undefined"))
    }

    fn from_catalog(
        &self,
        zone: &Zone,
        polygon: &ZonePolygon,
        area_km2: f64,
        notes: &mut Vec<String>,
    ) -> Result<f64, AppError> {
        let background;
        let region = match self.config.region {
            CatalogRegion::Zone => CutRegion::Polygon(polygon),
            CatalogRegion::Buffer { km } => CutRegion::Buffered(polygon, km),
            CatalogRegion::Background => {
                match zone
                    .background
                    .as_deref()
                    .map(|v| ZonePolygon::from_vertices(&zone.id, v))
                {
                    Some(Ok(poly)) => {
                        background = poly;
                        CutRegion::Polygon(&background)
                    }
                    Some(Err(e)) => {
                        notes.push(format!("background polygon unusable ({e}); catalog cut to zone"));
                        CutRegion::Polygon(polygon)
                    }
                    None => {
                        notes.push("no background polygon; catalog cut to zone".to_string());
                        CutRegion::Polygon(polygon)
                    }
                }
            }
        };

        let subset = self.catalog.cut(&window_filter(self.config, Some(region)));
        if subset.is_empty() {
            return Err(AppError::numeric(CATALOG, "no catalog events in the zone window"));
        }
        if !(area_km2.is_finite() && area_km2 > 0.0) {
            return Err(AppError::numeric(CATALOG, format!("invalid zone area {area_km2} km²")));
        }
        let span = self.span(CATALOG)?;

        let total: f64 = subset
            .events()
            .iter()
            .map(|e| magnitude_to_moment(e.mag, self.constants))
            .sum();
        debug!(zone = %zone.id, events = subset.size(), total, "catalog moment sum");
        Ok(total / (area_km2 * span))
    }

    fn from_activity(&self, zone: &Zone, samples: &[ActivitySample]) -> Result<Vec<f64>, AppError> {
        const NAME: &str = "fromActivity";
        if samples.is_empty() {
            return Err(AppError::numeric(NAME, "posterior block is empty"));
        }
        let span = self.span(NAME)?;
        samples
            .iter()
            .map(|s| {
                moment_rate_from_activity(s.a, s.b, zone.mmax, self.config.reference_mmin, self.constants)
                    .map(|rate| rate / span)
            })
            .collect()
    }

    fn from_slip(&self, polygon: &ZonePolygon, notes: &mut Vec<String>) -> Result<SlipRange, AppError> {
        let mut total = SlipRange { min: 0.0, max: 0.0 };
        let mut used = 0usize;

        for fault in self.faults.iter().filter(|f| f.polygon.intersects(polygon)) {
            let area = fault.source.area_m2.unwrap_or_else(|| fault.polygon.area_m2());
            match moment_rate_from_slip(fault.source.slip_min, fault.source.slip_max, area, self.constants) {
                Ok(range) => {
                    total.min += range.min;
                    total.max += range.max;
                    used += 1;
                }
                Err(e) => notes.push(format!("fault {} ignored: {e}", fault.source.id)),
            }
        }

        if used == 0 {
            return Err(AppError::numeric(SLIP, "no usable fault intersects the zone"));
        }
        let span = self.span(SLIP)?;
        Ok(SlipRange {
            min: total.min / span,
            max: total.max / span,
        })
    }
}

/// Depth and magnitude window of the configuration, optionally restricted
/// to a region.
pub(crate) fn window_filter<'r>(config: &ReconcileConfig, region: Option<CutRegion<'r>>) -> CatalogFilter<'r> {
    CatalogFilter {
        region,
        min_depth: Some(config.min_depth_km),
        max_depth: Some(config.max_depth_km),
        min_mag: Some(config.mmin),
        max_mag: config.max_mag,
        max_mag_exclusive: config.max_mag_exclusive,
    }
}

fn strain_estimate(
    zone: &Zone,
    result: Result<StrainIntegral, AppError>,
    notes: &mut Vec<String>,
) -> Estimate<f64> {
    match result {
        Ok(integral) => {
            if integral.continental_fallbacks > 0 {
                // Unknown-regime points default to continental; kept under review.
                let msg = format!(
                    "{} of {} strain samples outside the regime map treated as continental",
                    integral.continental_fallbacks, integral.samples_used
                );
                warn!(zone = %zone.id, "{msg}");
                notes.push(msg);
            }
            Estimate::Available {
                value: integral.moment_rate,
            }
        }
        Err(e) => Estimate::unavailable(e.with_zone(&zone.id).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::testing::square_zone;
    use crate::domain::{CatalogEvent, LonLat};
    use chrono::NaiveDate;

    const K: PhysicalConstants = PhysicalConstants::STANDARD;

    fn event(year: i32, lon: f64, lat: f64, mag: f64) -> CatalogEvent {
        CatalogEvent {
            time: NaiveDate::from_ymd_opt(year, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
            lon,
            lat,
            depth: 10.0,
            mag,
        }
    }

    fn config() -> ReconcileConfig {
        ReconcileConfig {
            span_years: Some(50.0),
            ..ReconcileConfig::default()
        }
    }

    fn zone() -> (Zone, ZonePolygon) {
        let z = square_zone("z1", 0.0, 0.0, 1.0);
        let p = ZonePolygon::from_vertices(&z.id, &z.vertices).unwrap();
        (z, p)
    }

    #[test]
    fn catalog_sum_divides_by_area_and_span() {
        let catalog = EventCatalog::new(vec![
            event(1970, 0.5, 0.5, 5.0),
            event(1990, 0.4, 0.6, 6.0),
            event(1995, 3.0, 3.0, 6.0),
            event(2000, 0.5, 0.5, 3.0),
        ]);
        let cfg = config();
        let strain = StrainDatasets::default();
        let table = RegimeTable::default();
        let r = MomentRateReconciler::new(&cfg, &K, &table, &catalog, &strain, &[]);
        let (z, p) = zone();

        let out = r.reconcile(&z, &p, 100.0, Err("not requested"));
        let expected = (magnitude_to_moment(5.0, &K) + magnitude_to_moment(6.0, &K)) / (100.0 * 50.0);
        let got = *out.estimate.from_catalog.value().unwrap();
        assert!((got / expected - 1.0).abs() < 1e-12);
        assert_eq!(
            out.estimate.from_activity,
            Estimate::unavailable("not requested")
        );
    }

    #[test]
    fn empty_catalog_window_is_unavailable() {
        let catalog = EventCatalog::new(vec![event(1990, 5.0, 5.0, 6.0)]);
        let cfg = config();
        let strain = StrainDatasets::default();
        let table = RegimeTable::default();
        let r = MomentRateReconciler::new(&cfg, &K, &table, &catalog, &strain, &[]);
        let (z, p) = zone();
        let out = r.reconcile(&z, &p, 100.0, Err("n/a"));
        assert!(!out.estimate.from_catalog.is_available());
    }

    #[test]
    fn buffered_region_admits_nearby_events() {
        // ~0.05 degrees east of the zone edge at the equator, about 5.6 km.
        let catalog = EventCatalog::new(vec![event(1990, 1.05, 0.5, 6.0)]);
        let mut cfg = config();
        cfg.region = CatalogRegion::Buffer { km: 10.0 };
        let strain = StrainDatasets::default();
        let table = RegimeTable::default();
        let r = MomentRateReconciler::new(&cfg, &K, &table, &catalog, &strain, &[]);
        let (z, p) = zone();
        assert!(r.reconcile(&z, &p, 100.0, Err("n/a")).estimate.from_catalog.is_available());
    }

    #[test]
    fn background_region_uses_enclosing_polygon() {
        let catalog = EventCatalog::new(vec![event(1990, 1.5, 0.5, 6.0)]);
        let mut cfg = config();
        cfg.region = CatalogRegion::Background;
        let strain = StrainDatasets::default();
        let table = RegimeTable::default();
        let r = MomentRateReconciler::new(&cfg, &K, &table, &catalog, &strain, &[]);
        let (mut z, p) = zone();
        z.background = Some(square_zone("bg", -1.0, -1.0, 3.0).vertices);
        let out = r.reconcile(&z, &p, 100.0, Err("n/a"));
        assert!(out.estimate.from_catalog.is_available());
        assert!(out.notes.is_empty());

        z.background = None;
        let out = r.reconcile(&z, &p, 100.0, Err("n/a"));
        assert!(!out.estimate.from_catalog.is_available());
        assert_eq!(out.notes.len(), 1);
    }

    #[test]
    fn activity_rates_follow_sample_order() {
        let catalog = EventCatalog::default();
        let cfg = config();
        let strain = StrainDatasets::default();
        let table = RegimeTable::default();
        let r = MomentRateReconciler::new(&cfg, &K, &table, &catalog, &strain, &[]);
        let (z, p) = zone();

        let samples = [
            ActivitySample { weight: 0.5, a: 3.0, b: 1.0 },
            ActivitySample { weight: 0.5, a: 3.5, b: 0.9 },
        ];
        let out = r.reconcile(&z, &p, 10_000.0, Ok(&samples));
        let rates = out.estimate.from_activity.value().unwrap();
        assert_eq!(rates.len(), 2);
        let first = moment_rate_from_activity(3.0, 1.0, 7.0, 5.0, &K).unwrap() / 50.0;
        assert!((rates[0] / first - 1.0).abs() < 1e-12);

        let scaled = out.estimate.from_activity_area.value().unwrap();
        assert!((scaled[0].log10() - 18.4685).abs() < 0.01);
    }

    #[test]
    fn singular_b_marks_activity_unavailable() {
        let catalog = EventCatalog::default();
        let cfg = config();
        let strain = StrainDatasets::default();
        let table = RegimeTable::default();
        let r = MomentRateReconciler::new(&cfg, &K, &table, &catalog, &strain, &[]);
        let (z, p) = zone();
        let samples = [ActivitySample { weight: 1.0, a: 3.0, b: 1.5 }];
        let out = r.reconcile(&z, &p, 100.0, Ok(&samples));
        match &out.estimate.from_activity {
            Estimate::Unavailable { reason } => assert!(reason.contains("z1"), "{reason}"),
            other => panic!("expected unavailable, got {other:?}"),
        }
    }

    #[test]
    fn slip_sums_intersecting_faults() {
        let catalog = EventCatalog::default();
        let cfg = config();
        let strain = StrainDatasets::default();
        let table = RegimeTable::default();
        let fault = |id: &str, lon0: f64| FaultSource {
            id: id.to_string(),
            vertices: vec![
                LonLat::new(lon0, 0.2),
                LonLat::new(lon0 + 0.1, 0.2),
                LonLat::new(lon0 + 0.1, 0.8),
                LonLat::new(lon0, 0.8),
            ],
            slip_min: 1.0,
            slip_max: 5.0,
            area_m2: Some(1.0e9),
        };
        let faults = [fault("in", 0.5), fault("edge", 0.95), fault("out", 4.0)];
        let r = MomentRateReconciler::new(&cfg, &K, &table, &catalog, &strain, &faults);
        let (z, p) = zone();

        let slip = *r.reconcile(&z, &p, 100.0, Err("n/a")).estimate.from_slip.value().unwrap();
        let one = moment_rate_from_slip(1.0, 5.0, 1.0e9, &K).unwrap();
        assert!((slip.min / (2.0 * one.min / 50.0) - 1.0).abs() < 1e-12);
        assert!(slip.max > slip.min);
    }

    #[test]
    fn missing_strain_datasets_are_unavailable() {
        let catalog = EventCatalog::default();
        let cfg = config();
        let strain = StrainDatasets::default();
        let table = RegimeTable::default();
        let r = MomentRateReconciler::new(&cfg, &K, &table, &catalog, &strain, &[]);
        let (z, p) = zone();
        let out = r.reconcile(&z, &p, 100.0, Err("n/a"));
        assert!(!out.estimate.from_strain_barba.is_available());
        assert!(!out.estimate.from_strain_bird.is_available());
        assert!(!out.estimate.from_slip.is_available());
    }

    #[test]
    fn strain_fallbacks_are_noted() {
        let catalog = EventCatalog::default();
        let cfg = config();
        let strain = StrainDatasets {
            scalar: Some(vec![ScalarStrainSample { lon: 0.5, lat: 0.5, value: 3.0 }]),
            ..StrainDatasets::default()
        };
        let table = RegimeTable::default();
        let r = MomentRateReconciler::new(&cfg, &K, &table, &catalog, &strain, &[]);
        let (z, p) = zone();
        let out = r.reconcile(&z, &p, 100.0, Err("n/a"));
        let expected = 8.6 * 3.0 * 1000.0 * 3.0e10;
        assert!((out.estimate.from_strain_barba.value().unwrap() / expected - 1.0).abs() < 1e-12);
        assert_eq!(out.notes.len(), 1);
    }

    #[test]
    fn span_is_derived_from_the_window() {
        let catalog = EventCatalog::new(vec![event(1950, 9.0, 9.0, 4.0), event(2000, 9.0, 9.0, 4.0)]);
        let cfg = ReconcileConfig::default();
        let strain = StrainDatasets::default();
        let table = RegimeTable::default();
        let r = MomentRateReconciler::new(&cfg, &K, &table, &catalog, &strain, &[]);
        assert!((r.span_years().unwrap() - 50.0).abs() < 0.01);
    }
}
