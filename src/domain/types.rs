//! Shared domain types.
//!
//! Inputs (zones, faults, catalog events, strain samples) are read-only
//! snapshots for the duration of one computation. Outputs (activity samples,
//! moment-rate estimates, zone records) are created fresh per request and are
//! serializable so they can be exported or written to an attribute store.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

impl LonLat {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

impl From<[f64; 2]> for LonLat {
    fn from(value: [f64; 2]) -> Self {
        Self::new(value[0], value[1])
    }
}

impl From<LonLat> for [f64; 2] {
    fn from(value: LonLat) -> Self {
        [value.lon, value.lat]
    }
}

/// One step of a zone's completeness history: complete above `magnitude`
/// since `start_year`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct CompletenessPeriod {
    pub magnitude: f64,
    pub start_year: f64,
}

impl From<[f64; 2]> for CompletenessPeriod {
    fn from(value: [f64; 2]) -> Self {
        Self {
            magnitude: value[0],
            start_year: value[1],
        }
    }
}

impl From<CompletenessPeriod> for [f64; 2] {
    fn from(value: CompletenessPeriod) -> Self {
        [value.magnitude, value.start_year]
    }
}

/// A weighted maximum-magnitude hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MmaxBin {
    pub mmax: f64,
    pub weight: f64,
}

/// Where a zone's solver priors came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorSource {
    /// Given explicitly with the zone.
    Explicit,
    /// Built from the zone's own Mmax and completeness history.
    Derived,
    /// Fixed placeholder values; a known approximation.
    Placeholder,
}

/// Auxiliary prior block written for each zone in the solver input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZonePriors {
    pub mmax_bins: Vec<MmaxBin>,
    pub periods: Vec<CompletenessPeriod>,
    pub a_prior: f64,
    pub a_weight: f64,
    pub b_prior: f64,
    pub b_weight: f64,
}

impl ZonePriors {
    pub const PLACEHOLDER_MMAX: f64 = 7.0;
    pub const PLACEHOLDER_MC: f64 = 3.5;
    pub const PLACEHOLDER_START_YEAR: f64 = 1900.0;

    /// The fixed prior block used when a zone has no usable history.
    pub fn placeholder() -> Self {
        Self {
            mmax_bins: vec![MmaxBin {
                mmax: Self::PLACEHOLDER_MMAX,
                weight: 1.0,
            }],
            periods: vec![CompletenessPeriod {
                magnitude: Self::PLACEHOLDER_MC,
                start_year: Self::PLACEHOLDER_START_YEAR,
            }],
            a_prior: 0.0,
            a_weight: 0.0,
            b_prior: 1.0,
            b_weight: 0.0,
        }
    }

    /// Resolve the prior block for a zone.
    pub fn for_zone(zone: &Zone) -> (Self, PriorSource) {
        if let Some(priors) = &zone.priors {
            return (priors.clone(), PriorSource::Explicit);
        }

        let has_mmax = zone.mmax.is_finite() && zone.mmax > 0.0;
        if !has_mmax && zone.completeness.is_empty() {
            return (Self::placeholder(), PriorSource::Placeholder);
        }

        let mut priors = Self::placeholder();
        if has_mmax {
            priors.mmax_bins = vec![MmaxBin {
                mmax: zone.mmax,
                weight: 1.0,
            }];
        }
        if !zone.completeness.is_empty() {
            priors.periods = zone.completeness.clone();
        }
        (priors, PriorSource::Derived)
    }
}

/// A polygonal seismic source zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    /// Ring vertices; a duplicated closing vertex is tolerated.
    pub vertices: Vec<LonLat>,
    pub mmax: f64,
    #[serde(default)]
    pub completeness: Vec<CompletenessPeriod>,
    #[serde(default)]
    pub priors: Option<ZonePriors>,
    /// Explicit area; computed on the sphere when absent.
    #[serde(default)]
    pub area_km2: Option<f64>,
    /// Optional enclosing background zone used for catalog cuts.
    #[serde(default)]
    pub background: Option<Vec<LonLat>>,
}

/// A fault source with a geological slip-rate bracket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultSource {
    pub id: String,
    pub vertices: Vec<LonLat>,
    /// Minimum slip rate in mm/yr.
    pub slip_min: f64,
    /// Maximum slip rate in mm/yr.
    pub slip_max: f64,
    /// Explicit fault area in m²; computed on the sphere when absent.
    #[serde(default)]
    pub area_m2: Option<f64>,
}

/// A catalog event (Mw-equivalent magnitude).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CatalogEvent {
    pub time: NaiveDateTime,
    pub lon: f64,
    pub lat: f64,
    /// Hypocentral depth in km.
    pub depth: f64,
    pub mag: f64,
}

/// One point of a discretized posterior over `(a, b)` for one zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivitySample {
    pub weight: f64,
    pub a: f64,
    pub b: f64,
}

/// A zone's decoded solver output block.
///
/// Samples keep the solver's output order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActivityPosterior {
    /// Sample count announced by the block header.
    pub declared_len: usize,
    pub samples: Vec<ActivitySample>,
    /// All triples concatenated as `weight a b` for display/plotting.
    pub samples_text: String,
}

impl ActivityPosterior {
    pub fn is_complete(&self) -> bool {
        self.samples.len() == self.declared_len
    }
}

/// Coarse deformation regime of a grid point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoarseRegime {
    #[serde(rename = "C")]
    Continental,
    #[serde(rename = "R")]
    RidgeTransform,
}

impl CoarseRegime {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "C" | "c" => Some(Self::Continental),
            "R" | "r" => Some(Self::RidgeTransform),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::Continental => "C",
            Self::RidgeTransform => "R",
        }
    }
}

/// Fine tectonic fault-style regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FineRegime {
    /// Continental rift boundary (normal faulting).
    Crb,
    /// Continental transform fault (strike-slip).
    Ctf,
    /// Continental convergent boundary (thrust).
    Ccb,
    /// Oceanic spreading ridge.
    Osr,
    /// Oceanic transform fault.
    Otf,
    /// Oceanic convergent boundary.
    Ocb,
}

impl FineRegime {
    pub const ALL: [FineRegime; 6] = [
        FineRegime::Crb,
        FineRegime::Ctf,
        FineRegime::Ccb,
        FineRegime::Osr,
        FineRegime::Otf,
        FineRegime::Ocb,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Self::Crb => "CRB",
            Self::Ctf => "CTF",
            Self::Ccb => "CCB",
            Self::Osr => "OSR",
            Self::Otf => "OTF",
            Self::Ocb => "OCB",
        }
    }

    pub fn coarse(self) -> CoarseRegime {
        match self {
            Self::Crb | Self::Ctf | Self::Ccb => CoarseRegime::Continental,
            Self::Osr | Self::Otf | Self::Ocb => CoarseRegime::RidgeTransform,
        }
    }
}

/// Regime-specific constants: coupled seismogenic thickness and corner
/// magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeParameters {
    /// Coupled thickness in km.
    pub cz_km: f64,
    pub corner_mag: f64,
}

/// Horizontal strain-rate tensor sample in the reduced `(p, t)` basis,
/// in units of 1e-9 per year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TensorStrainSample {
    pub lon: f64,
    pub lat: f64,
    pub epp: f64,
    pub ett: f64,
    pub ept: f64,
}

/// Scalar strain-rate sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalarStrainSample {
    pub lon: f64,
    pub lat: f64,
    pub value: f64,
}

/// Outcome of a single estimator: a value, or the reason it is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Estimate<T> {
    Available { value: T },
    Unavailable { reason: String },
}

impl<T> Estimate<T> {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Available { value } => Some(value),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available { .. })
    }
}

impl<T> From<Result<T, crate::error::AppError>> for Estimate<T> {
    fn from(result: Result<T, crate::error::AppError>) -> Self {
        match result {
            Ok(value) => Self::Available { value },
            Err(err) => Self::unavailable(err.to_string()),
        }
    }
}

/// Slip-rate moment rate bracket in Nm/yr.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlipRange {
    pub min: f64,
    pub max: f64,
}

/// The four independent moment-rate estimates for one zone (Nm/yr).
///
/// No combined value is derived; comparison happens in presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentRateEstimate {
    pub from_catalog: Estimate<f64>,
    /// One value per activity sample, in solver output order.
    pub from_activity: Estimate<Vec<f64>>,
    /// `from_activity` scaled by zone area.
    pub from_activity_area: Estimate<Vec<f64>>,
    pub from_strain_barba: Estimate<f64>,
    pub from_strain_bird: Estimate<f64>,
    pub from_slip: Estimate<SlipRange>,
}

/// Representative activity parameters for a zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub a: f64,
    pub b: f64,
    pub weight: f64,
    /// Annual rate of events at or above `reference_mag`.
    pub activity_rate: f64,
    pub reference_mag: f64,
    /// Position of the representative sample in the posterior block.
    pub index: usize,
    pub sample_count: usize,
    pub samples_text: String,
}

/// Attribute/display-ready parameter record for one zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneRecord {
    pub zone_id: String,
    pub area_km2: f64,
    pub mmax: f64,
    pub prior_source: PriorSource,
    pub activity: Estimate<ActivitySummary>,
    pub moment: MomentRateEstimate,
    /// Non-fatal observations made while computing this zone.
    pub notes: Vec<String>,
}

/// A zone excluded from computation, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedZone {
    pub zone_id: String,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone() -> Zone {
        Zone {
            id: "z".to_string(),
            vertices: vec![LonLat::new(0.0, 0.0), LonLat::new(1.0, 0.0), LonLat::new(1.0, 1.0)],
            mmax: 6.8,
            completeness: vec![],
            priors: None,
            area_km2: None,
            background: None,
        }
    }

    #[test]
    fn priors_are_derived_from_zone_mmax() {
        let (priors, source) = ZonePriors::for_zone(&zone());
        assert_eq!(source, PriorSource::Derived);
        assert_eq!(priors.mmax_bins, vec![MmaxBin { mmax: 6.8, weight: 1.0 }]);
        assert_eq!(priors.periods, ZonePriors::placeholder().periods);
    }

    #[test]
    fn zone_without_history_gets_placeholder() {
        let mut z = zone();
        z.mmax = f64::NAN;
        let (priors, source) = ZonePriors::for_zone(&z);
        assert_eq!(source, PriorSource::Placeholder);
        assert_eq!(priors, ZonePriors::placeholder());
    }

    #[test]
    fn lonlat_serializes_as_pair() {
        let json = serde_json::to_string(&LonLat::new(12.5, 47.25)).unwrap();
        assert_eq!(json, "[12.5,47.25]");
    }

    #[test]
    fn estimate_serializes_with_status_tag() {
        let e: Estimate<f64> = Estimate::unavailable("no events");
        let json = serde_json::to_string(&e).unwrap();
        assert_eq!(json, r#"{"status":"unavailable","reason":"no events"}"#);
    }
}
