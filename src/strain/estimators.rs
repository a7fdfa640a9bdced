//! Geodetic moment-rate estimators over a zone polygon.
//!
//! - `tensor_moment_rate` (Bird dataset): full tensor classification per grid
//!   point, `2 * cz * e` summed, then scaled by
//!   `1000 * mu * strain_unit * seconds_per_year`.
//! - `scalar_moment_rate` (Barba dataset): positive scalar rates only, coarse
//!   regime thickness, `cz * value` summed, then scaled by `1000 * mu`.

use tracing::debug;

use crate::domain::{LonLat, ScalarStrainSample, TensorStrainSample};
use crate::error::AppError;
use crate::geometry::ZonePolygon;
use crate::strain::classifier::StrainClassifier;
use crate::strain::regimes::DeformationRegimeMap;

pub const BIRD: &str = "fromStrainBird";
pub const BARBA: &str = "fromStrainBarba";

/// Result of one strain integration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrainIntegral {
    /// Nm/yr.
    pub moment_rate: f64,
    pub samples_used: usize,
    /// Samples whose coarse regime fell back to Continental.
    pub continental_fallbacks: usize,
}

pub fn tensor_moment_rate(
    zone: &ZonePolygon,
    samples: &[TensorStrainSample],
    regimes: &DeformationRegimeMap,
    classifier: &StrainClassifier<'_>,
) -> Result<StrainIntegral, AppError> {
    let mut density_sum = 0.0;
    let mut used = 0usize;
    let mut fallbacks = 0usize;

    for sample in samples {
        let point = LonLat::new(sample.lon, sample.lat);
        if !zone.contains(point) {
            continue;
        }
        let (coarse, fallback) = regimes.coarse_or_continental(point);
        if fallback {
            fallbacks += 1;
        }
        let classified = classifier.classify(sample, coarse)?;
        debug!(
            lon = sample.lon,
            lat = sample.lat,
            regime = classified.fine.code(),
            density = classified.moment_density,
            "classified strain sample"
        );
        density_sum += classified.moment_density;
        used += 1;
    }

    if used == 0 {
        return Err(AppError::numeric(BIRD, "no tensor strain samples inside zone"));
    }

    let k = classifier.constants();
    let conversion = 1000.0 * k.shear_modulus * k.strain_unit * k.seconds_per_year;
    Ok(StrainIntegral {
        moment_rate: density_sum * conversion,
        samples_used: used,
        continental_fallbacks: fallbacks,
    })
}

pub fn scalar_moment_rate(
    zone: &ZonePolygon,
    samples: &[ScalarStrainSample],
    regimes: &DeformationRegimeMap,
    classifier: &StrainClassifier<'_>,
) -> Result<StrainIntegral, AppError> {
    let mut weighted_sum = 0.0;
    let mut used = 0usize;
    let mut fallbacks = 0usize;

    for sample in samples {
        if !(sample.value.is_finite() && sample.value > 0.0) {
            continue;
        }
        let point = LonLat::new(sample.lon, sample.lat);
        if !zone.contains(point) {
            continue;
        }
        let (coarse, fallback) = regimes.coarse_or_continental(point);
        if fallback {
            fallbacks += 1;
        }
        weighted_sum += classifier.table().scalar_thickness(coarse) * sample.value;
        used += 1;
    }

    if used == 0 {
        return Err(AppError::numeric(BARBA, "no positive scalar strain samples inside zone"));
    }

    let k = classifier.constants();
    Ok(StrainIntegral {
        moment_rate: weighted_sum * 1000.0 * k.shear_modulus,
        samples_used: used,
        continental_fallbacks: fallbacks,
    })
}
