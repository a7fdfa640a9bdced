//! Magnitude/moment conversion and moment-rate formulas.
//!
//! - Kanamori: `M0 = 10^(1.5 * Mw + 9.05)` (Nm)
//! - Gutenberg-Richter moment-rate integral between a reference magnitude and
//!   Mmax, closed form in `(a, b)`
//! - Slip-rate scaling: `1000 * mu * slip * area / seconds_per_year`
//!
//! Inputs outside a formula's domain are rejected with `NumericDomain`
//! errors; none of these functions returns a non-finite value.

use std::f64::consts::LN_10;

use crate::config::PhysicalConstants;
use crate::domain::SlipRange;
use crate::error::AppError;

/// `|b - slope|` below which the activity integral is singular.
const SINGULAR_B_TOLERANCE: f64 = 1.0e-9;

/// Scalar seismic moment (Nm) of a moment magnitude.
pub fn magnitude_to_moment(mw: f64, k: &PhysicalConstants) -> f64 {
    10f64.powf(k.kanamori_slope * mw + k.kanamori_offset)
}

/// Elementwise [`magnitude_to_moment`].
pub fn magnitudes_to_moments(mws: &[f64], k: &PhysicalConstants) -> Vec<f64> {
    mws.iter().map(|&mw| magnitude_to_moment(mw, k)).collect()
}

/// Annual rate of events with magnitude `>= mag` for cumulative `(a, b)`.
pub fn activity_rate(a: f64, b: f64, mag: f64) -> f64 {
    10f64.powf(a - b * mag)
}

/// Moment rate implied by a Gutenberg-Richter law, integrated from
/// `reference_mmin` to `mmax`.
///
/// The cumulative `a` is converted to its incremental form
/// `a + log10(b * ln 10)` before integrating the density times moment.
pub fn moment_rate_from_activity(
    a: f64,
    b: f64,
    mmax: f64,
    reference_mmin: f64,
    k: &PhysicalConstants,
) -> Result<f64, AppError> {
    const NAME: &str = "fromActivity";

    if !(a.is_finite() && b.is_finite() && mmax.is_finite() && reference_mmin.is_finite()) {
        return Err(AppError::numeric(
            NAME,
            format!("non-finite input (a={a}, b={b}, mmax={mmax}, mmin={reference_mmin})"),
        ));
    }
    if b <= 0.0 {
        return Err(AppError::numeric(NAME, format!("b-value must be positive (b={b})")));
    }
    let slope_gap = k.kanamori_slope - b;
    if slope_gap.abs() < SINGULAR_B_TOLERANCE {
        return Err(AppError::numeric(
            NAME,
            format!("b-value equals {} (integral is singular)", k.kanamori_slope),
        ));
    }
    if mmax <= reference_mmin {
        return Err(AppError::numeric(
            NAME,
            format!("Mmax {mmax} is not above the integration bound {reference_mmin}"),
        ));
    }

    let a_incremental = a + (b * LN_10).log10();
    let rate = 10f64.powf(a_incremental + k.kanamori_offset) / slope_gap
        * (10f64.powf(mmax * slope_gap) - 10f64.powf(reference_mmin * slope_gap));

    if !(rate.is_finite() && rate > 0.0) {
        return Err(AppError::numeric(NAME, format!("integral evaluated to {rate}")));
    }
    Ok(rate)
}

/// Moment rate bracket from a slip-rate bracket (mm/yr) over `area_m2`.
pub fn moment_rate_from_slip(
    slip_min: f64,
    slip_max: f64,
    area_m2: f64,
    k: &PhysicalConstants,
) -> Result<SlipRange, AppError> {
    const NAME: &str = "fromSlip";

    if !(slip_min.is_finite() && slip_max.is_finite() && slip_min >= 0.0 && slip_max >= slip_min) {
        return Err(AppError::numeric(
            NAME,
            format!("invalid slip-rate bracket {slip_min}..{slip_max} mm/yr"),
        ));
    }
    if !(area_m2.is_finite() && area_m2 > 0.0) {
        return Err(AppError::numeric(NAME, format!("invalid fault area {area_m2} m²")));
    }

    let scale = 1000.0 * k.shear_modulus * area_m2 / k.seconds_per_year;
    Ok(SlipRange {
        min: scale * slip_min,
        max: scale * slip_max,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const K: PhysicalConstants = PhysicalConstants::STANDARD;

    #[test]
    fn kanamori_reference_value() {
        let m0 = magnitude_to_moment(6.0, &K);
        assert!((m0.log10() - 18.05).abs() < 1e-12);
    }

    #[test]
    fn moment_increases_with_magnitude() {
        let mags: Vec<f64> = (0..40).map(|i| 3.0 + 0.1 * i as f64).collect();
        let moments = magnitudes_to_moments(&mags, &K);
        assert_eq!(moments.len(), mags.len());
        assert!(moments.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn activity_integral_is_finite_and_positive_off_singularity() {
        for b in [0.3, 0.8, 1.0, 1.2, 1.49, 1.51, 1.8, 1.99] {
            for mmax in [5.5, 6.5, 7.5, 8.5] {
                let rate = moment_rate_from_activity(3.0, b, mmax, 5.0, &K).unwrap();
                assert!(rate.is_finite() && rate > 0.0, "b={b} mmax={mmax} rate={rate}");
            }
        }
    }

    #[test]
    fn activity_integral_rejects_singular_b() {
        let err = moment_rate_from_activity(3.0, 1.5, 7.0, 5.0, &K).unwrap_err();
        assert!(matches!(err, AppError::NumericDomain { .. }));
        assert!(moment_rate_from_activity(3.0, 1.5 + 1e-12, 7.0, 5.0, &K).is_err());
    }

    #[test]
    fn activity_integral_rejects_mmax_below_bound() {
        assert!(moment_rate_from_activity(3.0, 1.0, 5.0, 5.0, &K).is_err());
        assert!(moment_rate_from_activity(3.0, 1.0, 4.5, 5.0, &K).is_err());
    }

    #[test]
    fn square_zone_scenario_matches_hand_computation() {
        // a=3, b=1, Mmax=7: 10^(3 + log10(ln 10) + 9.05) / 0.5 * (10^3.5 - 10^2.5)
        let rate = moment_rate_from_activity(3.0, 1.0, 7.0, 5.0, &K).unwrap();
        let expected = 10f64.powf(3.0 + LN_10.log10() + 9.05) / 0.5
            * (10f64.powf(3.5) - 10f64.powf(2.5));
        assert!((rate / expected - 1.0).abs() < 1e-12);

        let per_year = rate * 10_000.0 / 50.0;
        assert!((per_year.log10() - 18.4685).abs() < 0.01, "log10={}", per_year.log10());
    }

    #[test]
    fn activity_rate_at_reference() {
        assert!((activity_rate(4.0, 1.0, 5.0) - 0.1).abs() < 1e-15);
    }

    #[test]
    fn slip_bracket_is_ordered() {
        let range = moment_rate_from_slip(1.0, 5.0, 1.0e9, &K).unwrap();
        assert!(range.max > range.min && range.min > 0.0);
        let expected_min = 1000.0 * 3.0e10 * 1.0e9 / 31_557_600.0;
        assert!((range.min / expected_min - 1.0).abs() < 1e-12);
        assert!((range.max / range.min - 5.0).abs() < 1e-12);
    }

    #[test]
    fn slip_rejects_inverted_bracket() {
        assert!(moment_rate_from_slip(5.0, 1.0, 1.0e9, &K).is_err());
        assert!(moment_rate_from_slip(1.0, 5.0, 0.0, &K).is_err());
    }
}
