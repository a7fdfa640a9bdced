//! Strain-rate tensor classification into fault-style regimes.
//!
//! Works in the reduced horizontal basis `(p, t)`: `p` points east and `t`
//! points south (colatitude). Incompressibility gives the vertical rate
//! `err = -(epp + ett)`, so one principal axis is always vertical.

use nalgebra::{Matrix2, SymmetricEigen};

use crate::config::PhysicalConstants;
use crate::domain::{CoarseRegime, FineRegime, RegimeParameters, TensorStrainSample};
use crate::error::AppError;
use crate::strain::regimes::RegimeTable;

/// Principal strain rates of one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrincipalStrains {
    /// Vertical rate.
    pub err: f64,
    /// Smaller horizontal principal rate.
    pub e1h: f64,
    /// Larger horizontal principal rate.
    pub e2h: f64,
    /// Ordered principal rates, `e1 <= e2 <= e3`.
    pub e1: f64,
    pub e2: f64,
    pub e3: f64,
}

pub fn principal_strains(epp: f64, ett: f64, ept: f64) -> PrincipalStrains {
    let err = -(epp + ett);
    let sum1 = 0.5 * (epp + ett);
    let sum2 = (ept * ept + 0.25 * (epp - ett) * (epp - ett)).sqrt();
    let e1h = sum1 - sum2;
    let e2h = sum1 + sum2;

    let (e1, e2, e3) = if err >= e2h {
        (e1h, e2h, err)
    } else if err <= e1h {
        (err, e1h, e2h)
    } else {
        (e1h, err, e2h)
    };

    PrincipalStrains {
        err,
        e1h,
        e2h,
        e1,
        e2,
        e3,
    }
}

/// Fine regime from principal rates and the point's coarse regime.
pub fn classify_fine(
    coarse: CoarseRegime,
    p: &PrincipalStrains,
    factor: f64,
) -> Result<FineRegime, AppError> {
    match coarse {
        CoarseRegime::Continental => {
            if p.err >= factor * p.e1h && p.err <= factor * p.e2h {
                Ok(FineRegime::Ctf)
            } else if p.err > factor * p.e2h {
                Ok(FineRegime::Ccb)
            } else {
                Ok(FineRegime::Crb)
            }
        }
        CoarseRegime::RidgeTransform => {
            let product = p.e1h * p.e2h;
            let sum = p.e1h + p.e2h;
            if p.e1h >= 0.0 {
                Ok(FineRegime::Osr)
            } else if p.e2h < 0.0 {
                Ok(FineRegime::Ocb)
            } else if product < 0.0 && sum >= 0.0 {
                Ok(FineRegime::Otf)
            } else if product < 0.0 && sum < 0.0 {
                Ok(FineRegime::Ocb)
            } else {
                Err(AppError::internal(format!(
                    "ridge-transform sample with e1h={} e2h={} matches no regime",
                    p.e1h, p.e2h
                )))
            }
        }
    }
}

/// Per-sample moment density `2 * cz * e` in km * 1e-9/yr.
pub fn moment_density(p: &PrincipalStrains, cz_km: f64) -> f64 {
    if p.e2 < 0.0 {
        2.0 * cz_km * p.e3
    } else {
        2.0 * cz_km * (-p.e1)
    }
}

/// Azimuth in degrees from north, in `[0, 180)`, of the most compressive
/// horizontal axis. `None` for an isotropic horizontal tensor.
pub fn compression_azimuth(epp: f64, ett: f64, ept: f64) -> Option<f64> {
    let tensor = Matrix2::new(epp, ept, ept, ett);
    let eigen = SymmetricEigen::new(tensor);
    let (lo, hi) = if eigen.eigenvalues[0] <= eigen.eigenvalues[1] { (0, 1) } else { (1, 0) };
    if (eigen.eigenvalues[hi] - eigen.eigenvalues[lo]).abs() < 1e-12 {
        return None;
    }

    let axis = eigen.eigenvectors.column(lo);
    let east = axis[0];
    let north = -axis[1];
    let azimuth = east.atan2(north).to_degrees().rem_euclid(180.0);
    // rem_euclid can round up to exactly 180.0
    Some(if azimuth >= 180.0 { 0.0 } else { azimuth })
}

/// Full classification of one tensor sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrainClassification {
    pub coarse: CoarseRegime,
    pub fine: FineRegime,
    pub principal: PrincipalStrains,
    pub params: RegimeParameters,
    /// `2 * cz * e` in km * 1e-9/yr.
    pub moment_density: f64,
    pub compression_azimuth: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
pub struct StrainClassifier<'a> {
    table: &'a RegimeTable,
    constants: &'a PhysicalConstants,
}

impl<'a> StrainClassifier<'a> {
    pub fn new(table: &'a RegimeTable, constants: &'a PhysicalConstants) -> Self {
        Self { table, constants }
    }

    pub fn table(&self) -> &RegimeTable {
        self.table
    }

    pub fn constants(&self) -> &PhysicalConstants {
        self.constants
    }

    pub fn classify(
        &self,
        sample: &TensorStrainSample,
        coarse: CoarseRegime,
    ) -> Result<StrainClassification, AppError> {
        if !(sample.epp.is_finite() && sample.ett.is_finite() && sample.ept.is_finite()) {
            return Err(AppError::numeric(
                "fromStrainBird",
                format!("non-finite strain sample at ({}, {})", sample.lon, sample.lat),
            ));
        }

        let principal = principal_strains(sample.epp, sample.ett, sample.ept);
        let fine = classify_fine(coarse, &principal, self.constants.continental_factor)?;
        let params = self.table.get(fine);

        Ok(StrainClassification {
            coarse,
            fine,
            principal,
            params,
            moment_density: moment_density(&principal, params.cz_km),
            compression_azimuth: compression_azimuth(sample.epp, sample.ett, sample.ept),
        })
    }
}
