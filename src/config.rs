//! Engine configuration.
//!
//! Configuration is layered the same way for every command:
//! defaults -> optional JSON file (`--config`) -> CLI flags -> environment
//! (only for the solver path, via `.env` / `ZRATES_SOLVER`).
//!
//! Physical constants live here too so units and provenance stay in one
//! auditable place instead of being scattered through the formulas.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::activity::CentralSelection;
use crate::error::AppError;

/// Environment variable consulted when no solver path is given explicitly.
pub const SOLVER_ENV_VAR: &str = "ZRATES_SOLVER";

/// Physical constants used by the moment-rate formulas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicalConstants {
    /// Shear modulus `mu` in Pa.
    pub shear_modulus: f64,
    /// Kanamori slope: `log10(M0) = slope * Mw + offset`.
    pub kanamori_slope: f64,
    /// Kanamori offset for M0 in Nm.
    pub kanamori_offset: f64,
    pub seconds_per_year: f64,
    /// Unit of the tensor strain grid values (1e-9 per year).
    pub strain_unit: f64,
    /// Continental strike-slip band factor used by the fine classifier.
    pub continental_factor: f64,
}

impl PhysicalConstants {
    pub const STANDARD: Self = Self {
        shear_modulus: 3.0e10,
        kanamori_slope: 1.5,
        kanamori_offset: 9.05,
        seconds_per_year: 31_557_600.0,
        strain_unit: 1.0e-9,
        continental_factor: 0.364,
    };
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// External activity solver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Solver executable. Falls back to `ZRATES_SOLVER` when unset.
    pub binary: Option<PathBuf>,
    /// Child process timeout in seconds (`0` disables the timeout).
    pub timeout_secs: u64,
    /// Keep the exchange directory after the run for postmortem inspection.
    pub keep_workdir: bool,
    pub selection: CentralSelection,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            binary: None,
            timeout_secs: 600,
            keep_workdir: false,
            selection: CentralSelection::MiddleIndex,
        }
    }
}

impl SolverConfig {
    /// Resolve the solver executable and make sure it exists.
    pub fn resolve_binary(&self) -> Result<PathBuf, AppError> {
        let path = match &self.binary {
            Some(path) => path.clone(),
            None => {
                dotenvy::dotenv().ok();
                let raw = std::env::var(SOLVER_ENV_VAR).map_err(|_| {
                    AppError::config(format!(
                        "No activity solver configured (use --solver or set {SOLVER_ENV_VAR})."
                    ))
                })?;
                PathBuf::from(raw)
            }
        };

        if !path.is_file() {
            return Err(AppError::config(format!(
                "Activity solver '{}' does not exist or is not a file.",
                path.display()
            )));
        }
        Ok(path)
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// Which geometry the catalog is cut to for the catalog-summation estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CatalogRegion {
    /// The zone polygon itself.
    Zone,
    /// The zone polygon grown by a buffer distance in km.
    Buffer { km: f64 },
    /// The zone's background polygon when it has one, else the zone.
    Background,
}

/// Catalog windows and integration bounds used by the reconciler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Minimum magnitude for the solver request and the catalog cut.
    pub mmin: f64,
    pub min_depth_km: f64,
    pub max_depth_km: f64,
    pub max_mag: Option<f64>,
    pub max_mag_exclusive: bool,
    pub region: CatalogRegion,
    /// Explicit catalog time span in years (else derived from the catalog).
    pub span_years: Option<f64>,
    /// Lower bound of the Gutenberg-Richter moment integral.
    pub reference_mmin: f64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            mmin: 3.5,
            min_depth_km: 0.0,
            max_depth_km: 70.0,
            max_mag: None,
            max_mag_exclusive: false,
            region: CatalogRegion::Zone,
            span_years: None,
            reference_mmin: 5.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub solver: SolverConfig,
    pub reconcile: ReconcileConfig,
    pub constants: PhysicalConstants,
}

impl EngineConfig {
    /// Load a JSON configuration file; missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
        let config: EngineConfig = serde_json::from_str(&raw).map_err(|e| {
            AppError::config(format!("Invalid config '{}': {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let r = &self.reconcile;
        if !(r.min_depth_km.is_finite() && r.max_depth_km.is_finite() && r.max_depth_km >= r.min_depth_km) {
            return Err(AppError::config(format!(
                "Invalid depth window: {}..{} km.",
                r.min_depth_km, r.max_depth_km
            )));
        }
        if let Some(span) = r.span_years {
            if !(span.is_finite() && span > 0.0) {
                return Err(AppError::config(format!("Invalid catalog span override: {span} years.")));
            }
        }
        if let CatalogRegion::Buffer { km } = r.region {
            if !(km.is_finite() && km >= 0.0) {
                return Err(AppError::config(format!("Invalid buffer distance: {km} km.")));
            }
        }
        if !(self.constants.shear_modulus.is_finite() && self.constants.shear_modulus > 0.0) {
            return Err(AppError::config("Shear modulus must be positive."));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"reconcile": {"mmin": 4.0, "region": {"kind": "buffer", "km": 10.0}}}"#)
                .unwrap();
        assert_eq!(config.reconcile.mmin, 4.0);
        assert_eq!(config.reconcile.region, CatalogRegion::Buffer { km: 10.0 });
        assert_eq!(config.reconcile.reference_mmin, 5.0);
        assert_eq!(config.constants, PhysicalConstants::STANDARD);
        assert_eq!(config.solver.timeout_secs, 600);
    }

    #[test]
    fn missing_solver_is_a_configuration_error() {
        let solver = SolverConfig {
            binary: Some(PathBuf::from("/definitely/not/here/solver")),
            ..SolverConfig::default()
        };
        let err = solver.resolve_binary().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn zero_timeout_disables_it() {
        let solver = SolverConfig {
            timeout_secs: 0,
            ..SolverConfig::default()
        };
        assert!(solver.timeout().is_none());
    }

    #[test]
    fn inverted_depth_window_is_rejected() {
        let mut config = EngineConfig::default();
        config.reconcile.min_depth_km = 50.0;
        config.reconcile.max_depth_km = 10.0;
        assert!(config.validate().is_err());
    }
}
