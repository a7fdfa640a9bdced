//! One activity request: encode, invoke, decode.
//!
//! Every request gets its own temporary working directory. The solver binary
//! is copied into it and run with the short fixed file names as positional
//! arguments, so nothing outside the directory is touched.

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::activity::protocol::{
    CATALOG_FILE, SOLVER_FILE, ZONE_FILE, parse_result_file, result_file_name, write_zone_file,
};
use crate::activity::runner::{ProcessRunner, SystemRunner};
use crate::activity::selection::check_ordering;
use crate::catalog::EventCatalog;
use crate::config::SolverConfig;
use crate::domain::{ActivityPosterior, PriorSource, Zone, ZonePriors};
use crate::error::{AppError, Stage};
use crate::geometry::ZonePolygon;

/// Activity outcome for one input zone.
#[derive(Debug)]
pub struct ZoneActivity {
    pub zone_id: String,
    pub prior_source: PriorSource,
    pub posterior: Result<ActivityPosterior, AppError>,
    /// Non-fatal findings about this zone's block.
    pub notes: Vec<String>,
}

/// Result of one solver request, one entry per input zone in input order.
#[derive(Debug)]
pub struct ActivityBatch {
    pub zones: Vec<ZoneActivity>,
    /// `None` when no zone had usable geometry and the solver was not run.
    pub exit_code: Option<i32>,
    /// Retained working directory, when configured.
    pub workdir: Option<PathBuf>,
}

pub struct ActivityEstimator<R> {
    runner: R,
    solver: PathBuf,
    keep_workdir: bool,
}

impl ActivityEstimator<SystemRunner> {
    /// Real-process estimator; fails when the solver cannot be resolved.
    pub fn from_config(config: &SolverConfig) -> Result<Self, AppError> {
        let solver = config.resolve_binary()?;
        Ok(Self::new(SystemRunner::new(config.timeout()), solver).keep_workdir(config.keep_workdir))
    }
}

impl<R: ProcessRunner> ActivityEstimator<R> {
    pub fn new(runner: R, solver: PathBuf) -> Self {
        Self {
            runner,
            solver,
            keep_workdir: false,
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn keep_workdir(mut self, keep: bool) -> Self {
        self.keep_workdir = keep;
        self
    }

    /// Estimate `(a, b)` posteriors for `zones` from `catalog`.
    ///
    /// Zones with degenerate geometry are not sent to the solver and come
    /// back with a `Geometry` error in their slot. An `Err` return means the
    /// exchange itself failed (missing solver, timeout, unparseable output).
    pub fn estimate(
        &self,
        zones: &[Zone],
        catalog: &EventCatalog,
        mmin: f64,
    ) -> Result<ActivityBatch, AppError> {
        if !self.solver.is_file() {
            return Err(AppError::config(format!(
                "Activity solver '{}' does not exist or is not a file.",
                self.solver.display()
            )));
        }

        let prepared: Vec<(Result<ZonePolygon, AppError>, ZonePriors, PriorSource)> = zones
            .iter()
            .map(|zone| {
                let (priors, source) = ZonePriors::for_zone(zone);
                (ZonePolygon::from_vertices(&zone.id, &zone.vertices), priors, source)
            })
            .collect();

        let valid: Vec<(&ZonePolygon, &ZonePriors)> = prepared
            .iter()
            .filter_map(|(poly, priors, _)| poly.as_ref().ok().map(|p| (p, priors)))
            .collect();

        if valid.is_empty() {
            warn!("no zone with usable geometry; activity solver not run");
            return Ok(ActivityBatch {
                zones: assemble(zones, prepared, Vec::new()),
                exit_code: None,
                workdir: None,
            });
        }

        let dir = tempfile::Builder::new()
            .prefix("zrates-")
            .tempdir()
            .map_err(|e| AppError::io(std::env::temp_dir(), e))?;
        debug!(dir = %dir.path().display(), zones = valid.len(), "activity exchange directory");

        let exchanged = self.exchange(dir.path(), &valid, catalog, mmin);

        let workdir = if self.keep_workdir {
            let path = dir.keep();
            info!(path = %path.display(), "keeping activity working directory");
            Some(path)
        } else {
            None
        };

        let (exit_code, posteriors) = exchanged?;
        if posteriors.len() != valid.len() {
            warn!(
                expected = valid.len(),
                found = posteriors.len(),
                "activity result zone count mismatch; matching blocks by position"
            );
        }

        Ok(ActivityBatch {
            zones: assemble(zones, prepared, posteriors),
            exit_code: Some(exit_code),
            workdir,
        })
    }

    fn exchange(
        &self,
        dir: &Path,
        zones: &[(&ZonePolygon, &ZonePriors)],
        catalog: &EventCatalog,
        mmin: f64,
    ) -> Result<(i32, Vec<ActivityPosterior>), AppError> {
        let program = dir.join(SOLVER_FILE);
        fs::copy(&self.solver, &program).map_err(|e| {
            AppError::config(format!("Cannot copy solver '{}': {e}", self.solver.display()))
        })?;
        make_executable(&program)?;

        let zone_path = dir.join(ZONE_FILE);
        let file = File::create(&zone_path).map_err(|e| AppError::io(&zone_path, e))?;
        let mut out = BufWriter::new(file);
        write_zone_file(&mut out, mmin, zones)
            .and_then(|_| out.flush())
            .map_err(|e| AppError::io(&zone_path, e))?;
        catalog.write_solver_file(&dir.join(CATALOG_FILE))?;

        info!(zones = zones.len(), events = catalog.size(), mmin, "running activity solver");
        let code = self.runner.run(&program, &[ZONE_FILE, CATALOG_FILE], dir)?;
        if code != 0 {
            warn!(code, "activity solver exited with non-zero status; parsing its output anyway");
        }

        let result_path = dir.join(result_file_name(ZONE_FILE));
        let text = match fs::read_to_string(&result_path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AppError::protocol(
                    Stage::Parse,
                    format!("solver produced no result file (exit code {code})"),
                ));
            }
            Err(e) => return Err(AppError::io(&result_path, e)),
        };
        Ok((code, parse_result_file(&text)?))
    }
}

/// Pair decoded blocks with the zones that were sent, by position.
fn assemble(
    zones: &[Zone],
    prepared: Vec<(Result<ZonePolygon, AppError>, ZonePriors, PriorSource)>,
    posteriors: Vec<ActivityPosterior>,
) -> Vec<ZoneActivity> {
    let mut blocks = posteriors.into_iter();
    zones
        .iter()
        .zip(prepared)
        .map(|(zone, (poly, _, prior_source))| {
            let mut notes = Vec::new();
            let posterior = match poly {
                Err(e) => Err(e),
                Ok(_) => match blocks.next() {
                    Some(block) => {
                        if !block.is_complete() {
                            notes.push(format!(
                                "posterior block truncated: {} of {} samples",
                                block.samples.len(),
                                block.declared_len
                            ));
                        }
                        if let Some(msg) = check_ordering(&block.samples) {
                            warn!(zone = %zone.id, "{msg}");
                            notes.push(msg);
                        }
                        Ok(block)
                    }
                    None => Err(AppError::protocol(Stage::Parse, "result file has no block for this zone")
                        .with_zone(&zone.id)),
                },
            };
            ZoneActivity {
                zone_id: zone.id.clone(),
                prior_source,
                posterior,
                notes,
            }
        })
        .collect()
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), AppError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(|e| AppError::io(path, e))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), AppError> {
    Ok(())
}
