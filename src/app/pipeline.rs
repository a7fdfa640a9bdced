//! The zone parameter pipeline shared by every front-end command.
//!
//! validate geometry -> one activity request -> reconcile each zone -> records
//!
//! Front-ends only deal with loading inputs and presenting the records.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::activity::{ActivityEstimator, ProcessRunner, SystemRunner, ZoneActivity};
use crate::catalog::EventCatalog;
use crate::config::EngineConfig;
use crate::domain::{
    ActivityPosterior, ActivitySummary, Estimate, FaultSource, PriorSource, SkippedZone, Zone, ZonePriors,
    ZoneRecord,
};
use crate::error::AppError;
use crate::geometry::ZonePolygon;
use crate::models::activity_rate;
use crate::reconcile::{MomentRateReconciler, StrainDatasets, window_filter};
use crate::strain::RegimeTable;

/// Read-only inputs of one run.
#[derive(Debug, Clone, Copy)]
pub struct PipelineInputs<'a> {
    pub zones: &'a [Zone],
    pub catalog: &'a EventCatalog,
    pub faults: &'a [FaultSource],
    pub strain: &'a StrainDatasets,
}

/// All computed outputs of a single run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// One record per zone with usable geometry, in input order.
    pub records: Vec<ZoneRecord>,
    pub skipped: Vec<SkippedZone>,
    pub span_years: Option<f64>,
    /// `None` when the solver was not run.
    pub solver_exit: Option<i32>,
    pub workdir: Option<PathBuf>,
}

/// A zone that passed validation.
struct ValidZone<'a> {
    zone: &'a Zone,
    polygon: ZonePolygon,
    area_km2: f64,
}

pub struct ZoneParameterPipeline<R> {
    config: EngineConfig,
    table: RegimeTable,
    activity: Option<ActivityEstimator<R>>,
}

impl ZoneParameterPipeline<SystemRunner> {
    /// Pipeline running the configured solver as a child process.
    pub fn from_config(config: EngineConfig) -> Result<Self, AppError> {
        let estimator = ActivityEstimator::from_config(&config.solver)?;
        Ok(Self::new(config, Some(estimator)))
    }

    /// Pipeline without activity estimation; the activity estimates of
    /// every record are unavailable.
    pub fn without_activity(config: EngineConfig) -> Self {
        Self::new(config, None)
    }
}

impl<R: ProcessRunner> ZoneParameterPipeline<R> {
    pub fn new(config: EngineConfig, activity: Option<ActivityEstimator<R>>) -> Self {
        Self {
            config,
            table: RegimeTable::default(),
            activity,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Compute records for every zone of `inputs`.
    ///
    /// Only configuration errors abort the run. Degenerate zones are
    /// skipped and listed; every other failure marks the affected estimate
    /// unavailable.
    pub fn run(&self, inputs: PipelineInputs<'_>) -> Result<PipelineOutput, AppError> {
        self.config.validate()?;
        let reconcile = &self.config.reconcile;

        let (valid, skipped) = validate_zones(inputs.zones);
        info!(zones = valid.len(), skipped = skipped.len(), "zones validated");

        for v in &valid {
            let (_, source) = ZonePriors::for_zone(v.zone);
            if source == PriorSource::Placeholder {
                warn!(zone = %v.zone.id, "no Mmax or completeness history; solver gets placeholder priors");
            }
        }

        let (activity, solver_exit, workdir) = self.estimate_activity(&valid, inputs.catalog)?;

        let reconciler = MomentRateReconciler::new(
            reconcile,
            &self.config.constants,
            &self.table,
            inputs.catalog,
            inputs.strain,
            inputs.faults,
        );

        let mut records = Vec::with_capacity(valid.len());
        for (v, outcome) in valid.iter().zip(activity) {
            let mut notes = outcome.notes;
            let samples = match &outcome.posterior {
                Ok(p) => Ok(p.samples.as_slice()),
                Err(reason) => Err(reason.as_str()),
            };
            let moment = reconciler.reconcile(v.zone, &v.polygon, v.area_km2, samples);
            notes.extend(moment.notes);

            let summary = match &outcome.posterior {
                Ok(p) => self.summarize(p),
                Err(reason) => Estimate::unavailable(reason.clone()),
            };
            if let Some(s) = summary.value() {
                info!(zone = %v.zone.id, a = s.a, b = s.b, samples = s.sample_count, "activity");
            }

            let estimate = moment.estimate;
            info!(
                zone = %v.zone.id,
                catalog = estimate.from_catalog.is_available(),
                activity = estimate.from_activity.is_available(),
                barba = estimate.from_strain_barba.is_available(),
                bird = estimate.from_strain_bird.is_available(),
                slip = estimate.from_slip.is_available(),
                "zone reconciled"
            );

            records.push(ZoneRecord {
                zone_id: v.zone.id.clone(),
                area_km2: v.area_km2,
                mmax: v.zone.mmax,
                prior_source: outcome.prior_source,
                activity: summary,
                moment: estimate,
                notes,
            });
        }

        Ok(PipelineOutput {
            records,
            skipped,
            span_years: reconciler.span_years(),
            solver_exit,
            workdir,
        })
    }

    /// One solver request for all valid zones.
    ///
    /// Returns one outcome per valid zone, the solver exit code and any
    /// retained working directory.
    fn estimate_activity(
        &self,
        valid: &[ValidZone<'_>],
        catalog: &EventCatalog,
    ) -> Result<(Vec<ZoneOutcome>, Option<i32>, Option<PathBuf>), AppError> {
        let Some(estimator) = &self.activity else {
            return Ok((unavailable_for(valid, "activity estimation disabled"), None, None));
        };
        if valid.is_empty() {
            return Ok((Vec::new(), None, None));
        }

        let reconcile = &self.config.reconcile;
        let request = catalog.cut(&window_filter(reconcile, None));
        let zones: Vec<Zone> = valid.iter().map(|v| v.zone.clone()).collect();

        match estimator.estimate(&zones, &request, reconcile.mmin) {
            Ok(batch) => {
                let outcomes = batch.zones.into_iter().map(ZoneOutcome::from).collect();
                Ok((outcomes, batch.exit_code, batch.workdir))
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!("activity request failed: {e}");
                Ok((unavailable_for(valid, &e.to_string()), None, None))
            }
        }
    }

    fn summarize(&self, posterior: &ActivityPosterior) -> Estimate<ActivitySummary> {
        let selection = self.config.solver.selection;
        match selection.select(posterior) {
            Some((index, s)) => {
                let reference_mag = self.config.reconcile.reference_mmin;
                Estimate::Available {
                    value: ActivitySummary {
                        a: s.a,
                        b: s.b,
                        weight: s.weight,
                        activity_rate: activity_rate(s.a, s.b, reference_mag),
                        reference_mag,
                        index,
                        sample_count: posterior.samples.len(),
                        samples_text: posterior.samples_text.clone(),
                    },
                }
            }
            None => Estimate::unavailable(format!(
                "no representative sample ({selection:?}) in a block of {} of {} samples",
                posterior.samples.len(),
                posterior.declared_len
            )),
        }
    }
}

/// Activity outcome with errors already rendered for the record.
struct ZoneOutcome {
    prior_source: PriorSource,
    posterior: Result<ActivityPosterior, String>,
    notes: Vec<String>,
}

impl From<ZoneActivity> for ZoneOutcome {
    fn from(z: ZoneActivity) -> Self {
        Self {
            prior_source: z.prior_source,
            posterior: z.posterior.map_err(|e| e.to_string()),
            notes: z.notes,
        }
    }
}

fn unavailable_for(valid: &[ValidZone<'_>], reason: &str) -> Vec<ZoneOutcome> {
    valid
        .iter()
        .map(|v| ZoneOutcome {
            prior_source: ZonePriors::for_zone(v.zone).1,
            posterior: Err(reason.to_string()),
            notes: Vec::new(),
        })
        .collect()
}

fn validate_zones(zones: &[Zone]) -> (Vec<ValidZone<'_>>, Vec<SkippedZone>) {
    let mut valid = Vec::with_capacity(zones.len());
    let mut skipped = Vec::new();

    for zone in zones {
        let checked = ZonePolygon::from_vertices(&zone.id, &zone.vertices).and_then(|polygon| {
            let area_km2 = match zone.area_km2 {
                Some(area) if area.is_finite() && area > 0.0 => area,
                Some(area) => {
                    return Err(AppError::geometry(&zone.id, format!("explicit area {area} km² is not positive")));
                }
                None => polygon.area_km2(),
            };
            Ok(ValidZone {
                zone,
                polygon,
                area_km2,
            })
        });

        match checked {
            Ok(v) => valid.push(v),
            Err(e) => {
                warn!(zone = %zone.id, "skipping zone: {e}");
                skipped.push(SkippedZone {
                    zone_id: zone.id.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
    (valid, skipped)
}
