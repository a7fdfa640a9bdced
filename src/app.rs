//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads zones, catalog and datasets
//! - runs the zone parameter pipeline
//! - prints reports and writes optional exports

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use clap::Parser;
use tracing::{info, warn};

use crate::activity::{ZONE_FILE, write_zone_file};
use crate::catalog::EventCatalog;
use crate::cli::{ClassifyArgs, Command, EncodeArgs, EstimateArgs, MomentArgs, MomentKind, SynthArgs, ZoneInputArgs};
use crate::config::{CatalogRegion, EngineConfig, PhysicalConstants};
use crate::data::{SyntheticCatalogSpec, generate_catalog};
use crate::domain::{CoarseRegime, TensorStrainSample, Zone, ZonePriors};
use crate::error::AppError;
use crate::geometry::ZonePolygon;
use crate::io::{self, Loaded};
use crate::reconcile::StrainDatasets;
use crate::report::RunFacts;
use crate::store::{JsonAttributeStore, write_zone_records};
use crate::strain::{DeformationRegimeMap, RegimeLookup, RegimeTable, StrainClassifier};

pub mod pipeline;

use pipeline::{PipelineInputs, ZoneParameterPipeline};

/// Entry point for the `zrates` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();
    crate::logging::init(cli.verbose);

    match cli.command {
        Command::Estimate(args) => handle_estimate(args),
        Command::Classify(args) => handle_classify(args),
        Command::Moment(args) => handle_moment(args),
        Command::Encode(args) => handle_encode(args),
        Command::Synth(args) => handle_synth(args),
    }
}

fn handle_estimate(args: EstimateArgs) -> Result<(), AppError> {
    let config = engine_config_from_args(&args)?;

    let zones = load_zones(&args.input)?;
    let catalog = EventCatalog::new(report_rows(io::load_catalog_csv(&args.catalog)?, "catalog"));
    let faults = match &args.faults {
        Some(path) => io::load_faults_json(path)?,
        None => Vec::new(),
    };
    let strain = load_strain(&args)?;
    info!(
        zones = zones.len(),
        events = catalog.size(),
        faults = faults.len(),
        "inputs loaded"
    );

    let pipeline = if args.no_activity {
        ZoneParameterPipeline::without_activity(config)
    } else {
        ZoneParameterPipeline::from_config(config)?
    };
    let out = pipeline.run(PipelineInputs {
        zones: &zones,
        catalog: &catalog,
        faults: &faults,
        strain: &strain,
    })?;

    let facts = RunFacts {
        span_years: out.span_years,
        solver_exit: out.solver_exit,
        selection: pipeline.config().solver.selection,
    };
    println!("{}", crate::report::format_run_summary(&out.records, &out.skipped, &facts));
    println!("{}", crate::report::format_zone_table(&out.records));
    let notes = crate::report::format_notes(&out.records, &out.skipped);
    if !notes.is_empty() {
        println!("{notes}");
    }
    if let Some(dir) = &out.workdir {
        println!("Solver working directory kept at {}", dir.display());
    }

    // Optional exports.
    if let Some(path) = &args.export {
        io::export_records_csv(path, &out.records)?;
    }
    if let Some(path) = &args.export_json {
        io::export_records_json(path, &out.records, &out.skipped, out.span_years)?;
    }
    if let Some(path) = &args.store {
        let mut store = JsonAttributeStore::open(path)?;
        write_zone_records(&mut store, &out.records)?;
        info!(path = %path.display(), records = out.records.len(), "attribute store updated");
    }

    if out.records.is_empty() {
        return Err(AppError::geometry("*", "no zone has usable geometry"));
    }
    Ok(())
}

/// Defaults -> `--config` file -> flags.
pub fn engine_config_from_args(args: &EstimateArgs) -> Result<EngineConfig, AppError> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let solver = &mut config.solver;
    if let Some(path) = &args.solver {
        solver.binary = Some(path.clone());
    }
    if let Some(selection) = args.selection {
        solver.selection = selection;
    }
    if let Some(secs) = args.timeout {
        solver.timeout_secs = secs;
    }
    solver.keep_workdir |= args.keep_workdir;

    let r = &mut config.reconcile;
    if let Some(v) = args.mmin {
        r.mmin = v;
    }
    if let Some(v) = args.min_depth {
        r.min_depth_km = v;
    }
    if let Some(v) = args.max_depth {
        r.max_depth_km = v;
    }
    if let Some(v) = args.span_years {
        r.span_years = Some(v);
    }
    if let Some(km) = args.buffer_km {
        r.region = CatalogRegion::Buffer { km };
    } else if args.background {
        r.region = CatalogRegion::Background;
    }

    config.validate()?;
    Ok(config)
}

fn load_zones(args: &ZoneInputArgs) -> Result<Vec<Zone>, AppError> {
    let mut zones = io::load_zones_json(&args.zones)?;
    let mmax = match &args.mmax_table {
        Some(path) => {
            let (table, loaded) = io::load_mmax_table(path)?;
            report_rows(loaded, "mmax table");
            Some(table)
        }
        None => None,
    };
    let completeness = match &args.completeness_table {
        Some(path) => {
            let (table, loaded) = io::load_completeness_table(path)?;
            report_rows(loaded, "completeness table");
            Some(table)
        }
        None => None,
    };
    io::apply_zone_tables(&mut zones, mmax.as_ref(), completeness.as_ref());
    Ok(zones)
}

fn load_strain(args: &EstimateArgs) -> Result<StrainDatasets, AppError> {
    let scalar = match &args.barba {
        Some(path) => Some(report_rows(io::load_scalar_strain(path)?, "scalar strain grid")),
        None => None,
    };
    let tensor = match &args.bird {
        Some(path) => Some(report_rows(io::load_tensor_strain(path)?, "tensor strain grid")),
        None => None,
    };
    let regimes = match &args.regimes {
        Some(path) => load_regime_map(path)?,
        None => DeformationRegimeMap::default(),
    };
    Ok(StrainDatasets {
        scalar,
        tensor,
        regimes,
    })
}

fn load_regime_map(path: &Path) -> Result<DeformationRegimeMap, AppError> {
    let records = report_rows(io::load_regime_polygons(path)?, "regime polygons");
    Ok(DeformationRegimeMap::from_records(&records))
}

/// Log rejected rows of a loaded table and keep the good ones.
fn report_rows<T>(loaded: Loaded<T>, what: &str) -> Vec<T> {
    for e in &loaded.row_errors {
        match &e.id {
            Some(id) => warn!(line = e.line, id = %id, "{what}: {}", e.message),
            None => warn!(line = e.line, "{what}: {}", e.message),
        }
    }
    info!(read = loaded.rows_read, used = loaded.rows_used(), "{what} loaded");
    loaded.rows
}

fn handle_classify(args: ClassifyArgs) -> Result<(), AppError> {
    let sample = TensorStrainSample {
        lon: args.lon,
        lat: args.lat,
        epp: args.epp,
        ett: args.ett,
        ept: args.ept,
    };

    let coarse = match &args.regimes {
        Some(path) => {
            let map = load_regime_map(path)?;
            let point = crate::domain::LonLat::new(sample.lon, sample.lat);
            match map.lookup(point) {
                RegimeLookup::Known(regime) => regime,
                RegimeLookup::Other(code) => {
                    warn!(code = %code, "point in a regime polygon with an unrecognised code; using continental");
                    CoarseRegime::Continental
                }
                RegimeLookup::Outside => {
                    warn!("point outside the regime map; using continental");
                    CoarseRegime::Continental
                }
            }
        }
        None => CoarseRegime::from(args.regime),
    };

    let table = RegimeTable::default();
    let constants = PhysicalConstants::default();
    let classification = StrainClassifier::new(&table, &constants).classify(&sample, coarse)?;
    println!("{}", crate::report::format_classification(&sample, &classification));
    Ok(())
}

fn handle_moment(args: MomentArgs) -> Result<(), AppError> {
    let k = PhysicalConstants::default();
    match args.kind {
        MomentKind::Magnitude { mw } => {
            let moments = crate::models::magnitudes_to_moments(&mw, &k);
            for (m, m0) in mw.iter().zip(moments) {
                println!("Mw {m:.2}: M0 = {m0:.4e} Nm");
            }
        }
        MomentKind::Activity { a, b, mmax, mref } => {
            let rate = crate::models::moment_rate_from_activity(a, b, mmax, mref, &k)?;
            println!("a={a} b={b} Mmax={mmax} Mref={mref}: {rate:.4e} Nm/yr");
            println!(
                "Activity rate N(>={mref}) = {:.4e} /yr",
                crate::models::activity_rate(a, b, mref)
            );
        }
        MomentKind::Slip {
            slip_min,
            slip_max,
            area_m2,
        } => {
            let range = crate::models::moment_rate_from_slip(slip_min, slip_max, area_m2, &k)?;
            println!("slip {slip_min}..{slip_max} mm/yr over {area_m2:.4e} m²: {:.4e}..{:.4e} Nm/yr", range.min, range.max);
        }
    }
    Ok(())
}

fn handle_encode(args: EncodeArgs) -> Result<(), AppError> {
    let zones = load_zones(&args.input)?;

    let mut prepared = Vec::with_capacity(zones.len());
    for zone in &zones {
        match ZonePolygon::from_vertices(&zone.id, &zone.vertices) {
            Ok(polygon) => prepared.push((polygon, ZonePriors::for_zone(zone).0)),
            Err(e) => warn!(zone = %zone.id, "skipping zone: {e}"),
        }
    }
    if prepared.is_empty() {
        return Err(AppError::geometry("*", "no zone has usable geometry"));
    }
    let refs: Vec<_> = prepared.iter().map(|(p, priors)| (p, priors)).collect();

    std::fs::create_dir_all(&args.dir).map_err(|e| AppError::io(&args.dir, e))?;
    let path = args.dir.join(ZONE_FILE);
    let file = File::create(&path).map_err(|e| AppError::io(&path, e))?;
    let mut out = BufWriter::new(file);
    write_zone_file(&mut out, args.mmin, &refs)
        .and_then(|_| out.flush())
        .map_err(|e| AppError::io(&path, e))?;
    println!("Wrote {} zones to {}", refs.len(), path.display());

    if let Some(catalog_path) = &args.catalog {
        let catalog = EventCatalog::new(report_rows(io::load_catalog_csv(catalog_path)?, "catalog"));
        let path = args.dir.join(crate::activity::protocol::CATALOG_FILE);
        catalog.write_solver_file(&path)?;
        println!("Wrote {} events to {}", catalog.size(), path.display());
    }
    Ok(())
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let zones = io::load_zones_json(&args.zones)?;
    let zone = zones
        .iter()
        .find(|z| z.id == args.zone)
        .ok_or_else(|| AppError::input(format!("Zone '{}' not found in {}.", args.zone, args.zones.display())))?;
    let region = ZonePolygon::from_vertices(&zone.id, &zone.vertices)?;

    let spec = SyntheticCatalogSpec {
        a: args.a,
        b: args.b,
        mmin: args.mmin,
        mmax: args.mmax,
        start_year: args.start_year,
        years: args.years,
        min_depth_km: args.min_depth,
        max_depth_km: args.max_depth,
        seed: args.seed,
    };
    let catalog = generate_catalog(&spec, &region)?;
    info!(events = catalog.size(), expected = spec.expected_count(), "synthetic catalog generated");

    match &args.out {
        Some(path) => io::export_catalog_csv(path, &catalog)?,
        None => io::write_catalog_csv(std::io::stdout().lock(), &catalog)
            .map_err(|e| AppError::input(format!("Failed to write catalog: {e}")))?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::CentralSelection;

    fn args(extra: &[&str]) -> EstimateArgs {
        let mut argv = vec!["zrates", "estimate", "--zones", "z.json", "--catalog", "c.csv"];
        argv.extend_from_slice(extra);
        match crate::cli::Cli::parse_from(argv).command {
            Command::Estimate(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn flags_override_file_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"reconcile": {"mmin": 4.0, "max_depth_km": 40.0}, "solver": {"timeout_secs": 60}}"#)
            .unwrap();
        let path_arg = path.to_string_lossy().to_string();

        let config = engine_config_from_args(&args(&[
            "--config",
            &path_arg,
            "--mmin",
            "4.5",
            "--background",
            "--selection",
            "max-weight",
        ]))
        .unwrap();
        assert_eq!(config.reconcile.mmin, 4.5);
        assert_eq!(config.reconcile.max_depth_km, 40.0);
        assert_eq!(config.reconcile.region, CatalogRegion::Background);
        assert_eq!(config.solver.timeout_secs, 60);
        assert_eq!(config.solver.selection, CentralSelection::MaxWeight);
    }

    #[test]
    fn invalid_override_is_a_config_error() {
        let err = engine_config_from_args(&args(&["--min-depth", "50", "--max-depth", "10"])).unwrap_err();
        assert!(err.is_fatal());
    }
}
