//! Command-line parsing for the zone parameter engine.
//!
//! Argument parsing and command dispatch stay separate from the numeric
//! core; `app` turns these structs into configuration and pipeline calls.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::activity::CentralSelection;
use crate::domain::CoarseRegime;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "zrates",
    version,
    about = "Activity and moment-rate parameters for seismic source zones"
)]
pub struct Cli {
    /// Debug-level logging (`RUST_LOG` takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the full pipeline: activity solver, moment-rate estimates, exports.
    Estimate(EstimateArgs),
    /// Classify one strain-rate tensor sample into a fault-style regime.
    Classify(ClassifyArgs),
    /// Evaluate a single moment or moment-rate conversion.
    Moment(MomentArgs),
    /// Write the solver input files without running the solver.
    Encode(EncodeArgs),
    /// Generate a synthetic Gutenberg-Richter catalog inside a zone.
    Synth(SynthArgs),
}

/// Zone inputs shared by commands that read a zone set.
#[derive(Debug, Args, Clone)]
pub struct ZoneInputArgs {
    /// Zone definitions (JSON array).
    #[arg(long, value_name = "JSON")]
    pub zones: PathBuf,

    /// Mmax table `zone_id,mmax[,weight]`; several rows per zone are bins.
    #[arg(long, value_name = "CSV")]
    pub mmax_table: Option<PathBuf>,

    /// Completeness table `zone_id,mc,start_year`.
    #[arg(long, value_name = "CSV")]
    pub completeness_table: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct EstimateArgs {
    #[command(flatten)]
    pub input: ZoneInputArgs,

    /// Earthquake catalog `time,lon,lat,depth,mag`.
    #[arg(long, value_name = "CSV")]
    pub catalog: PathBuf,

    /// Fault sources with slip-rate brackets (JSON array).
    #[arg(long, value_name = "JSON")]
    pub faults: Option<PathBuf>,

    /// Scalar strain grid `lon,lat,strain`.
    #[arg(long, value_name = "CSV")]
    pub barba: Option<PathBuf>,

    /// Tensor strain grid `lon,lat,epp,ett,ept`.
    #[arg(long, value_name = "CSV")]
    pub bird: Option<PathBuf>,

    /// Deformation regime polygons `regime,lon1,lat1,...,lon5,lat5`.
    #[arg(long, value_name = "CSV")]
    pub regimes: Option<PathBuf>,

    /// Engine configuration (JSON); flags below override it.
    #[arg(long, value_name = "JSON")]
    pub config: Option<PathBuf>,

    /// Activity solver executable (else `ZRATES_SOLVER`).
    #[arg(long, value_name = "PATH")]
    pub solver: Option<PathBuf>,

    /// Skip the activity solver; activity estimates are reported unavailable.
    #[arg(long, conflicts_with = "solver")]
    pub no_activity: bool,

    /// Representative-sample policy for posterior blocks.
    #[arg(long, value_enum)]
    pub selection: Option<CentralSelection>,

    /// Keep the solver working directory after the run.
    #[arg(long)]
    pub keep_workdir: bool,

    /// Solver timeout in seconds (0 disables it).
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Minimum magnitude for the solver and the catalog cut.
    #[arg(long)]
    pub mmin: Option<f64>,

    /// Catalog depth window lower bound (km).
    #[arg(long)]
    pub min_depth: Option<f64>,

    /// Catalog depth window upper bound (km).
    #[arg(long)]
    pub max_depth: Option<f64>,

    /// Catalog time span override (years).
    #[arg(long)]
    pub span_years: Option<f64>,

    /// Cut the catalog to the zone grown by this many km.
    #[arg(long, value_name = "KM", conflicts_with = "background")]
    pub buffer_km: Option<f64>,

    /// Cut the catalog to each zone's background polygon when present.
    #[arg(long)]
    pub background: bool,

    /// Export per-zone records to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Export full records (all posterior rates and reasons) to JSON.
    #[arg(long = "export-json", value_name = "JSON")]
    pub export_json: Option<PathBuf>,

    /// Write zone attributes into a JSON attribute store.
    #[arg(long, value_name = "JSON")]
    pub store: Option<PathBuf>,
}

/// Coarse regime given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RegimeArg {
    Continental,
    Ridge,
}

impl From<RegimeArg> for CoarseRegime {
    fn from(value: RegimeArg) -> Self {
        match value {
            RegimeArg::Continental => CoarseRegime::Continental,
            RegimeArg::Ridge => CoarseRegime::RidgeTransform,
        }
    }
}

#[derive(Debug, Parser, Clone)]
pub struct ClassifyArgs {
    /// Strain rate along p (1e-9/yr).
    #[arg(long, allow_hyphen_values = true)]
    pub epp: f64,

    /// Strain rate along t (1e-9/yr).
    #[arg(long, allow_hyphen_values = true)]
    pub ett: f64,

    /// Shear strain rate (1e-9/yr).
    #[arg(long, allow_hyphen_values = true)]
    pub ept: f64,

    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub lon: f64,

    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub lat: f64,

    /// Coarse regime of the point.
    #[arg(long, value_enum, default_value_t = RegimeArg::Continental)]
    pub regime: RegimeArg,

    /// Look the coarse regime up in these regime polygons instead.
    #[arg(long, value_name = "CSV")]
    pub regimes: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct MomentArgs {
    #[command(subcommand)]
    pub kind: MomentKind,
}

#[derive(Debug, Subcommand, Clone)]
pub enum MomentKind {
    /// Seismic moment (Nm) of one or more Mw values.
    Magnitude {
        #[arg(required = true, allow_hyphen_values = true)]
        mw: Vec<f64>,
    },
    /// Moment rate (Nm/yr) implied by Gutenberg-Richter `(a, b)`.
    Activity {
        #[arg(long, allow_hyphen_values = true)]
        a: f64,
        #[arg(long)]
        b: f64,
        #[arg(long)]
        mmax: f64,
        /// Lower bound of the moment integral.
        #[arg(long, default_value_t = 5.0)]
        mref: f64,
    },
    /// Moment rate bracket (Nm/yr) from a slip-rate bracket.
    Slip {
        /// Minimum slip rate (mm/yr).
        #[arg(long)]
        slip_min: f64,
        /// Maximum slip rate (mm/yr).
        #[arg(long)]
        slip_max: f64,
        /// Fault area (m²).
        #[arg(long)]
        area_m2: f64,
    },
}

#[derive(Debug, Parser, Clone)]
pub struct EncodeArgs {
    #[command(flatten)]
    pub input: ZoneInputArgs,

    /// Directory receiving the solver input files.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub dir: PathBuf,

    /// Also write the solver catalog file from this catalog.
    #[arg(long, value_name = "CSV")]
    pub catalog: Option<PathBuf>,

    /// Minimum magnitude written to the zone file header.
    #[arg(long, default_value_t = 3.5)]
    pub mmin: f64,
}

#[derive(Debug, Parser, Clone)]
pub struct SynthArgs {
    /// Zone definitions (JSON array).
    #[arg(long, value_name = "JSON")]
    pub zones: PathBuf,

    /// Zone whose polygon receives the epicentres.
    #[arg(long)]
    pub zone: String,

    /// Annual cumulative a-value.
    #[arg(long, default_value_t = 3.0)]
    pub a: f64,

    #[arg(long, default_value_t = 1.0)]
    pub b: f64,

    #[arg(long, default_value_t = 3.0)]
    pub mmin: f64,

    #[arg(long, default_value_t = 7.0)]
    pub mmax: f64,

    #[arg(long, default_value_t = 1950)]
    pub start_year: i32,

    /// Catalog length in years.
    #[arg(long, default_value_t = 70.0)]
    pub years: f64,

    #[arg(long, default_value_t = 0.0)]
    pub min_depth: f64,

    #[arg(long, default_value_t = 30.0)]
    pub max_depth: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Output CSV (stdout when omitted).
    #[arg(long, value_name = "CSV")]
    pub out: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_parses_overrides() {
        let cli = Cli::parse_from([
            "zrates",
            "estimate",
            "--zones",
            "z.json",
            "--catalog",
            "c.csv",
            "--selection",
            "max-weight",
            "--buffer-km",
            "25",
            "--timeout",
            "30",
        ]);
        let Command::Estimate(args) = cli.command else {
            panic!("expected estimate");
        };
        assert_eq!(args.selection, Some(CentralSelection::MaxWeight));
        assert_eq!(args.buffer_km, Some(25.0));
        assert_eq!(args.timeout, Some(30));
        assert!(!args.no_activity);
    }

    #[test]
    fn classify_accepts_negative_rates() {
        let cli = Cli::parse_from(["zrates", "classify", "--epp", "-12.5", "--ett", "3", "--ept", "-1", "--regime", "ridge"]);
        let Command::Classify(args) = cli.command else {
            panic!("expected classify");
        };
        assert_eq!(args.epp, -12.5);
        assert_eq!(CoarseRegime::from(args.regime), CoarseRegime::RidgeTransform);
    }

    #[test]
    fn buffer_and_background_conflict() {
        let parsed = Cli::try_parse_from([
            "zrates",
            "estimate",
            "--zones",
            "z.json",
            "--catalog",
            "c.csv",
            "--buffer-km",
            "5",
            "--background",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
