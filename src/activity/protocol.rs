//! Activity solver file protocol.
//!
//! Zone input file (`zones.dat`):
//!
//! ```text
//! Mmin.......:3.5
//! # zones....:002
//! 0001 , 4
//! <lat> , <lon>            one line per vertex, latitude first
//! 1                        number of Mmax bins
//! 7 1                      <mmax> <weight>
//! 1                        number of completeness periods
//! 3.5 1900                 <magnitude> <start year>
//! 0 0 1 0                  <a prior> <a weight> <b prior> <b weight>
//! 0002 , 5
//! ...
//! ```
//!
//! Result file (`<zonefile-stem>_out.txt`): per zone a header line, a sample
//! count `N`, then `N` lines of `<weight> <a> <b>`. Blank lines are ignored
//! everywhere and zones are identified by position only.
//!
//! The solver limits file names to 30 characters, so the exchange always
//! uses the short fixed names below inside a private working directory.

use std::io::{self, Write};

use tracing::warn;

use crate::domain::{ActivityPosterior, ActivitySample, CompletenessPeriod, LonLat, MmaxBin, ZonePriors};
use crate::error::{AppError, Stage};
use crate::geometry::ZonePolygon;

pub const ZONE_FILE: &str = "zones.dat";
pub const CATALOG_FILE: &str = "catalog.dat";
pub const SOLVER_FILE: &str = "solver";

/// Upper bound on allocations sized from counts read out of a file.
const PREALLOC_LIMIT: usize = 4096;

fn capacity(declared: usize) -> usize {
    declared.min(PREALLOC_LIMIT)
}

/// `<stem>_out.txt` for a zone file name.
pub fn result_file_name(zone_file: &str) -> String {
    let stem = match zone_file.rfind('.') {
        Some(idx) if idx > 0 => &zone_file[..idx],
        _ => zone_file,
    };
    format!("{stem}_out.txt")
}

/// Write the zone input file for already validated polygons.
pub fn write_zone_file<W: Write>(
    out: &mut W,
    mmin: f64,
    zones: &[(&ZonePolygon, &ZonePriors)],
) -> io::Result<()> {
    writeln!(out, "Mmin.......:{mmin:.1}")?;
    writeln!(out, "# zones....:{:03}", zones.len())?;

    for (idx, (polygon, priors)) in zones.iter().enumerate() {
        let vertices = polygon.vertices();
        writeln!(out, "{:04} , {}", idx + 1, vertices.len())?;
        for v in &vertices {
            writeln!(out, "{} , {}", v.lat, v.lon)?;
        }

        writeln!(out, "{}", priors.mmax_bins.len())?;
        for bin in &priors.mmax_bins {
            writeln!(out, "{} {}", bin.mmax, bin.weight)?;
        }
        writeln!(out, "{}", priors.periods.len())?;
        for period in &priors.periods {
            writeln!(out, "{} {}", period.magnitude, period.start_year)?;
        }
        writeln!(
            out,
            "{} {} {} {}",
            priors.a_prior, priors.a_weight, priors.b_prior, priors.b_weight
        )?;
    }
    Ok(())
}

/// A zone block read back from a zone input file.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneBlock {
    pub index: usize,
    pub vertices: Vec<LonLat>,
    pub priors: ZonePriors,
}

/// Decoded zone input file.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneFile {
    pub mmin: f64,
    pub declared_zones: usize,
    pub zones: Vec<ZoneBlock>,
}

/// Read a zone input file back (inspection and round-trip checks).
pub fn parse_zone_file(text: &str) -> Result<ZoneFile, AppError> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty());

    let mut next = |what: &str| {
        lines
            .next()
            .ok_or_else(|| encode_error(format!("unexpected end of zone file, expected {what}")))
    };

    let (n, header) = next("Mmin header")?;
    let mmin = header
        .strip_prefix("Mmin.......:")
        .ok_or_else(|| encode_error(format!("line {n}: missing Mmin header")))
        .and_then(|v| parse_f64(n, v, Stage::Encode))?;
    let (n, header) = next("zone count header")?;
    let declared_zones = header
        .strip_prefix("# zones....:")
        .ok_or_else(|| encode_error(format!("line {n}: missing zone count header")))
        .and_then(|v| parse_usize(n, v, Stage::Encode))?;

    let mut zones = Vec::with_capacity(capacity(declared_zones));
    for _ in 0..declared_zones {
        let (n, line) = next("zone header")?;
        let (index, count) = split_pair(n, line, Stage::Encode)?;
        let index = parse_usize(n, index, Stage::Encode)?;
        let count = parse_usize(n, count, Stage::Encode)?;

        let mut vertices = Vec::with_capacity(capacity(count));
        for _ in 0..count {
            let (n, line) = next("vertex")?;
            let (lat, lon) = split_pair(n, line, Stage::Encode)?;
            vertices.push(LonLat::new(
                parse_f64(n, lon, Stage::Encode)?,
                parse_f64(n, lat, Stage::Encode)?,
            ));
        }

        let (n, line) = next("Mmax bin count")?;
        let bins = parse_usize(n, line, Stage::Encode)?;
        let mut mmax_bins = Vec::with_capacity(capacity(bins));
        for _ in 0..bins {
            let (n, line) = next("Mmax bin")?;
            let v = parse_fields::<2>(n, line, Stage::Encode)?;
            mmax_bins.push(MmaxBin {
                mmax: v[0],
                weight: v[1],
            });
        }

        let (n, line) = next("period count")?;
        let count = parse_usize(n, line, Stage::Encode)?;
        let mut periods = Vec::with_capacity(capacity(count));
        for _ in 0..count {
            let (n, line) = next("completeness period")?;
            let v = parse_fields::<2>(n, line, Stage::Encode)?;
            periods.push(CompletenessPeriod {
                magnitude: v[0],
                start_year: v[1],
            });
        }

        let (n, line) = next("a/b prior line")?;
        let v = parse_fields::<4>(n, line, Stage::Encode)?;
        zones.push(ZoneBlock {
            index,
            vertices,
            priors: ZonePriors {
                mmax_bins,
                periods,
                a_prior: v[0],
                a_weight: v[1],
                b_prior: v[2],
                b_weight: v[3],
            },
        });
    }

    Ok(ZoneFile {
        mmin,
        declared_zones,
        zones,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    ZoneStart,
    DataLength,
    DataLine { remaining: usize },
}

/// Decode a solver result file into one posterior per zone block, in file
/// order.
///
/// A malformed number is fatal. A truncated final block is kept as parsed
/// (see `ActivityPosterior::is_complete`) and logged.
pub fn parse_result_file(text: &str) -> Result<Vec<ActivityPosterior>, AppError> {
    let mut out: Vec<ActivityPosterior> = Vec::new();
    let mut state = ParseState::ZoneStart;

    for (idx, raw) in text.lines().enumerate() {
        let n = idx + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        state = match state {
            ParseState::ZoneStart => {
                out.push(ActivityPosterior::default());
                ParseState::DataLength
            }
            ParseState::DataLength => {
                let len = parse_usize(n, line, Stage::Parse)?;
                if let Some(current) = out.last_mut() {
                    current.declared_len = len;
                    current.samples.reserve(capacity(len));
                }
                if len == 0 {
                    ParseState::ZoneStart
                } else {
                    ParseState::DataLine { remaining: len }
                }
            }
            ParseState::DataLine { remaining } => {
                let v = parse_fields::<3>(n, line, Stage::Parse)?;
                if let Some(current) = out.last_mut() {
                    if !current.samples_text.is_empty() {
                        current.samples_text.push(' ');
                    }
                    current.samples_text.push_str(&format!("{} {} {}", v[0], v[1], v[2]));
                    current.samples.push(ActivitySample {
                        weight: v[0],
                        a: v[1],
                        b: v[2],
                    });
                }
                if remaining == 1 {
                    ParseState::ZoneStart
                } else {
                    ParseState::DataLine {
                        remaining: remaining - 1,
                    }
                }
            }
        };
    }

    match state {
        ParseState::ZoneStart => {}
        ParseState::DataLength => warn!("result file ends after a zone header without a sample count"),
        ParseState::DataLine { remaining } => {
            warn!("result file truncated: last zone block is missing {remaining} sample line(s)")
        }
    }

    Ok(out)
}

fn encode_error(message: String) -> AppError {
    AppError::protocol(Stage::Encode, message)
}

fn split_pair(n: usize, line: &str, stage: Stage) -> Result<(&str, &str), AppError> {
    line.split_once(',')
        .map(|(a, b)| (a.trim(), b.trim()))
        .ok_or_else(|| AppError::protocol(stage, format!("line {n}: expected '<x> , <y>', got '{line}'")))
}

fn parse_usize(n: usize, s: &str, stage: Stage) -> Result<usize, AppError> {
    s.trim()
        .parse::<usize>()
        .map_err(|_| AppError::protocol(stage, format!("line {n}: expected a count, got '{s}'")))
}

fn parse_f64(n: usize, s: &str, stage: Stage) -> Result<f64, AppError> {
    let v = s
        .trim()
        .parse::<f64>()
        .map_err(|_| AppError::protocol(stage, format!("line {n}: expected a number, got '{s}'")))?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(AppError::protocol(stage, format!("line {n}: non-finite number '{s}'")))
    }
}

fn parse_fields<const N: usize>(n: usize, line: &str, stage: Stage) -> Result<[f64; N], AppError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != N {
        return Err(AppError::protocol(
            stage,
            format!("line {n}: expected {N} fields, got {} in '{line}'", fields.len()),
        ));
    }
    let mut out = [0.0; N];
    for (slot, field) in out.iter_mut().zip(fields) {
        *slot = parse_f64(n, field, stage)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pentagon() -> Vec<LonLat> {
        vec![
            LonLat::new(7.25, 46.5),
            LonLat::new(8.125, 46.75),
            LonLat::new(8.6, 47.3),
            LonLat::new(7.9, 47.85),
            LonLat::new(6.95, 47.1),
        ]
    }

    #[test]
    fn result_name_uses_stem() {
        assert_eq!(result_file_name("zones.dat"), "zones_out.txt");
        assert_eq!(result_file_name("zones"), "zones_out.txt");
    }

    #[test]
    fn zone_file_header_and_vertex_block() {
        let poly = ZonePolygon::from_vertices("z", &pentagon()).unwrap();
        let priors = ZonePriors::placeholder();
        let mut buf = Vec::new();
        write_zone_file(&mut buf, 3.5, &[(&poly, &priors)]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Mmin.......:3.5");
        assert_eq!(lines[1], "# zones....:001");
        assert_eq!(lines[2], "0001 , 5");
        assert_eq!(lines[3], "46.5 , 7.25");
        assert_eq!(&lines[8..], &["1", "7 1", "1", "3.5 1900", "0 0 1 0"]);
    }

    #[test]
    fn zone_file_round_trip_preserves_vertex_order() {
        let poly = ZonePolygon::from_vertices("z", &pentagon()).unwrap();
        let priors = ZonePriors::placeholder();
        let mut buf = Vec::new();
        write_zone_file(&mut buf, 4.0, &[(&poly, &priors), (&poly, &priors)]).unwrap();

        let parsed = parse_zone_file(&String::from_utf8(buf).unwrap()).unwrap();
        assert_eq!(parsed.mmin, 4.0);
        assert_eq!(parsed.declared_zones, 2);
        assert_eq!(parsed.zones[1].index, 2);
        assert_eq!(parsed.zones[0].vertices, pentagon());
        assert_eq!(parsed.zones[0].priors, priors);
    }

    #[test]
    fn result_blocks_are_positional() {
        let text = "zone 1\n5\n0.1 3.0 0.9\n0.2 3.1 0.95\n\n0.4 3.2 1.0\n0.2 3.3 1.05\n0.1 3.4 1.1\nzone 2\n1\n1.0 2.5 1.2\n";
        let parsed = parse_result_file(text).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].declared_len, 5);
        assert_eq!(parsed[0].samples.len(), 5);
        assert_eq!(parsed[0].samples[2], ActivitySample { weight: 0.4, a: 3.2, b: 1.0 });
        assert!(parsed[0].samples_text.starts_with("0.1 3 0.9 0.2 3.1 0.95"));
        assert_eq!(parsed[1].samples, vec![ActivitySample { weight: 1.0, a: 2.5, b: 1.2 }]);
    }

    #[test]
    fn malformed_number_is_fatal() {
        let err = parse_result_file("zone\n2\n0.5 3.0 x\n0.5 3.1 1.0\n").unwrap_err();
        assert!(matches!(err, AppError::Protocol { stage: Stage::Parse, .. }));
        assert!(parse_result_file("zone\ntwo\n").is_err());
        assert!(parse_result_file("zone\n1\n0.5 3.0\n").is_err());
    }

    #[test]
    fn truncated_block_is_kept_incomplete() {
        let parsed = parse_result_file("zone\n3\n0.5 3.0 1.0\n").unwrap();
        assert_eq!(parsed.len(), 1);
        assert!(!parsed[0].is_complete());
    }

    #[test]
    fn empty_block_returns_to_zone_start() {
        let parsed = parse_result_file("zone a\n0\nzone b\n1\n1 2 1\n").unwrap();
        assert_eq!(parsed.len(), 2);
        assert!(parsed[0].samples.is_empty());
        assert_eq!(parsed[1].samples.len(), 1);
    }

    #[test]
    fn oversized_sample_count_is_truncated_not_allocated() {
        let text = format!("zone 1\n{}\n1 3 1\n", usize::MAX);
        let parsed = parse_result_file(&text).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].declared_len, usize::MAX);
        assert_eq!(parsed[0].samples.len(), 1);
        assert!(!parsed[0].is_complete());
    }

    #[test]
    fn oversized_zone_count_ends_in_an_error() {
        let text = format!("Mmin.......:3.5\n# zones....:{}\n", usize::MAX);
        let err = parse_zone_file(&text).unwrap_err();
        assert!(matches!(err, AppError::Protocol { stage: Stage::Encode, .. }));
    }
}
