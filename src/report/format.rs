//! Formatted terminal output for zone runs and single classifications.
//!
//! Formatting lives here so the pipeline stays free of presentation and
//! output changes stay localized.

use crate::activity::CentralSelection;
use crate::domain::{Estimate, SkippedZone, TensorStrainSample, ZoneRecord};
use crate::report::{Coverage, coverage, zone_row};
use crate::strain::StrainClassification;

/// Run-level facts printed above the zone table.
#[derive(Debug, Clone, Copy)]
pub struct RunFacts {
    pub span_years: Option<f64>,
    /// `None` when the solver was not run.
    pub solver_exit: Option<i32>,
    pub selection: CentralSelection,
}

/// Header block: counts, catalog span, solver status, estimator coverage.
pub fn format_run_summary(records: &[ZoneRecord], skipped: &[SkippedZone], facts: &RunFacts) -> String {
    let mut out = String::new();

    out.push_str("=== zrates - zone moment-rate parameters ===\n");
    out.push_str(&format!(
        "Zones: {} computed | {} skipped\n",
        records.len(),
        skipped.len()
    ));
    match facts.span_years {
        Some(span) => out.push_str(&format!("Catalog span: {span:.2} years\n")),
        None => out.push_str("Catalog span: unknown\n"),
    }
    match facts.solver_exit {
        Some(code) => out.push_str(&format!("Activity solver: exit {code} | selection {:?}\n", facts.selection)),
        None => out.push_str("Activity solver: not run\n"),
    }

    let c = coverage(records);
    out.push_str(&format_coverage(&c));
    out.push('\n');
    out
}

fn format_coverage(c: &Coverage) -> String {
    format!(
        "Estimates available: catalog {}/{n} | activity {}/{n} | barba {}/{n} | bird {}/{n} | slip {}/{n}\n",
        c.catalog,
        c.activity,
        c.barba,
        c.bird,
        c.slip,
        n = c.zones
    )
}

/// One row per zone; moment rates in Nm/yr, `-` where unavailable.
pub fn format_zone_table(records: &[ZoneRecord]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<16} {:>10} {:>5} {:>6} {:>5} {:>10} {:>10} {:>10} {:>10} {:>10} {:<21}\n",
            "zone", "area_km2", "mmax", "a", "b", "mr_cat", "mr_act", "barba", "bird", "act_rate", "slip"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<16} {:-<10} {:-<5} {:-<6} {:-<5} {:-<10} {:-<10} {:-<10} {:-<10} {:-<10} {:-<21}\n",
            "", "", "", "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for record in records {
        let row = zone_row(record);
        let slip = match row.slip {
            Some(s) => format!("{:.2e}..{:.2e}", s.min, s.max),
            None => "-".to_string(),
        };
        out.push_str(
            format!(
                "{:<16} {:>10.1} {:>5.2} {:>6} {:>5} {:>10} {:>10} {:>10} {:>10} {:>10} {:<21}\n",
                truncate(&row.zone_id, 16),
                row.area_km2,
                row.mmax,
                fmt_fixed(row.a, 2),
                fmt_fixed(row.b, 2),
                fmt_sci(row.catalog),
                fmt_sci(row.activity),
                fmt_sci(row.barba),
                fmt_sci(row.bird),
                fmt_sci(row.activity_rate),
                slip,
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

/// Skipped zones, then unavailable-estimate reasons and notes per zone.
pub fn format_notes(records: &[ZoneRecord], skipped: &[SkippedZone]) -> String {
    let mut out = String::new();

    if !skipped.is_empty() {
        out.push_str("Skipped zones:\n");
        for s in skipped {
            out.push_str(&format!("- {}: {}\n", s.zone_id, s.reason));
        }
    }

    for record in records {
        let mut lines = Vec::new();
        let m = &record.moment;
        let reasons = [
            ("activity", reason(&record.activity)),
            ("catalog", reason(&m.from_catalog)),
            ("strain barba", reason(&m.from_strain_barba)),
            ("strain bird", reason(&m.from_strain_bird)),
            ("slip", reason(&m.from_slip)),
        ];
        for (name, why) in reasons {
            if let Some(why) = why {
                lines.push(format!("{name} unavailable: {why}"));
            }
        }
        lines.extend(record.notes.iter().cloned());

        if !lines.is_empty() {
            out.push_str(&format!("{}:\n", record.zone_id));
            for l in lines {
                out.push_str(&format!("  {l}\n"));
            }
        }
    }
    out
}

fn reason<T>(e: &Estimate<T>) -> Option<&str> {
    match e {
        Estimate::Available { .. } => None,
        Estimate::Unavailable { reason } => Some(reason.as_str()),
    }
}

/// Classification of a single tensor sample.
pub fn format_classification(sample: &TensorStrainSample, c: &StrainClassification) -> String {
    let p = &c.principal;
    let mut out = String::new();
    out.push_str(&format!(
        "Sample: lon={:.3} lat={:.3} epp={} ett={} ept={}\n",
        sample.lon, sample.lat, sample.epp, sample.ett, sample.ept
    ));
    out.push_str(&format!("Regime: {} ({})\n", c.fine.code(), c.coarse.code()));
    out.push_str(&format!(
        "Principal: e1={:.4} e2={:.4} e3={:.4} | err={:.4} e1h={:.4} e2h={:.4}\n",
        p.e1, p.e2, p.e3, p.err, p.e1h, p.e2h
    ));
    out.push_str(&format!(
        "Parameters: cz={} km | corner Mw={}\n",
        c.params.cz_km, c.params.corner_mag
    ));
    out.push_str(&format!("Moment density: {:.4} km*1e-9/yr\n", c.moment_density));
    match c.compression_azimuth {
        Some(az) => out.push_str(&format!("Compression azimuth: {az:.1} deg\n")),
        None => out.push_str("Compression azimuth: undefined (isotropic)\n"),
    }
    out
}

fn fmt_sci(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), |x| format!("{x:.3e}"))
}

fn fmt_fixed(v: Option<f64>, decimals: usize) -> String {
    v.map_or_else(|| "-".to_string(), |x| format!("{x:.decimals$}"))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhysicalConstants;
    use crate::domain::CoarseRegime;
    use crate::store::tests::record;
    use crate::strain::{RegimeTable, StrainClassifier};

    #[test]
    fn table_marks_unavailable_with_dash() {
        let table = format_zone_table(&[record()]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("zone"));
        assert!(lines[2].starts_with("Z1"));
        assert!(lines[2].contains(" - "), "{}", lines[2]);
        assert!(lines[2].contains("2.000e14"), "{}", lines[2]);
    }

    #[test]
    fn summary_reports_solver_and_coverage() {
        let facts = RunFacts {
            span_years: Some(50.0),
            solver_exit: Some(0),
            selection: CentralSelection::MiddleIndex,
        };
        let text = format_run_summary(&[record()], &[], &facts);
        assert!(text.contains("1 computed | 0 skipped"));
        assert!(text.contains("50.00 years"));
        assert!(text.contains("barba 0/1"));
    }

    #[test]
    fn notes_list_reasons_and_skips() {
        let skipped = [SkippedZone {
            zone_id: "Z9".to_string(),
            reason: "2 vertices".to_string(),
        }];
        let text = format_notes(&[record()], &skipped);
        assert!(text.contains("- Z9: 2 vertices"));
        assert!(text.contains("strain barba unavailable: scalar strain dataset not loaded"));
    }

    #[test]
    fn classification_names_the_regime() {
        let table = RegimeTable::default();
        let constants = PhysicalConstants::default();
        let sample = TensorStrainSample {
            lon: 10.0,
            lat: 45.0,
            epp: -20.0,
            ett: 0.0,
            ept: 0.0,
        };
        let c = StrainClassifier::new(&table, &constants)
            .classify(&sample, CoarseRegime::Continental)
            .unwrap();
        let text = format_classification(&sample, &c);
        assert!(text.contains(&format!("Regime: {} (C)", c.fine.code())));
    }

    #[test]
    fn truncate_marks_cut_names() {
        assert_eq!(truncate("short", 16), "short");
        assert_eq!(truncate("abcdefgh", 5), "abcd.");
    }
}
