//! Reporting utilities: display rows and estimator coverage.
//!
//! Estimators are shown side by side; nothing here combines them.

pub mod format;

pub use format::*;

use crate::domain::{SlipRange, ZoneRecord};

/// Display values of one zone record; `None` where an estimate is missing.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneRow {
    pub zone_id: String,
    pub area_km2: f64,
    pub mmax: f64,
    pub a: Option<f64>,
    pub b: Option<f64>,
    pub activity_rate: Option<f64>,
    pub catalog: Option<f64>,
    /// Activity moment rate of the representative sample.
    pub activity: Option<f64>,
    pub barba: Option<f64>,
    pub bird: Option<f64>,
    pub slip: Option<SlipRange>,
}

pub fn zone_row(record: &ZoneRecord) -> ZoneRow {
    let summary = record.activity.value();
    let m = &record.moment;
    ZoneRow {
        zone_id: record.zone_id.clone(),
        area_km2: record.area_km2,
        mmax: record.mmax,
        a: summary.map(|s| s.a),
        b: summary.map(|s| s.b),
        activity_rate: summary.map(|s| s.activity_rate),
        catalog: m.from_catalog.value().copied(),
        activity: summary.and_then(|s| m.from_activity.value().and_then(|r| r.get(s.index)).copied()),
        barba: m.from_strain_barba.value().copied(),
        bird: m.from_strain_bird.value().copied(),
        slip: m.from_slip.value().copied(),
    }
}

/// How many zones each estimator produced a value for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Coverage {
    pub zones: usize,
    pub catalog: usize,
    pub activity: usize,
    pub barba: usize,
    pub bird: usize,
    pub slip: usize,
}

pub fn coverage(records: &[ZoneRecord]) -> Coverage {
    let mut c = Coverage {
        zones: records.len(),
        ..Coverage::default()
    };
    for r in records {
        let m = &r.moment;
        c.catalog += usize::from(m.from_catalog.is_available());
        c.activity += usize::from(m.from_activity.is_available());
        c.barba += usize::from(m.from_strain_barba.is_available());
        c.bird += usize::from(m.from_strain_bird.is_available());
        c.slip += usize::from(m.from_slip.is_available());
    }
    c
}
