//! Feature-attribute store.
//!
//! The engine never writes positional columns: records are flattened into a
//! name -> typed value map and handed to an `AttributeStore`, which owns its
//! own column layout.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Estimate, PriorSource, ZoneRecord};
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttrType {
    Real,
    Integer,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDef {
    pub name: &'static str,
    pub kind: AttrType,
}

const fn def(name: &'static str, kind: AttrType) -> AttributeDef {
    AttributeDef { name, kind }
}

/// A typed attribute value; `Null` marks an unavailable estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl AttrValue {
    pub fn kind(&self) -> Option<AttrType> {
        match self {
            AttrValue::Null => None,
            AttrValue::Real(_) => Some(AttrType::Real),
            AttrValue::Integer(_) => Some(AttrType::Integer),
            AttrValue::Text(_) => Some(AttrType::Text),
        }
    }

    /// Plain-text rendering for tabular exports (empty for `Null`).
    pub fn to_field(&self) -> String {
        match self {
            AttrValue::Null => String::new(),
            AttrValue::Real(v) => format!("{v:e}"),
            AttrValue::Integer(v) => v.to_string(),
            AttrValue::Text(s) => s.clone(),
        }
    }
}

impl From<Option<f64>> for AttrValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(AttrValue::Null, AttrValue::Real)
    }
}

pub type AttributeMap = BTreeMap<String, AttrValue>;

pub trait AttributeStore {
    /// Make sure every attribute exists with the given type.
    fn ensure_schema(&mut self, defs: &[AttributeDef]) -> Result<(), AppError>;

    /// Write values for one feature. Every key must be in the schema.
    fn write(&mut self, feature_id: &str, values: &AttributeMap) -> Result<(), AppError>;
}

/// Attributes written for each zone, in display order.
pub const ZONE_SCHEMA: [AttributeDef; 16] = [
    def("area_km2", AttrType::Real),
    def("mmax", AttrType::Real),
    def("prior_src", AttrType::Text),
    def("a", AttrType::Real),
    def("b", AttrType::Real),
    def("act_rate", AttrType::Real),
    def("ref_mag", AttrType::Real),
    def("n_samples", AttrType::Integer),
    def("samples", AttrType::Text),
    def("mr_cat", AttrType::Real),
    def("mr_act", AttrType::Real),
    def("mr_act_area", AttrType::Real),
    def("mr_barba", AttrType::Real),
    def("mr_bird", AttrType::Real),
    def("mr_slip_min", AttrType::Real),
    def("mr_slip_max", AttrType::Real),
];

fn prior_label(source: PriorSource) -> &'static str {
    match source {
        PriorSource::Explicit => "explicit",
        PriorSource::Derived => "derived",
        PriorSource::Placeholder => "placeholder",
    }
}

/// Flatten a zone record into `ZONE_SCHEMA` attributes.
pub fn zone_attributes(record: &ZoneRecord) -> AttributeMap {
    let activity = record.activity.value();
    let m = &record.moment;
    let central = |e: &Estimate<Vec<f64>>| -> AttrValue {
        activity
            .and_then(|s| e.value().and_then(|rates| rates.get(s.index)))
            .copied()
            .into()
    };

    let values = [
        ("area_km2", AttrValue::Real(record.area_km2)),
        ("mmax", AttrValue::Real(record.mmax)),
        ("prior_src", AttrValue::Text(prior_label(record.prior_source).to_string())),
        ("a", activity.map(|s| s.a).into()),
        ("b", activity.map(|s| s.b).into()),
        ("act_rate", activity.map(|s| s.activity_rate).into()),
        ("ref_mag", activity.map(|s| s.reference_mag).into()),
        (
            "n_samples",
            activity.map_or(AttrValue::Null, |s| AttrValue::Integer(s.sample_count as i64)),
        ),
        (
            "samples",
            activity.map_or(AttrValue::Null, |s| AttrValue::Text(s.samples_text.clone())),
        ),
        ("mr_cat", m.from_catalog.value().copied().into()),
        ("mr_act", central(&m.from_activity)),
        ("mr_act_area", central(&m.from_activity_area)),
        ("mr_barba", m.from_strain_barba.value().copied().into()),
        ("mr_bird", m.from_strain_bird.value().copied().into()),
        ("mr_slip_min", m.from_slip.value().map(|r| r.min).into()),
        ("mr_slip_max", m.from_slip.value().map(|r| r.max).into()),
    ];
    values.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// Ensure the zone schema and write every record.
pub fn write_zone_records<S: AttributeStore>(store: &mut S, records: &[ZoneRecord]) -> Result<(), AppError> {
    store.ensure_schema(&ZONE_SCHEMA)?;
    for record in records {
        store.write(&record.zone_id, &zone_attributes(record))?;
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryAttributeStore {
    schema: BTreeMap<String, AttrType>,
    features: BTreeMap<String, AttributeMap>,
}

impl MemoryAttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, feature_id: &str) -> Option<&AttributeMap> {
        self.features.get(feature_id)
    }

    pub fn feature_ids(&self) -> impl Iterator<Item = &str> {
        self.features.keys().map(String::as_str)
    }
}

impl AttributeStore for MemoryAttributeStore {
    fn ensure_schema(&mut self, defs: &[AttributeDef]) -> Result<(), AppError> {
        for d in defs {
            match self.schema.get(d.name) {
                Some(kind) if *kind != d.kind => {
                    return Err(AppError::input(format!(
                        "Attribute `{}` already exists with type {kind:?}, not {:?}.",
                        d.name, d.kind
                    )));
                }
                Some(_) => {}
                None => {
                    self.schema.insert(d.name.to_string(), d.kind);
                }
            }
        }
        Ok(())
    }

    fn write(&mut self, feature_id: &str, values: &AttributeMap) -> Result<(), AppError> {
        for (name, value) in values {
            let kind = self
                .schema
                .get(name)
                .ok_or_else(|| AppError::input(format!("Unknown attribute `{name}`.")))?;
            if value.kind().is_some_and(|k| k != *kind) {
                return Err(AppError::input(format!(
                    "Attribute `{name}` expects {kind:?}, got {value:?}."
                )));
            }
        }
        let entry = self.features.entry(feature_id.to_string()).or_default();
        for (name, value) in values {
            entry.insert(name.clone(), value.clone());
        }
        Ok(())
    }
}

/// Store persisted as one pretty JSON document, rewritten after each write.
#[derive(Debug)]
pub struct JsonAttributeStore {
    path: PathBuf,
    inner: MemoryAttributeStore,
}

impl JsonAttributeStore {
    /// Open an existing document or start an empty one.
    pub fn open(path: &Path) -> Result<Self, AppError> {
        let inner = if path.exists() {
            let raw = fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
            serde_json::from_str(&raw)
                .map_err(|e| AppError::input(format!("Invalid attribute store '{}': {e}", path.display())))?
        } else {
            MemoryAttributeStore::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            inner,
        })
    }

    pub fn get(&self, feature_id: &str) -> Option<&AttributeMap> {
        self.inner.get(feature_id)
    }

    fn flush(&self) -> Result<(), AppError> {
        let json = serde_json::to_string_pretty(&self.inner)
            .map_err(|e| AppError::internal(format!("Failed to serialize attribute store: {e}")))?;
        fs::write(&self.path, json).map_err(|e| AppError::io(&self.path, e))?;
        debug!(path = %self.path.display(), "attribute store written");
        Ok(())
    }
}

impl AttributeStore for JsonAttributeStore {
    fn ensure_schema(&mut self, defs: &[AttributeDef]) -> Result<(), AppError> {
        self.inner.ensure_schema(defs)?;
        self.flush()
    }

    fn write(&mut self, feature_id: &str, values: &AttributeMap) -> Result<(), AppError> {
        self.inner.write(feature_id, values)?;
        self.flush()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::{ActivitySummary, MomentRateEstimate, SlipRange};

    pub(crate) fn record() -> ZoneRecord {
        ZoneRecord {
            zone_id: "Z1".to_string(),
            area_km2: 10_000.0,
            mmax: 7.0,
            prior_source: PriorSource::Derived,
            activity: Estimate::Available {
                value: ActivitySummary {
                    a: 3.1,
                    b: 1.0,
                    weight: 0.6,
                    activity_rate: 10f64.powf(-1.9),
                    reference_mag: 5.0,
                    index: 1,
                    sample_count: 3,
                    samples_text: "0.2 3 0.9 0.6 3.1 1 0.2 3.2 1.1".to_string(),
                },
            },
            moment: MomentRateEstimate {
                from_catalog: Estimate::Available { value: 1.0e15 },
                from_activity: Estimate::Available {
                    value: vec![1.0e14, 2.0e14, 3.0e14],
                },
                from_activity_area: Estimate::Available {
                    value: vec![1.0e18, 2.0e18, 3.0e18],
                },
                from_strain_barba: Estimate::unavailable("scalar strain dataset not loaded"),
                from_strain_bird: Estimate::Available { value: 4.0e16 },
                from_slip: Estimate::Available {
                    value: SlipRange { min: 1.0e15, max: 5.0e15 },
                },
            },
            notes: vec![],
        }
    }

    #[test]
    fn attributes_use_the_representative_sample() {
        let attrs = zone_attributes(&record());
        assert_eq!(attrs.len(), ZONE_SCHEMA.len());
        assert_eq!(attrs["mr_act"], AttrValue::Real(2.0e14));
        assert_eq!(attrs["mr_barba"], AttrValue::Null);
        assert_eq!(attrs["n_samples"], AttrValue::Integer(3));
        assert_eq!(attrs["prior_src"], AttrValue::Text("derived".to_string()));
    }

    #[test]
    fn schema_type_conflicts_are_rejected() {
        let mut store = MemoryAttributeStore::new();
        store.ensure_schema(&[def("mmax", AttrType::Text)]).unwrap();
        assert!(store.ensure_schema(&ZONE_SCHEMA).is_err());
    }

    #[test]
    fn write_rejects_unknown_or_mistyped_attributes() {
        let mut store = MemoryAttributeStore::new();
        store.ensure_schema(&ZONE_SCHEMA).unwrap();

        let mut values = AttributeMap::new();
        values.insert("bogus".to_string(), AttrValue::Real(1.0));
        assert!(store.write("Z1", &values).is_err());

        let mut values = AttributeMap::new();
        values.insert("mmax".to_string(), AttrValue::Text("seven".to_string()));
        assert!(store.write("Z1", &values).is_err());
        assert!(store.get("Z1").is_none());
    }

    #[test]
    fn json_store_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attrs.json");

        let mut store = JsonAttributeStore::open(&path).unwrap();
        write_zone_records(&mut store, &[record()]).unwrap();

        let reopened = JsonAttributeStore::open(&path).unwrap();
        let attrs = reopened.get("Z1").unwrap();
        assert_eq!(attrs["mr_bird"], AttrValue::Real(4.0e16));
        assert_eq!(attrs["mr_barba"], AttrValue::Null);
        assert_eq!(attrs["n_samples"], AttrValue::Integer(3));
    }
}
