//! Domain types used throughout the engine.
//!
//! This module defines:
//!
//! - input snapshots (`Zone`, `FaultSource`, `CatalogEvent`, strain samples)
//! - solver exchange values (`ActivitySample`, `ActivityPosterior`, `ZonePriors`)
//! - outputs (`MomentRateEstimate`, `ZoneRecord`, `Estimate`)

pub mod types;

pub use types::*;
