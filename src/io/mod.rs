//! Input/output helpers.
//!
//! - catalog CSV and zone/fault JSON ingest + validation (`ingest`)
//! - background and strain dataset tables (`datasets`)
//! - record and catalog exports (`export`)

pub mod datasets;
pub mod export;
pub mod ingest;

pub use datasets::*;
pub use export::*;
pub use ingest::*;
