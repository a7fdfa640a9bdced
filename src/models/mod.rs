//! Physical conversion formulas.
//!
//! Like the rest of the numeric core these are small, pure functions over
//! `PhysicalConstants` so that estimators can stay generic.

pub mod moment;

pub use moment::*;
