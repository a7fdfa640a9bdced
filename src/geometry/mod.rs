//! Polygon services consumed by the engine.
//!
//! Zone, fault and regime outlines are plain lon/lat rings. This module wraps
//! the `geo` crate so the rest of the engine only sees the few operations it
//! needs: construction with validation, point-in-polygon, buffered membership,
//! intersection, centroid and area on the sphere.

pub mod polygon;

pub use polygon::*;
