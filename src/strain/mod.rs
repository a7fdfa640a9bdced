//! Geodetic strain-rate handling.
//!
//! - regime constants and the coarse regime map (`regimes`)
//! - tensor classification into six fault-style regimes (`classifier`)
//! - per-zone strain moment-rate integration (`estimators`)

pub mod classifier;
pub mod estimators;
pub mod regimes;

pub use classifier::*;
pub use estimators::*;
pub use regimes::*;
