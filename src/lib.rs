//! `zone-rates` library crate.
//!
//! Activity and moment-rate parameters for polygonal seismic source zones.
//! The binary (`zrates`) is a thin wrapper around this library so that the
//! numeric core and the solver protocol are testable without spawning
//! processes.

pub mod activity;
pub mod app;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod geometry;
pub mod io;
pub mod logging;
pub mod models;
pub mod reconcile;
pub mod report;
pub mod store;
pub mod strain;
