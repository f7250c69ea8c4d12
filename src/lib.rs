//! `sim-margins` library crate.
//!
//! The binary (`margins`) is a thin wrapper around this library so that:
//!
//! - every analysis is testable against an in-process fake verifier
//! - the simulator boundary stays in one module (`verify`)
//! - reports can be golden tested without spawning anything
pub mod app;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod margin;
pub mod optimize;
pub mod pool;
pub mod report;
pub mod verify;
pub mod yields;
