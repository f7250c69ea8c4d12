//! Domain types used throughout the analyses.
//!
//! This module defines:
//!
//! - the ordered parameter vector (`ParameterVector`)
//! - per-parameter settings (`ParameterSpec`, `Distribution`)
//! - the verifier outcome (`VerificationOutcome`)

pub mod types;

pub use types::*;
