//! Verifier boundary: pass/fail evaluation of one parameter vector.
//!
//! The analyses only ever see the `Verifier` trait. The production
//! implementation (`SimulatorVerifier`) substitutes overrides into the
//! circuit netlist, runs the configured external simulator on the result and
//! compares the produced trace against a reference trace.
//!
//! An `Err` from `verify` means the evaluation could not be completed
//! (simulator fault); it is never conflated with a failing outcome.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{ParameterVector, VerificationOutcome};
use crate::error::AppError;

pub mod netlist;
pub mod runner;
pub mod trace;

use runner::SimulatorRunner;
use trace::Trace;

/// Settings for the simulator-backed verifier, resolved from configuration.
#[derive(Debug, Clone)]
pub struct VerifySettings {
    /// Netlist with `.param` lines for every analysis parameter.
    pub circuit: PathBuf,
    /// Reference trace the simulated output must stay within.
    pub spec_file: PathBuf,
    /// Simulator executable (PATH lookup or absolute).
    pub simulator: String,
    /// Absolute per-sample comparison tolerance.
    pub threshold: f64,
    /// Hard timeout for one simulator run.
    pub timeout_secs: u64,
}

/// Pass/fail evaluation of one parameter vector.
///
/// Implementations must be callable concurrently from worker threads; the
/// production implementation shares nothing mutable between calls.
pub trait Verifier: Sync {
    fn verify(&self, overrides: &ParameterVector) -> Result<VerificationOutcome, AppError>;
}

/// Verifier backed by an external circuit simulator.
///
/// The netlist and the reference trace are loaded once at construction, so
/// missing or malformed input files fail the run before any analysis starts.
#[derive(Debug)]
pub struct SimulatorVerifier {
    circuit: PathBuf,
    netlist: String,
    reference: Trace,
    threshold: f64,
    runner: SimulatorRunner,
}

impl SimulatorVerifier {
    pub fn new(settings: &VerifySettings) -> Result<Self, AppError> {
        let netlist = fs::read_to_string(&settings.circuit).map_err(|e| {
            AppError::new(
                2,
                format!("Failed to read netlist '{}': {e}", settings.circuit.display()),
            )
        })?;
        let reference = trace::read_reference(&settings.spec_file)?;

        Ok(Self {
            circuit: settings.circuit.clone(),
            netlist,
            reference,
            threshold: settings.threshold,
            runner: SimulatorRunner::new(&settings.simulator, settings.timeout_secs),
        })
    }

    /// Check that every analysis parameter is defined by the netlist, so a
    /// name mismatch surfaces as a configuration error before any work is
    /// dispatched.
    pub fn ensure_parameters<'a>(&self, names: impl Iterator<Item = &'a str>) -> Result<(), AppError> {
        let defined = netlist::defined_parameters(&self.netlist);
        for name in names {
            if !defined.contains(&name.to_lowercase()) {
                return Err(AppError::new(
                    2,
                    format!(
                        "Parameter '{name}' is not defined in '{}'",
                        self.circuit.display()
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Write the netlist with the point's values substituted in.
    pub fn write_file_with_updated_parameters(
        &self,
        path: &Path,
        point: &ParameterVector,
    ) -> Result<(), AppError> {
        let patched = netlist::substitute_parameters(&self.netlist, point)?;
        fs::write(path, patched)
            .map_err(|e| AppError::new(2, format!("Failed to write netlist '{}': {e}", path.display())))
    }
}

impl Verifier for SimulatorVerifier {
    fn verify(&self, overrides: &ParameterVector) -> Result<VerificationOutcome, AppError> {
        let patched = netlist::substitute_parameters(&self.netlist, overrides)?;
        let simulated = self.runner.run(&patched)?;
        trace::compare_traces(&simulated, &self.reference, self.threshold)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    const CIRCUIT: &str = "* divider\n.param R1=1.0\nR1 1 0 R1\n.end\n";
    const EXPECTED: &str = "time,V(1)\n0.0,0.0\n1.0,1.0\n2.0,2.0\n";

    fn write_executable(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn settings(dir: &Path, simulator: String) -> VerifySettings {
        fs::write(dir.join("circuit.cir"), CIRCUIT).unwrap();
        fs::write(dir.join("expected.csv"), EXPECTED).unwrap();
        VerifySettings {
            circuit: dir.join("circuit.cir"),
            spec_file: dir.join("expected.csv"),
            simulator,
            threshold: 0.05,
            timeout_secs: 10,
        }
    }

    fn point(value: f64) -> ParameterVector {
        [("R1".to_string(), value)].into_iter().collect()
    }

    #[test]
    fn matching_simulator_output_passes() {
        let dir = tempfile::tempdir().unwrap();
        let sim = write_executable(
            dir.path(),
            "fake-sim",
            "#!/bin/sh\nprintf 'time,V(1)\\n0.0,0.0\\n1.0,1.0\\n2.0,2.0\\n' > \"$2\"\n",
        );
        let verifier = SimulatorVerifier::new(&settings(dir.path(), sim)).unwrap();

        let outcome = verifier.verify(&point(1.0)).unwrap();
        assert!(outcome.passed());
    }

    #[test]
    fn deviating_simulator_output_fails_with_time_and_point() {
        let dir = tempfile::tempdir().unwrap();
        let sim = write_executable(
            dir.path(),
            "fake-sim",
            "#!/bin/sh\nprintf 'time,V(1)\\n0.0,0.0\\n1.0,3.0\\n2.0,2.0\\n' > \"$2\"\n",
        );
        let verifier = SimulatorVerifier::new(&settings(dir.path(), sim)).unwrap();

        let outcome = verifier.verify(&point(1.0)).unwrap();
        assert!(!outcome.passed());
        assert_eq!(outcome.failure_time(), Some(1.0));
        assert_eq!(outcome.failure_point(), Some(3.0));
    }

    #[test]
    fn ensure_parameters_rejects_unknown_names() {
        let dir = tempfile::tempdir().unwrap();
        let sim = write_executable(dir.path(), "fake-sim", "#!/bin/sh\nexit 0\n");
        let verifier = SimulatorVerifier::new(&settings(dir.path(), sim)).unwrap();

        assert!(verifier.ensure_parameters(["R1"].into_iter()).is_ok());
        let err = verifier.ensure_parameters(["L9"].into_iter()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn writes_netlist_with_updated_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let sim = write_executable(dir.path(), "fake-sim", "#!/bin/sh\nexit 0\n");
        let verifier = SimulatorVerifier::new(&settings(dir.path(), sim)).unwrap();

        let out_path = dir.path().join("optimized.cir");
        verifier
            .write_file_with_updated_parameters(&out_path, &point(0.7))
            .unwrap();
        let written = fs::read_to_string(&out_path).unwrap();
        assert!(written.contains(".param R1=7e-1"), "got:\n{written}");
        assert!(written.contains("R1 1 0 R1"));
    }

    #[test]
    fn missing_circuit_file_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("expected.csv"), EXPECTED).unwrap();
        let err = SimulatorVerifier::new(&VerifySettings {
            circuit: dir.path().join("nope.cir"),
            spec_file: dir.path().join("expected.csv"),
            simulator: "sim".to_string(),
            threshold: 0.05,
            timeout_secs: 10,
        })
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("nope.cir"));
    }
}
