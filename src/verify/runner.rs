//! External simulator invocation.
//!
//! Every evaluation runs a fresh simulator process on its own temp netlist,
//! so no simulator state is ever shared between concurrent work units. The
//! process is invoked in batch form as `<simulator> -o <output.csv>
//! <netlist>` and polled with a hard timeout.

use std::io::Write;
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};

use crate::error::AppError;
use crate::verify::trace::{self, Trace};

#[derive(Debug, Clone)]
pub struct SimulatorRunner {
    executable: String,
    timeout: Duration,
}

impl SimulatorRunner {
    pub fn new(executable: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            executable: executable.into(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Simulate one netlist and return the parsed output trace.
    pub fn run(&self, netlist: &str) -> Result<Trace, AppError> {
        let mut netlist_file = tempfile::Builder::new()
            .suffix(".cir")
            .tempfile()
            .map_err(|e| AppError::new(3, format!("Failed to create temp netlist: {e}")))?;
        netlist_file
            .write_all(netlist.as_bytes())
            .map_err(|e| AppError::new(3, format!("Failed to write temp netlist: {e}")))?;

        let output_file = tempfile::Builder::new()
            .suffix(".csv")
            .tempfile()
            .map_err(|e| AppError::new(3, format!("Failed to create temp output file: {e}")))?;

        let child = Command::new(&self.executable)
            .arg("-o")
            .arg(output_file.path())
            .arg(netlist_file.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                AppError::new(3, format!("Failed to launch simulator '{}': {e}", self.executable))
            })?;

        let output = wait_with_timeout(child, self.timeout, &self.executable)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::new(
                3,
                format!(
                    "Simulator '{}' exited with {}: {}",
                    self.executable,
                    output.status,
                    stderr.trim()
                ),
            ));
        }

        let text = std::fs::read_to_string(output_file.path())
            .map_err(|e| AppError::new(3, format!("Failed to read simulator output: {e}")))?;
        trace::parse_simulated(&text)
    }
}

fn wait_with_timeout(mut child: Child, timeout: Duration, executable: &str) -> Result<Output, AppError> {
    let start = Instant::now();
    let poll_interval = Duration::from_millis(100);

    loop {
        match child.try_wait() {
            Ok(Some(_)) => {
                return child
                    .wait_with_output()
                    .map_err(|e| AppError::new(3, format!("Failed to collect simulator output: {e}")));
            }
            Ok(None) => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(AppError::new(
                        3,
                        format!(
                            "Simulator '{executable}' timed out after {}s",
                            timeout.as_secs()
                        ),
                    ));
                }
                std::thread::sleep(poll_interval);
            }
            Err(e) => {
                return Err(AppError::new(3, format!("Failed to poll simulator: {e}")));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn spawn_shell(script: &str) -> Child {
        Command::new("sh")
            .arg("-c")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap()
    }

    #[cfg(unix)]
    #[test]
    fn wait_with_timeout_collects_fast_processes() {
        let child = spawn_shell("echo done");
        let output = wait_with_timeout(child, Duration::from_secs(10), "sh").unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "done");
    }

    #[cfg(unix)]
    #[test]
    fn wait_with_timeout_kills_slow_processes() {
        let child = spawn_shell("sleep 5");
        let err = wait_with_timeout(child, Duration::from_millis(100), "sh").unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn missing_executable_is_a_simulation_error() {
        let runner = SimulatorRunner::new("definitely-not-a-simulator-on-path", 5);
        let err = runner.run("* empty\n.end\n").unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("Failed to launch"));
    }
}
