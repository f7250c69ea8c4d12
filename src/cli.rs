//! Command-line parsing for the margin analysis driver.
//!
//! All analysis selection lives in the TOML configuration; the command line
//! only says where that configuration is and how chatty the run should be.

use std::path::PathBuf;

use clap::Parser;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "margins",
    version,
    about = "Margin, yield, and optimization analysis for simulated circuits"
)]
pub struct Cli {
    /// TOML configuration describing the circuit, the parameters, and the
    /// analysis to run.
    pub configuration: PathBuf,

    /// Print per-iteration progress during optimization.
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_configuration_path_and_verbose_flag() {
        let cli = Cli::parse_from(["margins", "-v", "run.toml"]);
        assert!(cli.verbose);
        assert_eq!(cli.configuration, PathBuf::from("run.toml"));

        let cli = Cli::parse_from(["margins", "run.toml"]);
        assert!(!cli.verbose);
    }

    #[test]
    fn configuration_path_is_required() {
        assert!(Cli::try_parse_from(["margins"]).is_err());
    }
}
