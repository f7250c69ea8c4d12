//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads and validates the TOML configuration
//! - builds the simulator-backed verifier
//! - runs the selected analysis on a bounded worker pool
//! - prints reports

use clap::Parser;

use crate::config::{Config, Mode};
use crate::domain::{ParameterSpec, nominal_vector};
use crate::error::AppError;
use crate::margin::MarginAnalysis;
use crate::optimize::Optimizer;
use crate::pool;
use crate::verify::{SimulatorVerifier, Verifier};
use crate::yields::YieldAnalysis;

/// Entry point for the `margins` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();
    println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let config = Config::load(&cli.configuration)?;
    let specs = config.parameter_specs()?;

    let verifier = SimulatorVerifier::new(&config.verify_settings())?;
    verifier.ensure_parameters(specs.iter().map(|spec| spec.name.as_str()))?;

    match config.mode {
        Mode::Verify => handle_verify(&verifier, &specs),
        Mode::Margin => handle_margin(&config, &verifier, &specs),
        Mode::Yield => handle_yield(&config, &verifier, &specs),
        Mode::Optimize => handle_optimize(&config, &verifier, &specs, cli.verbose),
    }
}

/// One simulation at the nominal point. A failing outcome is a completed
/// analysis and still exits zero; only simulator faults abort the run.
fn handle_verify(verifier: &SimulatorVerifier, specs: &[ParameterSpec]) -> Result<(), AppError> {
    println!("=== Verify circuit operation ===");
    let outcome = verifier.verify(&nominal_vector(specs))?;
    print!("{}", crate::report::format_verify_report(&outcome));
    Ok(())
}

fn handle_margin(
    config: &Config,
    verifier: &SimulatorVerifier,
    specs: &[ParameterSpec],
) -> Result<(), AppError> {
    println!("=== Margin analysis ===");
    let settings = config.margin_settings();
    let analysis = MarginAnalysis::new(verifier, settings, specs);
    let workers = pool::worker_count(2 * specs.len());
    let result = analysis.analyse(&nominal_vector(specs), workers)?;
    print!("{}", crate::report::format_margin_report(&result, &settings));
    Ok(())
}

fn handle_yield(
    config: &Config,
    verifier: &SimulatorVerifier,
    specs: &[ParameterSpec],
) -> Result<(), AppError> {
    println!("=== Yield analysis ===");
    let section = config.yield_section()?;
    let analysis = YieldAnalysis::new(verifier, section.seed, specs);
    let workers = pool::worker_count(section.num_samples);
    let result = analysis.sample(section.num_samples, workers)?;
    print!("{}", crate::report::format_yield_report(&result));
    Ok(())
}

fn handle_optimize(
    config: &Config,
    verifier: &SimulatorVerifier,
    specs: &[ParameterSpec],
    verbose: bool,
) -> Result<(), AppError> {
    println!("=== Optimize circuit ===");
    let margin_settings = config.margin_settings();
    let optimizer = Optimizer::new(
        verifier,
        margin_settings,
        config.optimize_settings(),
        specs,
        verbose,
    );
    let best = optimizer.optimize(&nominal_vector(specs))?;
    println!("Optimized point: {}", crate::report::format_point(&best));

    if let Some(output) = &config.optimize.output {
        verifier.write_file_with_updated_parameters(output, &best)?;
        println!("Wrote optimized circuit to '{}'", output.display());
    }

    println!("=== Optimized circuit margin analysis ===");
    let analysis = MarginAnalysis::new(verifier, margin_settings, specs);
    let workers = pool::worker_count(2 * specs.len());
    let result = analysis.analyse(&best, workers)?;
    print!("{}", crate::report::format_margin_report(&result, &margin_settings));
    Ok(())
}
