//! TOML configuration.
//!
//! One document selects the mode and carries a section per analysis plus a
//! `[parameters.NAME]` table per swept parameter. Unknown keys are rejected
//! so typos fail loudly instead of silently running with defaults. Parameter
//! order follows the document and is preserved through every report.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;

use crate::domain::{Distribution, ParameterSpec};
use crate::error::AppError;
use crate::margin::MarginSettings;
use crate::optimize::OptimizeSettings;
use crate::verify::VerifySettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Verify,
    Margin,
    Yield,
    Optimize,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub mode: Mode,
    pub verify: VerifySection,
    #[serde(default)]
    pub margin: MarginSection,
    #[serde(rename = "yield")]
    pub yield_: Option<YieldSection>,
    #[serde(default)]
    pub optimize: OptimizeSection,
    #[serde(default)]
    pub parameters: IndexMap<String, ParameterSection>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifySection {
    pub circuit: PathBuf,
    pub spec_file: PathBuf,
    #[serde(default = "default_simulator")]
    pub simulator: String,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarginSection {
    #[serde(default = "default_min_search")]
    pub min_search: f64,
    #[serde(default = "default_max_search")]
    pub max_search: f64,
}

impl Default for MarginSection {
    fn default() -> Self {
        Self {
            min_search: default_min_search(),
            max_search: default_max_search(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct YieldSection {
    pub num_samples: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptimizeSection {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    pub output: Option<PathBuf>,
}

impl Default for OptimizeSection {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            output: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterSection {
    pub nominal: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub distribution: Option<DistributionKind>,
    pub sd: Option<f64>,
    pub half_width: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionKind {
    Normal,
    Uniform,
}

fn default_simulator() -> String {
    "josim-cli".to_string()
}

fn default_threshold() -> f64 {
    0.05
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_min_search() -> f64 {
    0.01
}

fn default_max_search() -> f64 {
    0.5
}

fn default_seed() -> u64 {
    42
}

fn default_max_iterations() -> usize {
    25
}

fn default_tolerance() -> f64 {
    1e-3
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let text = fs::read_to_string(path).map_err(|e| {
            AppError::new(2, format!("Failed to read configuration '{}': {e}", path.display()))
        })?;
        Self::parse(&text).map_err(|e| {
            AppError::new(e.exit_code(), format!("{}: {e}", path.display()))
        })
    }

    pub(crate) fn parse(text: &str) -> Result<Self, AppError> {
        let config: Config = toml::from_str(text)
            .map_err(|e| AppError::new(2, format!("Invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if !(self.verify.threshold.is_finite() && self.verify.threshold >= 0.0) {
            return Err(AppError::new(2, "verify.threshold must be a non-negative number"));
        }
        if self.verify.timeout_secs == 0 {
            return Err(AppError::new(2, "verify.timeout_secs must be at least 1"));
        }
        self.margin_settings().validate()?;
        self.optimize_settings().validate()?;
        if self.mode == Mode::Yield {
            self.yield_section()?;
        }
        self.parameter_specs()?;
        Ok(())
    }

    pub fn verify_settings(&self) -> VerifySettings {
        VerifySettings {
            circuit: self.verify.circuit.clone(),
            spec_file: self.verify.spec_file.clone(),
            simulator: self.verify.simulator.clone(),
            threshold: self.verify.threshold,
            timeout_secs: self.verify.timeout_secs,
        }
    }

    pub fn margin_settings(&self) -> MarginSettings {
        MarginSettings {
            min_search: self.margin.min_search,
            max_search: self.margin.max_search,
        }
    }

    pub fn optimize_settings(&self) -> OptimizeSettings {
        OptimizeSettings {
            max_iterations: self.optimize.max_iterations,
            tolerance: self.optimize.tolerance,
        }
    }

    pub fn yield_section(&self) -> Result<&YieldSection, AppError> {
        self.yield_
            .as_ref()
            .ok_or_else(|| AppError::new(2, "mode \"yield\" requires a [yield] section"))
    }

    /// Swept parameters in document order, with distributions resolved.
    pub fn parameter_specs(&self) -> Result<Vec<ParameterSpec>, AppError> {
        let mut specs = Vec::with_capacity(self.parameters.len());
        for (name, section) in &self.parameters {
            specs.push(parameter_spec(name, section)?);
        }
        Ok(specs)
    }
}

fn parameter_spec(name: &str, section: &ParameterSection) -> Result<ParameterSpec, AppError> {
    if !section.nominal.is_finite() {
        return Err(AppError::new(
            2,
            format!("parameters.{name}.nominal must be a finite number"),
        ));
    }
    if let Some(min) = section.min {
        if !min.is_finite() || min > section.nominal {
            return Err(AppError::new(
                2,
                format!("parameters.{name}.min must not exceed the nominal value"),
            ));
        }
    }
    if let Some(max) = section.max {
        if !max.is_finite() || max < section.nominal {
            return Err(AppError::new(
                2,
                format!("parameters.{name}.max must not fall below the nominal value"),
            ));
        }
    }

    let distribution = match section.distribution {
        None => {
            if section.sd.is_some() || section.half_width.is_some() {
                return Err(AppError::new(
                    2,
                    format!("parameters.{name} sets sd or half_width without a distribution"),
                ));
            }
            None
        }
        Some(DistributionKind::Normal) => {
            if section.half_width.is_some() {
                return Err(AppError::new(
                    2,
                    format!("parameters.{name}.half_width is only valid for the uniform distribution"),
                ));
            }
            let sd = section.sd.ok_or_else(|| {
                AppError::new(
                    2,
                    format!("parameters.{name} with a normal distribution requires sd"),
                )
            })?;
            if !(sd.is_finite() && sd > 0.0) {
                return Err(AppError::new(
                    2,
                    format!("parameters.{name}.sd must be a positive number"),
                ));
            }
            Some(Distribution::Normal { sd })
        }
        Some(DistributionKind::Uniform) => {
            if section.sd.is_some() {
                return Err(AppError::new(
                    2,
                    format!("parameters.{name}.sd is only valid for the normal distribution"),
                ));
            }
            let half_width = section.half_width.ok_or_else(|| {
                AppError::new(
                    2,
                    format!("parameters.{name} with a uniform distribution requires half_width"),
                )
            })?;
            if !(half_width.is_finite() && half_width > 0.0) {
                return Err(AppError::new(
                    2,
                    format!("parameters.{name}.half_width must be a positive number"),
                ));
            }
            Some(Distribution::Uniform { half_width })
        }
    };

    let mut spec = ParameterSpec::new(name, section.nominal);
    spec.min = section.min;
    spec.max = section.max;
    spec.distribution = distribution;
    Ok(spec)
}
