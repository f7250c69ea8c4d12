//! Margin-centering optimization.
//!
//! Each iteration runs a full margin analysis at the current point, scores it
//! by its worst-case relative margin, and moves every parameter with two
//! resolved bounds to the midpoint of its passing interval. The best point
//! seen so far is kept separately, so the result never scores worse than the
//! starting point.
//!
//! The loop stops when the iteration budget runs out, when an iteration fails
//! to improve the score by more than the tolerance, or when the proposed move
//! is smaller than the margin search can resolve.

use crate::domain::{ParameterSpec, ParameterVector};
use crate::error::AppError;
use crate::margin::{BoundOutcome, MarginAnalysis, MarginResult, MarginSettings, relative_scale};
use crate::pool;
use crate::report;
use crate::verify::Verifier;

#[derive(Debug, Clone, Copy)]
pub struct OptimizeSettings {
    /// Margin analyses to spend at most.
    pub max_iterations: usize,
    /// Minimum score improvement required to keep iterating.
    pub tolerance: f64,
}

impl Default for OptimizeSettings {
    fn default() -> Self {
        Self {
            max_iterations: 25,
            tolerance: 1e-3,
        }
    }
}

impl OptimizeSettings {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_iterations == 0 {
            return Err(AppError::new(2, "optimize.max_iterations must be at least 1"));
        }
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(AppError::new(2, "optimize.tolerance must be a non-negative number"));
        }
        Ok(())
    }
}

pub struct Optimizer<'a, V: Verifier> {
    analysis: MarginAnalysis<'a, V>,
    settings: OptimizeSettings,
    num_parameters: usize,
    verbose: bool,
}

impl<'a, V: Verifier> Optimizer<'a, V> {
    pub fn new(
        verifier: &'a V,
        margin: MarginSettings,
        settings: OptimizeSettings,
        specs: &[ParameterSpec],
        verbose: bool,
    ) -> Self {
        Self {
            analysis: MarginAnalysis::new(verifier, margin, specs),
            settings,
            num_parameters: specs.len(),
            verbose,
        }
    }

    /// Iterate from `initial` and return the best point found.
    pub fn optimize(&self, initial: &ParameterVector) -> Result<ParameterVector, AppError> {
        let workers = pool::worker_count(2 * self.num_parameters);
        let resolution = self.analysis.search_resolution();

        let mut current = initial.clone();
        let mut best = initial.clone();
        let mut best_score = f64::NEG_INFINITY;
        let mut previous_score: Option<f64> = None;

        for iteration in 1..=self.settings.max_iterations {
            let margin = self.analysis.analyse(&current, workers)?;
            let score = margin.worst_case_margin();

            if self.verbose {
                println!("Iteration {iteration}: worst-case margin {score:.4}");
            }

            if score > best_score {
                best_score = score;
                best = current.clone();
            }

            if let Some(previous) = previous_score {
                if score - previous <= self.settings.tolerance {
                    break;
                }
            }
            previous_score = Some(score);

            let next = centered_point(&current, &margin);
            if max_relative_move(&current, &next) <= resolution {
                break;
            }
            if self.verbose {
                println!("  moved to {}", report::format_point(&next));
            }
            current = next;
        }

        Ok(best)
    }
}

/// Midpoints of the passing intervals; parameters with an unresolved
/// direction keep their current value.
fn centered_point(current: &ParameterVector, margin: &MarginResult) -> ParameterVector {
    let mut next = current.clone();
    for parameter in &margin.parameters {
        if let (BoundOutcome::Bound(lower), BoundOutcome::Bound(upper)) =
            (&parameter.lower, &parameter.upper)
        {
            next.insert(parameter.name.as_str(), (lower.value + upper.value) / 2.0);
        }
    }
    next
}

fn max_relative_move(current: &ParameterVector, next: &ParameterVector) -> f64 {
    current
        .iter()
        .map(|(name, value)| {
            let moved = next.get(name).unwrap_or(value);
            (moved - value).abs() / relative_scale(value)
        })
        .fold(0.0, f64::max)
}
