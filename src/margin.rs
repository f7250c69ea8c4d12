//! Margin analysis: how far each parameter can move before the design fails.
//!
//! For every parameter the analysis searches both directions (decrease and
//! increase) for the boundary between the passing region around the nominal
//! point and the failing region beyond it:
//!
//! - step sizes are relative to the nominal magnitude, starting at
//!   `max_search` and halving on every failing probe
//! - a passing probe advances the last known passing value and keeps the step
//! - the search stops at the first failing probe at or below `min_search`,
//!   reporting the last passing value with the final step as uncertainty
//!
//! The nominal point is verified once per analysis before any search is
//! dispatched. The 2×N direction searches are independent jobs on a bounded
//! worker pool, each owning a private perturbed copy of the nominal vector.

use crate::domain::{ParameterSpec, ParameterVector};
use crate::error::AppError;
use crate::pool;
use crate::verify::Verifier;

/// Relative step-size settings shared by every parameter.
#[derive(Debug, Clone, Copy)]
pub struct MarginSettings {
    /// Finest relative step; the search stops once a failing probe occurs at
    /// or below this resolution.
    pub min_search: f64,
    /// Coarsest relative step, and the default half-range for parameters
    /// without configured limits.
    pub max_search: f64,
}

impl Default for MarginSettings {
    fn default() -> Self {
        Self {
            min_search: 0.01,
            max_search: 0.5,
        }
    }
}

impl MarginSettings {
    /// Settings must satisfy `0 < min_search <= max_search`.
    pub fn validate(&self) -> Result<(), AppError> {
        if !(self.min_search.is_finite() && self.min_search > 0.0) {
            return Err(AppError::new(2, "margin.min_search must be a positive number"));
        }
        if !(self.max_search.is_finite() && self.max_search >= self.min_search) {
            return Err(AppError::new(
                2,
                "margin.max_search must be at least margin.min_search",
            ));
        }
        Ok(())
    }
}

/// One direction's boundary, when the search completed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarginBound {
    /// Last value known to pass.
    pub value: f64,
    /// Absolute width of the interval still unknown beyond `value`.
    pub uncertainty: f64,
}

/// Outcome of one direction's search.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundOutcome {
    Bound(MarginBound),
    /// The verifier faulted; the direction has no usable boundary. Sibling
    /// searches are unaffected.
    Unresolved(String),
}

/// Margins for one parameter.
#[derive(Debug, Clone)]
pub struct ParameterMargin {
    pub name: String,
    pub nominal: f64,
    pub lower: BoundOutcome,
    pub upper: BoundOutcome,
}

/// Result of a full margin analysis, parameters in configuration order.
#[derive(Debug, Clone)]
pub struct MarginResult {
    pub parameters: Vec<ParameterMargin>,
    /// Relative search resolution reached by downward searches.
    pub lower_uncertainty: f64,
    /// Relative search resolution reached by upward searches.
    pub upper_uncertainty: f64,
    /// Whether the nominal point itself verified. When false every direction
    /// reports its configured limit with the full half-range as uncertainty;
    /// that is a valid result, not an error.
    pub nominal_passed: bool,
}

impl MarginResult {
    /// Worst-case relative margin across all parameters and directions.
    ///
    /// Unresolved directions and a failing nominal score zero, so a caller
    /// maximizing this value can never prefer an unknown region over a known
    /// one.
    pub fn worst_case_margin(&self) -> f64 {
        if !self.nominal_passed {
            return 0.0;
        }
        let mut worst = f64::INFINITY;
        for parameter in &self.parameters {
            let scale = relative_scale(parameter.nominal);
            for outcome in [&parameter.lower, &parameter.upper] {
                let margin = match outcome {
                    BoundOutcome::Bound(bound) => (bound.value - parameter.nominal).abs() / scale,
                    BoundOutcome::Unresolved(_) => 0.0,
                };
                worst = worst.min(margin);
            }
        }
        if worst.is_finite() { worst } else { 0.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Lower,
    Upper,
}

/// Per-parameter bidirectional boundary search against a shared verifier.
pub struct MarginAnalysis<'a, V: Verifier> {
    verifier: &'a V,
    settings: MarginSettings,
    specs: Vec<ParameterSpec>,
}

impl<'a, V: Verifier> MarginAnalysis<'a, V> {
    pub fn new(verifier: &'a V, settings: MarginSettings, specs: &[ParameterSpec]) -> Self {
        Self {
            verifier,
            settings,
            specs: specs.to_vec(),
        }
    }

    /// Relative resolution every completed search converges to: the first
    /// halving of `max_search` at or below `min_search`. Decreasing
    /// `min_search` never increases it.
    pub fn search_resolution(&self) -> f64 {
        relative_resolution(&self.settings)
    }

    /// Analyse the margins of `nominal`, dispatching the direction searches
    /// onto at most `workers` threads.
    ///
    /// `nominal` must hold exactly the configured parameters; a mismatch is
    /// an internal error. With zero parameters the result is empty and the
    /// verifier is never called.
    pub fn analyse(&self, nominal: &ParameterVector, workers: usize) -> Result<MarginResult, AppError> {
        let resolution = self.search_resolution();

        if self.specs.is_empty() && nominal.is_empty() {
            return Ok(MarginResult {
                parameters: Vec::new(),
                lower_uncertainty: resolution,
                upper_uncertainty: resolution,
                nominal_passed: true,
            });
        }

        let base = self.base_values(nominal)?;

        // One verification of the shared nominal point decides the shape of
        // every search before anything is dispatched.
        let parameters = match self.verifier.verify(nominal) {
            Err(e) => {
                let reason = format!("nominal point could not be verified: {e}");
                self.specs
                    .iter()
                    .zip(&base)
                    .map(|(spec, &value)| ParameterMargin {
                        name: spec.name.clone(),
                        nominal: value,
                        lower: BoundOutcome::Unresolved(reason.clone()),
                        upper: BoundOutcome::Unresolved(reason.clone()),
                    })
                    .collect()
            }
            Ok(outcome) if !outcome.passed() => {
                return Ok(MarginResult {
                    parameters: self.full_range_parameters(&base),
                    lower_uncertainty: resolution,
                    upper_uncertainty: resolution,
                    nominal_passed: false,
                });
            }
            Ok(_) => self.search_all(nominal, &base, workers)?,
        };

        Ok(MarginResult {
            parameters,
            lower_uncertainty: resolution,
            upper_uncertainty: resolution,
            nominal_passed: true,
        })
    }

    /// Nominal values aligned with the configured specs.
    fn base_values(&self, nominal: &ParameterVector) -> Result<Vec<f64>, AppError> {
        if nominal.len() != self.specs.len() {
            return Err(AppError::new(
                4,
                "Margin analysis point does not match the configured parameters.",
            ));
        }
        let mut base = Vec::with_capacity(self.specs.len());
        for spec in &self.specs {
            let value = nominal.get(&spec.name).ok_or_else(|| {
                AppError::new(
                    4,
                    format!("Margin analysis point is missing parameter '{}'.", spec.name),
                )
            })?;
            base.push(value);
        }
        Ok(base)
    }

    /// Degenerate shape for a failing nominal: every direction reports its
    /// configured limit with the full half-range as uncertainty.
    fn full_range_parameters(&self, base: &[f64]) -> Vec<ParameterMargin> {
        self.specs
            .iter()
            .zip(base)
            .map(|(spec, &value)| {
                let lower_limit = self.limit(spec, value, Direction::Lower);
                let upper_limit = self.limit(spec, value, Direction::Upper);
                ParameterMargin {
                    name: spec.name.clone(),
                    nominal: value,
                    lower: BoundOutcome::Bound(MarginBound {
                        value: lower_limit,
                        uncertainty: (value - lower_limit).abs(),
                    }),
                    upper: BoundOutcome::Bound(MarginBound {
                        value: upper_limit,
                        uncertainty: (upper_limit - value).abs(),
                    }),
                }
            })
            .collect()
    }

    fn search_all(
        &self,
        nominal: &ParameterVector,
        base: &[f64],
        workers: usize,
    ) -> Result<Vec<ParameterMargin>, AppError> {
        let jobs: Vec<(usize, Direction)> = (0..self.specs.len())
            .flat_map(|idx| [(idx, Direction::Lower), (idx, Direction::Upper)])
            .collect();

        let outcomes = pool::evaluate_batch(workers, jobs, |(idx, direction)| {
            self.search_direction(nominal, &self.specs[idx], base[idx], direction)
        })?;

        let mut parameters = Vec::with_capacity(self.specs.len());
        let mut outcomes = outcomes.into_iter();
        for (spec, &value) in self.specs.iter().zip(base) {
            let lower = outcomes
                .next()
                .ok_or_else(|| AppError::new(4, "Margin search produced too few results."))?;
            let upper = outcomes
                .next()
                .ok_or_else(|| AppError::new(4, "Margin search produced too few results."))?;
            parameters.push(ParameterMargin {
                name: spec.name.clone(),
                nominal: value,
                lower,
                upper,
            });
        }
        Ok(parameters)
    }

    fn limit(&self, spec: &ParameterSpec, nominal: f64, direction: Direction) -> f64 {
        let scale = relative_scale(nominal);
        match direction {
            Direction::Lower => spec.min.unwrap_or(nominal - self.settings.max_search * scale),
            Direction::Upper => spec.max.unwrap_or(nominal + self.settings.max_search * scale),
        }
    }

    fn search_direction(
        &self,
        base: &ParameterVector,
        spec: &ParameterSpec,
        nominal: f64,
        direction: Direction,
    ) -> BoundOutcome {
        let scale = relative_scale(nominal);
        let limit = self.limit(spec, nominal, direction);
        if limit == nominal {
            return BoundOutcome::Bound(MarginBound {
                value: nominal,
                uncertainty: 0.0,
            });
        }

        let sign = match direction {
            Direction::Lower => -1.0,
            Direction::Upper => 1.0,
        };
        let floor = self.settings.min_search * scale;
        let mut step = self.settings.max_search * scale;
        let mut passing = nominal;

        loop {
            let candidate = clamp_towards(passing + sign * step, limit, direction);
            // A step below float resolution at this magnitude cannot move the
            // probe any further.
            if candidate == passing {
                return BoundOutcome::Bound(MarginBound {
                    value: passing,
                    uncertainty: step,
                });
            }

            match self.verifier.verify(&base.with_value(&spec.name, candidate)) {
                Err(e) => return BoundOutcome::Unresolved(e.to_string()),
                Ok(outcome) if outcome.passed() => {
                    passing = candidate;
                    if candidate == limit {
                        // The entire configured range passes; the limit itself
                        // is the bound, the half-range the uncertainty.
                        return BoundOutcome::Bound(MarginBound {
                            value: limit,
                            uncertainty: (limit - nominal).abs(),
                        });
                    }
                }
                Ok(_) => {
                    if step <= floor {
                        return BoundOutcome::Bound(MarginBound {
                            value: passing,
                            uncertainty: step,
                        });
                    }
                    step /= 2.0;
                }
            }
        }
    }
}

fn clamp_towards(candidate: f64, limit: f64, direction: Direction) -> f64 {
    match direction {
        Direction::Lower => candidate.max(limit),
        Direction::Upper => candidate.min(limit),
    }
}

fn relative_resolution(settings: &MarginSettings) -> f64 {
    let mut step = settings.max_search;
    while step > settings.min_search {
        step /= 2.0;
    }
    step
}

/// Step sizes are relative to the nominal magnitude; a zero nominal falls
/// back to unit scale.
pub(crate) fn relative_scale(nominal: f64) -> f64 {
    if nominal == 0.0 { 1.0 } else { nominal.abs() }
}
