//! Yield analysis: Monte Carlo estimate of the fraction of manufactured
//! instances that pass verification.
//!
//! Sample points are drawn around the nominal values from each parameter's
//! configured distribution. All vectors are generated up front from a single
//! seeded generator, so a given seed reproduces the same estimate regardless
//! of how many workers evaluate it.

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::Distribution as _;
use rand_distr::Normal;

use crate::domain::{Distribution, ParameterSpec, ParameterVector};
use crate::error::AppError;
use crate::pool;
use crate::verify::Verifier;

/// Distinct fault reasons kept for the report before the rest are dropped.
const MAX_REPORTED_REASONS: usize = 5;

/// Counts from one sampling run. `num_total` is the requested sample count;
/// samples the verifier faulted on are tallied separately and never count as
/// successes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YieldResult {
    pub num_success: usize,
    pub num_total: usize,
    pub num_unresolved: usize,
    /// First few distinct fault reasons, in sample order.
    pub unresolved_reasons: Vec<String>,
}

impl YieldResult {
    /// Success percentage in `[0, 100]`; zero when nothing was sampled.
    pub fn percentage(&self) -> f64 {
        if self.num_total == 0 {
            0.0
        } else {
            100.0 * self.num_success as f64 / self.num_total as f64
        }
    }
}

enum Sampler {
    /// No distribution configured; the parameter stays at its nominal value.
    Fixed(f64),
    Normal(Normal<f64>),
    Uniform { low: f64, high: f64 },
}

impl Sampler {
    fn for_spec(spec: &ParameterSpec) -> Result<Self, AppError> {
        match spec.distribution {
            None => Ok(Sampler::Fixed(spec.nominal)),
            Some(Distribution::Normal { sd }) => {
                Normal::new(spec.nominal, sd).map(Sampler::Normal).map_err(|_| {
                    AppError::new(
                        4,
                        format!("Invalid normal distribution for parameter '{}'.", spec.name),
                    )
                })
            }
            Some(Distribution::Uniform { half_width }) => {
                if !half_width.is_finite() || half_width < 0.0 {
                    return Err(AppError::new(
                        4,
                        format!("Invalid uniform distribution for parameter '{}'.", spec.name),
                    ));
                }
                Ok(Sampler::Uniform {
                    low: spec.nominal - half_width,
                    high: spec.nominal + half_width,
                })
            }
        }
    }

    fn draw(&self, rng: &mut StdRng) -> f64 {
        match self {
            Sampler::Fixed(value) => *value,
            Sampler::Normal(normal) => normal.sample(rng),
            Sampler::Uniform { low, high } => rng.gen_range(*low..=*high),
        }
    }
}

/// Seeded Monte Carlo sampling against a shared verifier.
pub struct YieldAnalysis<'a, V: Verifier> {
    verifier: &'a V,
    seed: u64,
    specs: Vec<ParameterSpec>,
}

impl<'a, V: Verifier> YieldAnalysis<'a, V> {
    pub fn new(verifier: &'a V, seed: u64, specs: &[ParameterSpec]) -> Self {
        Self {
            verifier,
            seed,
            specs: specs.to_vec(),
        }
    }

    /// Draw `num_samples` vectors and evaluate them on at most `workers`
    /// threads.
    pub fn sample(&self, num_samples: usize, workers: usize) -> Result<YieldResult, AppError> {
        let mut samplers = Vec::with_capacity(self.specs.len());
        for spec in &self.specs {
            samplers.push((spec.name.clone(), Sampler::for_spec(spec)?));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let points: Vec<ParameterVector> = (0..num_samples)
            .map(|_| {
                samplers
                    .iter()
                    .map(|(name, sampler)| (name.clone(), sampler.draw(&mut rng)))
                    .collect()
            })
            .collect();

        let outcomes = pool::evaluate_batch(workers, points, |point| {
            match self.verifier.verify(&point) {
                Ok(outcome) if outcome.passed() => SampleOutcome::Pass,
                Ok(_) => SampleOutcome::Fail,
                Err(e) => SampleOutcome::Unresolved(e.to_string()),
            }
        })?;

        let mut result = YieldResult {
            num_success: 0,
            num_total: num_samples,
            num_unresolved: 0,
            unresolved_reasons: Vec::new(),
        };
        for outcome in outcomes {
            match outcome {
                SampleOutcome::Pass => result.num_success += 1,
                SampleOutcome::Fail => {}
                SampleOutcome::Unresolved(reason) => {
                    result.num_unresolved += 1;
                    if result.unresolved_reasons.len() < MAX_REPORTED_REASONS
                        && !result.unresolved_reasons.contains(&reason)
                    {
                        result.unresolved_reasons.push(reason);
                    }
                }
            }
        }
        Ok(result)
    }
}

enum SampleOutcome {
    Pass,
    Fail,
    Unresolved(String),
}
