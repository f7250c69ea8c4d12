//! Shared domain types.
//!
//! These types are intentionally small and cheap to clone so they can be:
//!
//! - copied into per-task perturbed vectors during concurrent analysis
//! - carried through results without borrowing from the analysis
//! - constructed directly in tests

use indexmap::IndexMap;

/// An ordered mapping from parameter name to value.
///
/// Iteration order is insertion order. Every component that derives a vector
/// from another one (perturbation, sampling, optimization) preserves that
/// order, so values can be matched back to names positionally at any point
/// downstream without an index round-trip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterVector {
    values: IndexMap<String, f64>,
}

impl ParameterVector {
    pub fn new() -> Self {
        Self {
            values: IndexMap::new(),
        }
    }

    /// Insert or replace a component. Replacing keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Copy of this vector with a single component replaced.
    pub fn with_value(&self, name: &str, value: f64) -> Self {
        let mut out = self.clone();
        out.values.insert(name.to_string(), value);
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.values.iter().map(|(name, value)| (name.as_str(), *value))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.values.keys().map(|name| name.as_str())
    }
}

impl FromIterator<(String, f64)> for ParameterVector {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Per-parameter settings shared by the analyses.
///
/// `min`/`max` are absolute search limits used by margin search; when absent
/// the search derives limits from the nominal and the coarsest relative step.
/// `distribution` is the random draw used by yield analysis; a parameter
/// without one is held at its nominal value during sampling.
#[derive(Debug, Clone)]
pub struct ParameterSpec {
    pub name: String,
    pub nominal: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub distribution: Option<Distribution>,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, nominal: f64) -> Self {
        Self {
            name: name.into(),
            nominal,
            min: None,
            max: None,
            distribution: None,
        }
    }
}

/// Random draw family for yield sampling, centered on the nominal value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Distribution {
    /// Gaussian draw with the given standard deviation.
    Normal { sd: f64 },
    /// Uniform draw over `nominal ± half_width`.
    Uniform { half_width: f64 },
}

/// The nominal point described by a list of parameter specs.
pub fn nominal_vector(specs: &[ParameterSpec]) -> ParameterVector {
    specs
        .iter()
        .map(|spec| (spec.name.clone(), spec.nominal))
        .collect()
}

/// Result of verifying one parameter vector.
///
/// A passing outcome never carries failure metadata; the constructors enforce
/// this, so downstream code can rely on `failure_time`/`failure_point` being
/// `None` whenever `passed` is true.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationOutcome {
    passed: bool,
    failure_time: Option<f64>,
    failure_point: Option<f64>,
}

impl VerificationOutcome {
    pub fn success() -> Self {
        Self {
            passed: true,
            failure_time: None,
            failure_point: None,
        }
    }

    /// Failing outcome; time and value of the first deviation when known.
    pub fn failure(failure_time: Option<f64>, failure_point: Option<f64>) -> Self {
        Self {
            passed: false,
            failure_time,
            failure_point,
        }
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn failure_time(&self) -> Option<f64> {
        self.failure_time
    }

    pub fn failure_point(&self) -> Option<f64> {
        self.failure_point
    }
}
