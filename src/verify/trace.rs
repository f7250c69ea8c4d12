//! Simulator trace parsing and comparison.
//!
//! A trace is a CSV with a leading `time` column and one column per recorded
//! signal. The reference trace (the spec file) defines which signals are
//! checked and at which times; the simulated trace is linearly interpolated
//! onto those times and compared with an absolute threshold.

use std::fs::File;
use std::path::Path;

use crate::domain::VerificationOutcome;
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub time: Vec<f64>,
    pub signals: Vec<Signal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub name: String,
    pub samples: Vec<f64>,
}

impl Trace {
    fn signal(&self, name: &str) -> Option<&Signal> {
        self.signals
            .iter()
            .find(|signal| signal.name.eq_ignore_ascii_case(name))
    }

    /// Linear interpolation of a signal at `t`; `None` outside the recorded
    /// time span.
    fn value_at(&self, signal: &Signal, t: f64) -> Option<f64> {
        let first = *self.time.first()?;
        let last = *self.time.last()?;
        if t < first || t > last {
            return None;
        }
        let idx = self.time.partition_point(|&x| x < t);
        if idx < self.time.len() && self.time[idx] == t {
            return Some(signal.samples[idx]);
        }
        // idx >= 1 here since t > first, and times are strictly increasing.
        let (t0, t1) = (self.time[idx - 1], self.time[idx]);
        let (y0, y1) = (signal.samples[idx - 1], signal.samples[idx]);
        let u = (t - t0) / (t1 - t0);
        Some(y0 + u * (y1 - y0))
    }
}

/// Read the reference trace file; malformed content is a configuration error.
pub fn read_reference(path: &Path) -> Result<Trace, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open trace '{}': {e}", path.display())))?;
    parse(file).map_err(|msg| AppError::new(2, format!("Invalid trace '{}': {msg}", path.display())))
}

/// Parse simulator output; malformed content is a simulation error.
pub fn parse_simulated(text: &str) -> Result<Trace, AppError> {
    parse(text.as_bytes()).map_err(|msg| AppError::new(3, format!("Invalid simulator output: {msg}")))
}

fn parse<R: std::io::Read>(reader: R) -> Result<Trace, String> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| format!("failed to read headers: {e}"))?
        .clone();

    if headers.is_empty() || !headers[0].eq_ignore_ascii_case("time") {
        return Err("first column must be 'time'".to_string());
    }
    if headers.len() < 2 {
        return Err("no signal columns".to_string());
    }

    let mut time: Vec<f64> = Vec::new();
    let mut signals: Vec<Signal> = headers
        .iter()
        .skip(1)
        .map(|name| Signal {
            name: name.to_string(),
            samples: Vec::new(),
        })
        .collect();

    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| format!("row {}: {e}", row + 2))?;
        if record.len() != headers.len() {
            return Err(format!(
                "row {}: expected {} fields, found {}",
                row + 2,
                headers.len(),
                record.len()
            ));
        }

        let t = parse_field(&record, 0, row)?;
        if let Some(&prev) = time.last() {
            if t <= prev {
                return Err(format!("row {}: time must be strictly increasing", row + 2));
            }
        }
        time.push(t);

        for (i, signal) in signals.iter_mut().enumerate() {
            signal.samples.push(parse_field(&record, i + 1, row)?);
        }
    }

    if time.is_empty() {
        return Err("no data rows".to_string());
    }

    Ok(Trace { time, signals })
}

fn parse_field(record: &csv::StringRecord, idx: usize, row: usize) -> Result<f64, String> {
    let raw = record
        .get(idx)
        .ok_or_else(|| format!("row {}: missing field {}", row + 2, idx + 1))?;
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("row {}: '{raw}' is not a number", row + 2))?;
    if !value.is_finite() {
        return Err(format!("row {}: non-finite value '{raw}'", row + 2));
    }
    Ok(value)
}

/// Compare a simulated trace against the reference at the reference's sample
/// times.
///
/// The first deviation beyond `threshold` (earliest time, ties broken by
/// reference column order) fails the outcome, carrying that time and the
/// simulated value. Reference signals the simulator never recorded, and
/// reference times outside the simulated span, are simulation errors rather
/// than failures.
pub fn compare_traces(
    simulated: &Trace,
    reference: &Trace,
    threshold: f64,
) -> Result<VerificationOutcome, AppError> {
    let mut pairs = Vec::with_capacity(reference.signals.len());
    for expected in &reference.signals {
        let recorded = simulated.signal(&expected.name).ok_or_else(|| {
            AppError::new(3, format!("Simulator output has no '{}' column", expected.name))
        })?;
        pairs.push((expected, recorded));
    }

    for (i, &t) in reference.time.iter().enumerate() {
        for (expected, recorded) in &pairs {
            let actual = simulated
                .value_at(recorded, t)
                .ok_or_else(|| AppError::new(3, format!("Simulated trace does not cover t={t:e}")))?;
            if (actual - expected.samples[i]).abs() > threshold {
                return Ok(VerificationOutcome::failure(Some(t), Some(actual)));
            }
        }
    }

    Ok(VerificationOutcome::success())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace(time: &[f64], signals: &[(&str, &[f64])]) -> Trace {
        Trace {
            time: time.to_vec(),
            signals: signals
                .iter()
                .map(|(name, samples)| Signal {
                    name: name.to_string(),
                    samples: samples.to_vec(),
                })
                .collect(),
        }
    }

    #[test]
    fn parses_header_and_rows() {
        let text = "time,V(1),V(2)\n0.0,0.0,1.0\n1e-9,0.5,1.5\n2e-9,1.0,2.0\n";
        let parsed = parse_simulated(text).unwrap();
        assert_eq!(parsed.time, vec![0.0, 1e-9, 2e-9]);
        assert_eq!(parsed.signals.len(), 2);
        assert_eq!(parsed.signals[0].name, "V(1)");
        assert_eq!(parsed.signals[1].samples, vec![1.0, 1.5, 2.0]);
    }

    #[test]
    fn rejects_non_increasing_time() {
        let text = "time,V(1)\n0.0,0.0\n0.0,0.5\n";
        let err = parse_simulated(text).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("strictly increasing"));
    }

    #[test]
    fn rejects_non_numeric_fields() {
        let text = "time,V(1)\n0.0,huh\n";
        let err = parse_simulated(text).unwrap_err();
        assert!(err.to_string().contains("huh"));
    }

    #[test]
    fn within_threshold_passes() {
        let reference = trace(&[0.0, 1.0, 2.0], &[("V(1)", &[0.0, 1.0, 2.0])]);
        let simulated = trace(&[0.0, 1.0, 2.0], &[("V(1)", &[0.01, 1.02, 1.99])]);
        let outcome = compare_traces(&simulated, &reference, 0.05).unwrap();
        assert!(outcome.passed());
    }

    #[test]
    fn first_deviation_sets_failure_time_and_point() {
        let reference = trace(&[0.0, 1.0, 2.0], &[("V(1)", &[0.0, 1.0, 2.0])]);
        let simulated = trace(&[0.0, 1.0, 2.0], &[("V(1)", &[0.0, 1.5, 9.0])]);
        let outcome = compare_traces(&simulated, &reference, 0.1).unwrap();
        assert!(!outcome.passed());
        assert_eq!(outcome.failure_time(), Some(1.0));
        assert_eq!(outcome.failure_point(), Some(1.5));
    }

    #[test]
    fn interpolates_between_simulated_samples() {
        // Simulated at half the reference rate; midpoints land on the line.
        let reference = trace(&[0.0, 1.0, 2.0, 3.0, 4.0], &[("out", &[0.0, 1.0, 2.0, 3.0, 4.0])]);
        let simulated = trace(&[0.0, 2.0, 4.0], &[("OUT", &[0.0, 2.0, 4.0])]);
        let outcome = compare_traces(&simulated, &reference, 1e-9).unwrap();
        assert!(outcome.passed());
    }

    #[test]
    fn missing_signal_is_a_simulation_error() {
        let reference = trace(&[0.0, 1.0], &[("V(2)", &[0.0, 1.0])]);
        let simulated = trace(&[0.0, 1.0], &[("V(1)", &[0.0, 1.0])]);
        let err = compare_traces(&simulated, &reference, 0.05).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("V(2)"));
    }

    #[test]
    fn short_simulated_span_is_a_simulation_error() {
        let reference = trace(&[0.0, 1.0, 2.0], &[("V(1)", &[0.0, 1.0, 2.0])]);
        let simulated = trace(&[0.0, 1.0], &[("V(1)", &[0.0, 1.0])]);
        let err = compare_traces(&simulated, &reference, 0.05).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
