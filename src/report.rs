//! Plain-text reports for the analysis results.
//!
//! Formatting is separated from printing so the report bodies can be golden
//! tested. Margin reports render one line per parameter with an ASCII bar of
//! the passing interval, scaled so a full half-bar is `max_search` away from
//! the nominal.

use crate::domain::{ParameterVector, VerificationOutcome};
use crate::margin::{BoundOutcome, MarginResult, MarginSettings};
use crate::yields::YieldResult;

/// Cells on each side of the nominal marker.
const HALF_BAR: usize = 20;

pub fn format_verify_report(outcome: &VerificationOutcome) -> String {
    let mut out = String::new();
    if outcome.passed() {
        out.push_str("SUCCESS\n");
    } else {
        out.push_str("FAILURE\n");
        if let Some(time) = outcome.failure_time() {
            out.push_str(&format!("Time:  {time:e}\n"));
        }
        if let Some(point) = outcome.failure_point() {
            out.push_str(&format!("Point: {point:e}\n"));
        }
    }
    out
}

pub fn format_margin_report(result: &MarginResult, settings: &MarginSettings) -> String {
    let mut out = String::new();
    if !result.nominal_passed {
        out.push_str("Nominal point FAILED verification; margins span the full search range.\n");
    }

    for parameter in &result.parameters {
        let scale = crate::margin::relative_scale(parameter.nominal);
        let (lower_col, left) = match &parameter.lower {
            BoundOutcome::Bound(bound) => {
                let cells = bar_cells((parameter.nominal - bound.value).abs() / scale, settings);
                (format!("{:.4e}", bound.value), left_half(cells))
            }
            BoundOutcome::Unresolved(_) => ("?".to_string(), "?".repeat(HALF_BAR)),
        };
        let (upper_col, right) = match &parameter.upper {
            BoundOutcome::Bound(bound) => {
                let cells = bar_cells((bound.value - parameter.nominal).abs() / scale, settings);
                (format!("{:.4e}", bound.value), right_half(cells))
            }
            BoundOutcome::Unresolved(_) => ("?".to_string(), "?".repeat(HALF_BAR)),
        };

        out.push_str(&format!(
            "{:<12} {:>12} [{}|{}] {:<12} (nominal {:.4e})\n",
            parameter.name, lower_col, left, right, upper_col, parameter.nominal
        ));
        if let BoundOutcome::Unresolved(reason) = &parameter.lower {
            out.push_str(&format!("    lower unresolved: {reason}\n"));
        }
        if let BoundOutcome::Unresolved(reason) = &parameter.upper {
            out.push_str(&format!("    upper unresolved: {reason}\n"));
        }
    }

    if result.nominal_passed && !result.parameters.is_empty() {
        out.push_str(&format!(
            "Worst-case margin: {:.4} (relative)\n",
            result.worst_case_margin()
        ));
    }
    out.push_str(&format!(
        "Margin uncertainty: -{:.4e} / +{:.4e} (relative)\n",
        result.lower_uncertainty, result.upper_uncertainty
    ));
    out
}

pub fn format_yield_report(result: &YieldResult) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Yield: {} / {} = {:.1} %\n",
        result.num_success,
        result.num_total,
        result.percentage()
    ));
    if result.num_unresolved > 0 {
        out.push_str(&format!("Unresolved samples: {}\n", result.num_unresolved));
        for reason in &result.unresolved_reasons {
            out.push_str(&format!("    {reason}\n"));
        }
    }
    out
}

/// Comma-separated `name=value` pairs in parameter order, values in the same
/// exponent notation the netlist substitution writes.
pub fn format_point(point: &ParameterVector) -> String {
    let mut out = String::new();
    for (index, (name, value)) in point.iter().enumerate() {
        if index > 0 {
            out.push_str(", ");
        }
        out.push_str(&format!("{name}={value:e}"));
    }
    out
}

fn bar_cells(margin_rel: f64, settings: &MarginSettings) -> usize {
    if settings.max_search <= 0.0 {
        return 0;
    }
    let frac = (margin_rel / settings.max_search).clamp(0.0, 1.0);
    (frac * HALF_BAR as f64).round() as usize
}

fn left_half(cells: usize) -> String {
    let cells = cells.min(HALF_BAR);
    format!("{}{}", ".".repeat(HALF_BAR - cells), "=".repeat(cells))
}

fn right_half(cells: usize) -> String {
    let cells = cells.min(HALF_BAR);
    format!("{}{}", "=".repeat(cells), ".".repeat(HALF_BAR - cells))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::margin::{MarginBound, ParameterMargin};

    fn margin_settings() -> MarginSettings {
        MarginSettings {
            min_search: 0.001,
            max_search: 0.5,
        }
    }

    fn bound(value: f64, uncertainty: f64) -> BoundOutcome {
        BoundOutcome::Bound(MarginBound { value, uncertainty })
    }

    #[test]
    fn verify_report_success_is_a_single_line() {
        assert_eq!(format_verify_report(&VerificationOutcome::success()), "SUCCESS\n");
    }

    #[test]
    fn verify_report_failure_lists_time_and_point() {
        let report =
            format_verify_report(&VerificationOutcome::failure(Some(1.5e-9), Some(3.2)));
        assert_eq!(report, "FAILURE\nTime:  1.5e-9\nPoint: 3.2e0\n");
    }

    #[test]
    fn margin_report_lines_up_bounds_and_bar() {
        let result = MarginResult {
            parameters: vec![ParameterMargin {
                name: "R1".to_string(),
                nominal: 1.0,
                lower: bound(0.7, 0.001),
                upper: bound(1.25, 0.001),
            }],
            lower_uncertainty: 0.0009765625,
            upper_uncertainty: 0.0009765625,
            nominal_passed: true,
        };
        let report = format_margin_report(&result, &margin_settings());

        let first = report.lines().next().unwrap();
        assert!(first.starts_with("R1"));
        assert!(first.contains("7.0000e-1"));
        assert!(first.contains("1.2500e0"));
        // 0.3 of a 0.5 half-range fills 12 of 20 cells on the left, 0.25
        // fills 10 on the right.
        assert!(first.contains(&format!("[{}{}|{}{}]", ".".repeat(8), "=".repeat(12), "=".repeat(10), ".".repeat(10))));
        assert!(report.contains("Worst-case margin: 0.2500"));
        assert!(report.contains("Margin uncertainty: -9.7656e-4 / +9.7656e-4"));
    }

    #[test]
    fn margin_report_marks_unresolved_directions() {
        let result = MarginResult {
            parameters: vec![ParameterMargin {
                name: "B2".to_string(),
                nominal: 2.0,
                lower: BoundOutcome::Unresolved("simulator crashed".to_string()),
                upper: bound(2.5, 0.01),
            }],
            lower_uncertainty: 0.0078125,
            upper_uncertainty: 0.0078125,
            nominal_passed: true,
        };
        let report = format_margin_report(&result, &margin_settings());
        assert!(report.contains(&"?".repeat(HALF_BAR)));
        assert!(report.contains("lower unresolved: simulator crashed"));
    }

    #[test]
    fn margin_report_announces_a_failing_nominal() {
        let result = MarginResult {
            parameters: vec![ParameterMargin {
                name: "R1".to_string(),
                nominal: 1.0,
                lower: bound(0.5, 0.5),
                upper: bound(1.5, 0.5),
            }],
            lower_uncertainty: 0.0009765625,
            upper_uncertainty: 0.0009765625,
            nominal_passed: false,
        };
        let report = format_margin_report(&result, &margin_settings());
        assert!(report.starts_with("Nominal point FAILED"));
        assert!(!report.contains("Worst-case margin"));
    }

    #[test]
    fn yield_report_matches_the_counter_line() {
        let result = YieldResult {
            num_success: 800,
            num_total: 1000,
            num_unresolved: 0,
            unresolved_reasons: Vec::new(),
        };
        assert_eq!(format_yield_report(&result), "Yield: 800 / 1000 = 80.0 %\n");
    }

    #[test]
    fn yield_report_lists_unresolved_samples() {
        let result = YieldResult {
            num_success: 90,
            num_total: 100,
            num_unresolved: 4,
            unresolved_reasons: vec!["simulator timed out after 60s".to_string()],
        };
        let report = format_yield_report(&result);
        assert!(report.starts_with("Yield: 90 / 100 = 90.0 %\n"));
        assert!(report.contains("Unresolved samples: 4"));
        assert!(report.contains("    simulator timed out after 60s"));
    }

    #[test]
    fn empty_yield_is_zero_percent() {
        let result = YieldResult {
            num_success: 0,
            num_total: 0,
            num_unresolved: 0,
            unresolved_reasons: Vec::new(),
        };
        assert_eq!(format_yield_report(&result), "Yield: 0 / 0 = 0.0 %\n");
    }

    #[test]
    fn point_formatting_uses_exponent_notation() {
        let mut point = ParameterVector::new();
        point.insert("R1", 0.7);
        point.insert("B2", 2.5);
        assert_eq!(format_point(&point), "R1=7e-1, B2=2.5e0");
    }
}
