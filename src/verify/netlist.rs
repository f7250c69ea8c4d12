//! Netlist parameter substitution.
//!
//! Circuit parameters live on `.param` directive lines (`.param R1=2.0`,
//! possibly several assignments per line, case-insensitive names). This
//! module rewrites the values of overridden parameters and leaves everything
//! else byte-identical, including `.param` values that are expressions over
//! other parameters.

use indexmap::IndexMap;

use crate::domain::ParameterVector;
use crate::error::AppError;

/// Rewrite `.param` assignments for every component of `overrides`.
///
/// Fails when an override names a parameter the netlist never defines, since
/// the simulator would silently run without it.
pub fn substitute_parameters(netlist: &str, overrides: &ParameterVector) -> Result<String, AppError> {
    let mut pending: IndexMap<String, (String, f64)> = overrides
        .iter()
        .map(|(name, value)| (name.to_lowercase(), (name.to_string(), value)))
        .collect();

    let mut out = String::with_capacity(netlist.len());
    for line in netlist.lines() {
        if pending.is_empty() || !is_param_line(line) {
            out.push_str(line);
        } else {
            out.push_str(&rewrite_param_line(line, &mut pending));
        }
        out.push('\n');
    }

    if !pending.is_empty() {
        let missing: Vec<&str> = pending.values().map(|(name, _)| name.as_str()).collect();
        return Err(AppError::new(
            2,
            format!("Parameter(s) not defined in the netlist: {}", missing.join(", ")),
        ));
    }

    Ok(out)
}

/// Names defined by `.param` lines, lowercased, in order of appearance.
pub fn defined_parameters(netlist: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for line in netlist.lines().filter(|line| is_param_line(line)) {
        let normalized = normalize_assignments(line);
        for token in normalized.split_whitespace().skip(1) {
            if let Some((name, _)) = token.split_once('=') {
                let lower = name.to_lowercase();
                if !names.contains(&lower) {
                    names.push(lower);
                }
            }
        }
    }
    names
}

fn is_param_line(line: &str) -> bool {
    line.split_whitespace()
        .next()
        .is_some_and(|token| token.eq_ignore_ascii_case(".param"))
}

fn rewrite_param_line(line: &str, pending: &mut IndexMap<String, (String, f64)>) -> String {
    let normalized = normalize_assignments(line);
    let mut tokens: Vec<String> = Vec::new();
    let mut changed = false;

    for (i, token) in normalized.split_whitespace().enumerate() {
        if i > 0 {
            if let Some((name, _)) = token.split_once('=') {
                if let Some((_, value)) = pending.shift_remove(&name.to_lowercase()) {
                    tokens.push(format!("{name}={value:e}"));
                    changed = true;
                    continue;
                }
            }
        }
        tokens.push(token.to_string());
    }

    // Untouched lines keep their original spacing.
    if changed { tokens.join(" ") } else { line.to_string() }
}

/// Collapse whitespace around `=` so `R1 = 2.0` tokenizes as one assignment.
fn normalize_assignments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_whitespace() {
            while matches!(chars.peek(), Some(w) if w.is_whitespace()) {
                chars.next();
            }
            if matches!(chars.peek(), Some('=')) {
                continue;
            }
            out.push(' ');
        } else if c == '=' {
            out.push('=');
            while matches!(chars.peek(), Some(w) if w.is_whitespace()) {
                chars.next();
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const NETLIST: &str = "\
* test circuit
.param R1=1.0
.param SCALE=R1*2
B1 1 2 jj1 area=SCALE
.end
";

    fn overrides(pairs: &[(&str, f64)]) -> ParameterVector {
        pairs.iter().map(|(n, v)| (n.to_string(), *v)).collect()
    }

    #[test]
    fn substitutes_value_and_leaves_expressions_alone() {
        let out = substitute_parameters(NETLIST, &overrides(&[("R1", 0.7)])).unwrap();
        assert!(out.contains(".param R1=7e-1"), "got:\n{out}");
        // Expression params and device lines stay untouched.
        assert!(out.contains(".param SCALE=R1*2"));
        assert!(out.contains("B1 1 2 jj1 area=SCALE"));
    }

    #[test]
    fn matches_names_case_insensitively() {
        let netlist = ".PARAM b1=2.0\n.end\n";
        let out = substitute_parameters(netlist, &overrides(&[("B1", 2.5)])).unwrap();
        assert!(out.contains(".PARAM b1=2.5e0"), "got:\n{out}");
    }

    #[test]
    fn rewrites_only_the_matched_assignment() {
        let netlist = ".param A=1.0 B=2.0 C=A+B\n.end\n";
        let out = substitute_parameters(netlist, &overrides(&[("B", 4.0)])).unwrap();
        assert!(out.contains(".param A=1.0 B=4e0 C=A+B"), "got:\n{out}");
    }

    #[test]
    fn tolerates_spaces_around_equals() {
        let netlist = ".param R1 = 1.0\n.end\n";
        let out = substitute_parameters(netlist, &overrides(&[("R1", 2.0)])).unwrap();
        assert!(out.contains(".param R1=2e0"), "got:\n{out}");
    }

    #[test]
    fn unknown_parameter_is_a_configuration_error() {
        let err = substitute_parameters(NETLIST, &overrides(&[("L9", 1.0)])).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("L9"));
    }

    #[test]
    fn defined_parameters_in_order_of_appearance() {
        let names = defined_parameters(NETLIST);
        assert_eq!(names, vec!["r1".to_string(), "scale".to_string()]);
    }
}
