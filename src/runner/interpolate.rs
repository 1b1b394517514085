//! Variable interpolation for strings
//!
//! Replaces runtime `${var}` references with task arguments or environment
//! variables, in that order.

use crate::error::{InterpolationError, InterpolationResult};
use regex::Regex;
use std::collections::HashMap;
use std::env;
use std::sync::OnceLock;

/// Maximum expansion passes before giving up on self-referencing values
const MAX_PASSES: usize = 16;

fn variable_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("variable pattern is valid"))
}

fn lookup(name: &str, vars: &HashMap<String, String>) -> Option<String> {
    vars.get(name).cloned().or_else(|| env::var(name).ok())
}

/// Interpolate variables in a string
///
/// Undefined variables are left in place. Values that themselves contain
/// `${var}` references are expanded again.
pub fn interpolate(s: &str, vars: &HashMap<String, String>) -> InterpolationResult<String> {
    let re = variable_pattern();
    let mut result = s.to_string();

    for _ in 0..MAX_PASSES {
        let mut changed = false;
        let next = re
            .replace_all(&result, |caps: &regex::Captures| match lookup(&caps[1], vars) {
                Some(value) => {
                    changed = true;
                    value
                }
                None => caps[0].to_string(),
            })
            .into_owned();

        if !changed {
            return Ok(next);
        }
        result = next;
    }

    Err(InterpolationError::RecursiveInterpolation)
}

/// Interpolate with strict mode - errors on undefined variables
pub fn interpolate_strict(
    s: &str,
    vars: &HashMap<String, String>,
) -> InterpolationResult<String> {
    let result = interpolate(s, vars)?;

    if let Some(caps) = variable_pattern().captures(&result) {
        return Err(InterpolationError::UndefinedVariable(caps[1].to_string()));
    }

    Ok(result)
}
