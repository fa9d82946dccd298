//! Environment variable interpolation for config files.
//!
//! Recognised forms:
//! - `${VAR}` - value of VAR, error if unset
//! - `${VAR:-fallback}` - fallback when VAR is unset or empty
//! - `$$` - literal `$`
//!
//! A bare `$` followed by anything else is left untouched, so glob patterns
//! and store addresses pass through unchanged.

use regex::{Captures, Regex};
use std::env;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\$|\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
        .expect("placeholder regex is valid")
});

/// Outcome of interpolating a config document.
#[derive(Debug)]
pub struct InterpolationResult {
    /// Text with every resolvable placeholder substituted.
    pub text: String,
    /// One message per unresolvable placeholder.
    pub errors: Vec<String>,
}

impl InterpolationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Substitute environment variables into `input`.
///
/// Every missing variable is reported, not just the first.
pub fn interpolate(input: &str) -> InterpolationResult {
    let mut errors = Vec::new();

    let text = PLACEHOLDER
        .replace_all(input, |caps: &Captures| {
            let Some(name) = caps.get(1).map(|m| m.as_str()) else {
                return "$".to_string();
            };
            let fallback = caps.get(2).map(|m| m.as_str());

            match (env::var(name), fallback) {
                (Ok(value), _) if value.contains(['\n', '\r']) => {
                    errors.push(format!("environment variable '{name}' contains newlines"));
                    caps[0].to_string()
                }
                (Ok(value), Some(fallback)) if value.is_empty() => fallback.to_string(),
                (Ok(value), _) => value,
                (Err(_), Some(fallback)) => fallback.to_string(),
                (Err(_), None) => {
                    errors.push(format!("environment variable '{name}' is not set"));
                    caps[0].to_string()
                }
            }
        })
        .into_owned();

    InterpolationResult { text, errors }
}
