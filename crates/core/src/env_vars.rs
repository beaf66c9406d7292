//! Environment variable spec parsing.
//!
//! Process definitions carry static environment variables for the child
//! process as a single string, formatted as `KEY1=value1&KEY2=value2`.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::CoreError;

/// Key/value pattern for one `KEY=value` segment. Whitespace around the key
/// is tolerated; the value is taken verbatim (it may contain `=`).
fn keyvalue_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*(?P<name>[^=]+?)\s*=(?P<value>.*)$").expect("keyvalue pattern compiles")
    })
}

/// Parse an env spec like `"KEY1=value1&KEY2=value2"` into pairs.
///
/// Empty segments (e.g. a trailing `&`) are skipped; a non-empty segment
/// without a `=` is a validation error.
pub fn parse_env_spec(spec: &str) -> Result<Vec<(String, String)>, CoreError> {
    let mut pairs = Vec::new();
    for segment in spec.split('&') {
        if segment.trim().is_empty() {
            continue;
        }
        let captures = keyvalue_pattern().captures(segment).ok_or_else(|| {
            CoreError::Validation(format!(
                "Invalid environment variable segment '{segment}'. Expected KEY=value"
            ))
        })?;
        pairs.push((captures["name"].to_string(), captures["value"].to_string()));
    }
    Ok(pairs)
}
