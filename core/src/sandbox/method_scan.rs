use std::collections::BTreeSet;

use crate::interpreter::ScriptError;

/// Textual check for forbidden method calls, run before anything reaches
/// the interpreter. A plain substring match: `.count` also matches
/// `.counter`.
pub fn scan_forbidden_methods(
    code: &str,
    forbidden_methods: &BTreeSet<String>,
    marker: &str,
) -> Result<(), ScriptError> {
    let hits: Vec<&str> = forbidden_methods
        .iter()
        .filter(|method| !method.is_empty() && code.contains(method.as_str()))
        .map(|method| method.strip_prefix('.').unwrap_or(method))
        .collect();
    if hits.is_empty() {
        return Ok(());
    }

    let plural = if hits.len() > 1 { "s" } else { "" };
    Err(ScriptError::exclusion(format!(
        "{marker} method{plural}: {}",
        hits.join(", ")
    )))
}
