//! Helpers for sanitizing untrusted names and data before they reach the
//! filesystem, tracing span attributes or an AI prompt.

use std::path::Path;

/// Returns only the filename component of a path (no directory).
///
/// Safe for span fields: reveals the file name without exposing the full path.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Reduces a client-supplied upload name to a single safe path component.
///
/// Directory parts are dropped (both `/` and `\` separators), control
/// characters are removed and names that collapse to nothing become `None`.
pub fn safe_file_name(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        return None;
    }
    Some(cleaned.to_string())
}

/// Neutralises markdown code fences in document text embedded in a prompt,
/// so a document cannot close the fence and inject instructions.
pub fn sanitize_for_prompt(text: &str) -> String {
    text.replace("```", "'''")
}
