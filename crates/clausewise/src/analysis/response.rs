//! Turns the provider's free-form answer into findings.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::analysis::finding::{Confidence, Finding, RiskLevel};
use crate::analysis::truncate_chars;
use crate::error::AnalysisError;

pub const DEFAULT_LAWS: &str = "General contract law principles";
pub const DEFAULT_SUMMARY: &str = "Analysis not available";

/// Sections of a free-text answer shorter than this are ignored.
const MIN_SECTION_CHARS: usize = 50;
const FALLBACK_CLAUSE_CHARS: usize = 500;

/// A numbered (`3.`) or bulleted (`*`, `-`) line opens a new section.
static RE_SECTION_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+\.|\*|-)").unwrap());

#[derive(Debug, Deserialize)]
struct RawFinding {
    #[serde(default)]
    clause: Value,
    #[serde(default)]
    risk: Value,
    #[serde(default)]
    laws: Value,
    #[serde(default)]
    summary: Value,
}

/// Parses the answer as a JSON array of findings, falling back to splitting
/// numbered or bulleted sections out of the text.
pub fn parse_findings(
    response: &str,
    max_fallback: usize,
    now: DateTime<Utc>,
) -> Result<Vec<Finding>, AnalysisError> {
    if response.trim().is_empty() {
        return Err(AnalysisError::EmptyResponse);
    }

    let cleaned = clean_response_text(response);
    match serde_json::from_str::<Vec<Value>>(&cleaned) {
        Ok(items) => Ok(items
            .into_iter()
            .filter_map(|item| serde_json::from_value::<RawFinding>(item).ok())
            .map(|raw| structured_finding(raw, now))
            .collect()),
        Err(e) => {
            log::warn!("Analysis response is not a JSON array ({}), parsing as text", e);
            Ok(fallback_findings(response, max_fallback, now))
        }
    }
}

fn structured_finding(raw: RawFinding, now: DateTime<Utc>) -> Finding {
    Finding {
        clause: value_text(&raw.clause).unwrap_or_default(),
        risk: value_text(&raw.risk)
            .map(|r| RiskLevel::parse_lenient(&r))
            .unwrap_or_default(),
        laws: value_text(&raw.laws).unwrap_or_else(|| DEFAULT_LAWS.to_string()),
        summary: value_text(&raw.summary).unwrap_or_else(|| DEFAULT_SUMMARY.to_string()),
        confidence: Confidence::High,
        analyzed_at: now,
    }
}

/// Flattens a JSON field the model may have answered as a string, list or number.
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(value_text)
                .collect::<Vec<_>>()
                .join("; "),
        ),
        other => Some(other.to_string()),
    }
}

/// Strips markdown fences and narrows the text to the outermost JSON array.
pub fn clean_response_text(text: &str) -> String {
    let unfenced = text.replace("```json", "").replace("```", "");
    let unfenced = unfenced.trim();
    extract_json_array(unfenced).unwrap_or(unfenced).to_string()
}

/// Finds the first balanced `[...]`, ignoring brackets inside strings.
fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '[' if !in_string => depth += 1,
            ']' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }

    // Unbalanced, take everything up to the last bracket.
    text.rfind(']')
        .filter(|end| *end > start)
        .map(|end| &text[start..=end])
}

/// Splits free text into sections that start at numbered or bulleted lines.
fn split_sections(text: &str) -> Vec<String> {
    let mut sections: Vec<String> = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if RE_SECTION_START.is_match(line) && !current.is_empty() {
            sections.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        sections.push(current);
    }
    sections
}

fn fallback_findings(text: &str, max: usize, now: DateTime<Utc>) -> Vec<Finding> {
    split_sections(text)
        .iter()
        .enumerate()
        .filter(|(_, section)| section.trim().chars().count() > MIN_SECTION_CHARS)
        .map(|(i, section)| Finding {
            clause: truncate_chars(section, FALLBACK_CLAUSE_CHARS),
            risk: RiskLevel::Medium,
            laws: DEFAULT_LAWS.to_string(),
            summary: format!("Clause analysis extracted from section {}", i + 1),
            confidence: Confidence::Medium,
            analyzed_at: now,
        })
        .take(max)
        .collect()
}
