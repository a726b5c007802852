pub mod finding;
pub mod gemini;
pub mod report;
pub mod response;

use async_trait::async_trait;

use crate::error::AnalysisError;

pub use finding::{Confidence, Finding, RiskLevel};
pub use gemini::GeminiAnalyzer;
pub use report::{AnalysisReport, DocumentFindings, ReportItem, ResponseInfo};

/// External AI collaborator that reviews a document's text.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Returns findings in the order the provider reported them.
    async fn analyze(&self, text: &str, label: &str) -> Result<Vec<Finding>, AnalysisError>;
}

/// Keeps the first `max` chars, marking the cut with `...`.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}
