//! Aggregates per-document findings into the size-bounded client report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::finding::{Finding, RiskLevel};
use crate::analysis::truncate_chars;
use crate::config::ReportConfig;

const FULL_ANALYSIS_NOTE: &str = "Response optimized for size. Contact for full analysis.";

/// Findings produced for one successfully analysed document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentFindings {
    pub filename: String,
    pub findings: Vec<Finding>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportItem {
    /// 1-based position within its document.
    pub clause_id: usize,
    pub clause: String,
    pub risk: RiskLevel,
    pub laws: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseInfo {
    pub max_clauses_per_doc: usize,
    pub text_truncated: bool,
    pub full_analysis_note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub status: String,
    pub message: String,
    pub files: Vec<String>,
    pub total_documents: usize,
    pub total_clauses_analyzed: usize,
    pub legal_analysis: Vec<ReportItem>,
    pub analyzed_at: DateTime<Utc>,
    pub response_info: ResponseInfo,
}

impl AnalysisReport {
    /// Builds the report, applying the clause cap and field truncation.
    pub fn build(documents: &[DocumentFindings], limits: &ReportConfig, now: DateTime<Utc>) -> Self {
        let legal_analysis: Vec<ReportItem> = documents
            .iter()
            .flat_map(|doc| {
                doc.findings
                    .iter()
                    .take(limits.max_clauses_per_doc)
                    .enumerate()
                    .map(|(i, finding)| ReportItem {
                        clause_id: i + 1,
                        clause: truncate_chars(&finding.clause, limits.clause_chars),
                        risk: finding.risk,
                        laws: truncate_chars(&finding.laws, limits.laws_chars),
                        summary: truncate_chars(&finding.summary, limits.summary_chars),
                    })
            })
            .collect();

        let files: Vec<String> = documents.iter().map(|d| d.filename.clone()).collect();

        Self {
            status: "completed".to_string(),
            message: format!("Successfully analyzed {} legal documents", files.len()),
            total_documents: files.len(),
            total_clauses_analyzed: legal_analysis.len(),
            files,
            legal_analysis,
            analyzed_at: now,
            response_info: ResponseInfo {
                max_clauses_per_doc: limits.max_clauses_per_doc,
                text_truncated: true,
                full_analysis_note: FULL_ANALYSIS_NOTE.to_string(),
            },
        }
    }

    /// Opaque payload stored on a completed job.
    pub fn to_value(&self) -> serde_json::Value {
        match serde_json::to_value(self) {
            Ok(value) => value,
            Err(e) => {
                log::error!("Failed to serialize analysis report: {}", e);
                serde_json::Value::Null
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::finding::Confidence;

    fn finding(clause: &str) -> Finding {
        Finding {
            clause: clause.to_string(),
            risk: RiskLevel::High,
            laws: "Contract law".to_string(),
            summary: "Summary".to_string(),
            confidence: Confidence::High,
            analyzed_at: Utc::now(),
        }
    }

    fn doc(name: &str, count: usize) -> DocumentFindings {
        DocumentFindings {
            filename: name.to_string(),
            findings: (0..count).map(|i| finding(&format!("Clause {}", i))).collect(),
        }
    }

    #[test]
    fn test_report_counts_and_message() {
        let report = AnalysisReport::build(
            &[doc("a.pdf", 2), doc("b.pdf", 3)],
            &ReportConfig::default(),
            Utc::now(),
        );

        assert_eq!(report.status, "completed");
        assert_eq!(report.message, "Successfully analyzed 2 legal documents");
        assert_eq!(report.files, vec!["a.pdf", "b.pdf"]);
        assert_eq!(report.total_documents, 2);
        assert_eq!(report.total_clauses_analyzed, 5);
        let ids: Vec<usize> = report.legal_analysis.iter().map(|i| i.clause_id).collect();
        assert_eq!(ids, vec![1, 2, 1, 2, 3]);
    }

    #[test]
    fn test_report_caps_clauses_per_document() {
        let report = AnalysisReport::build(&[doc("a.pdf", 15)], &ReportConfig::default(), Utc::now());
        assert_eq!(report.total_clauses_analyzed, 10);
        assert_eq!(report.response_info.max_clauses_per_doc, 10);
    }

    #[test]
    fn test_report_truncates_fields() {
        let mut long = finding(&"c".repeat(600));
        long.summary = "s".repeat(301);
        long.laws = "l".repeat(200);
        let docs = [DocumentFindings {
            filename: "a.pdf".to_string(),
            findings: vec![long],
        }];

        let report = AnalysisReport::build(&docs, &ReportConfig::default(), Utc::now());
        let item = &report.legal_analysis[0];
        assert_eq!(item.clause.chars().count(), 503);
        assert!(item.summary.ends_with("..."));
        assert_eq!(item.laws.len(), 200);
    }

    #[test]
    fn test_report_serializes_wire_shape() {
        let report = AnalysisReport::build(&[doc("a.pdf", 1)], &ReportConfig::default(), Utc::now());
        let value = report.to_value();

        assert_eq!(value["legal_analysis"][0]["risk"], "High");
        assert_eq!(value["legal_analysis"][0]["clause_id"], 1);
        assert_eq!(value["response_info"]["text_truncated"], true);
        assert!(value["analyzed_at"].is_string());
    }

    #[test]
    fn test_empty_report() {
        let report = AnalysisReport::build(&[], &ReportConfig::default(), Utc::now());
        assert_eq!(report.message, "Successfully analyzed 0 legal documents");
        assert!(report.legal_analysis.is_empty());
    }
}
