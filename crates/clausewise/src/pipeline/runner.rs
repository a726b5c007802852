use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::{debug, info_span, warn, Instrument};

use crate::analysis::{Analyzer, DocumentFindings, Finding};
use crate::processor::TextExtractor;
use crate::sanitize;

use super::error::{panic_message, PipelineError, PipelineWarning};
use super::progress::ProgressReporter;

/// Label the analyzer is given for every uploaded document.
pub const DOCUMENT_LABEL: &str = "Legal Document";

/// One staged document awaiting analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    pub path: PathBuf,
    /// Name reported back to the client.
    pub filename: String,
    pub content_type: String,
}

impl WorkUnit {
    pub fn new(path: PathBuf, filename: impl Into<String>) -> Self {
        let content_type = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            path,
            filename: filename.into(),
            content_type,
        }
    }
}

/// What a pipeline run produced across all of its units.
#[derive(Debug, Default)]
pub struct PipelineOutcome {
    /// Successfully analysed documents, in unit order.
    pub documents: Vec<DocumentFindings>,
    pub warnings: Vec<PipelineWarning>,
}

enum UnitResult {
    Analyzed(DocumentFindings),
    Skipped(PipelineWarning),
}

pub struct Pipeline {
    extractor: Arc<dyn TextExtractor>,
    analyzer: Arc<dyn Analyzer>,
    min_text_chars: usize,
}

impl Pipeline {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        analyzer: Arc<dyn Analyzer>,
        min_text_chars: usize,
    ) -> Self {
        Self {
            extractor,
            analyzer,
            min_text_chars,
        }
    }

    /// Processes every unit in order. A unit that fails is recorded as a
    /// warning and never stops the run. `progress` is told after each unit.
    pub async fn run(&self, units: &[WorkUnit], progress: &dyn ProgressReporter) -> PipelineOutcome {
        let total = units.len();
        let mut outcome = PipelineOutcome::default();

        for (index, unit) in units.iter().enumerate() {
            match self.run_unit(unit).await {
                UnitResult::Analyzed(doc) => outcome.documents.push(doc),
                UnitResult::Skipped(warning) => outcome.warnings.push(warning),
            }
            progress.report(index + 1, total);
        }

        outcome
    }

    async fn run_unit(&self, unit: &WorkUnit) -> UnitResult {
        let span = info_span!("unit",
            filename = %sanitize::redact_path(&unit.path),
            content_type = %unit.content_type,
        );

        async {
            // Step 1: Extract text
            let text = match self
                .step_extract(unit)
                .instrument(info_span!("extract_text"))
                .await
            {
                Ok(text) => text,
                Err(e) => {
                    warn!("Skipping {}: {}", unit.filename, e);
                    return UnitResult::Skipped(PipelineWarning::UnitFailed {
                        filename: unit.filename.clone(),
                        error: e.to_string(),
                    });
                }
            };

            let chars = text.trim().chars().count();
            if chars < self.min_text_chars {
                warn!(
                    "Skipping {}: only {} characters of text extracted",
                    unit.filename, chars
                );
                return UnitResult::Skipped(PipelineWarning::InsufficientText {
                    filename: unit.filename.clone(),
                    chars,
                });
            }

            // Step 2: Analyze
            match self
                .step_analyze(&text)
                .instrument(info_span!("analyze"))
                .await
            {
                Ok(findings) => {
                    debug!("Analyzed {}: {} findings", unit.filename, findings.len());
                    UnitResult::Analyzed(DocumentFindings {
                        filename: unit.filename.clone(),
                        findings,
                    })
                }
                Err(e) => {
                    warn!("Analysis of {} failed: {}", unit.filename, e);
                    UnitResult::Skipped(PipelineWarning::UnitFailed {
                        filename: unit.filename.clone(),
                        error: e.to_string(),
                    })
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn step_extract(&self, unit: &WorkUnit) -> Result<String, PipelineError> {
        let extractor = Arc::clone(&self.extractor);
        let path = unit.path.clone();
        let text = tokio::task::spawn_blocking(move || extractor.extract(&path))
            .await
            .map_err(|e| PipelineError::ExtractionAborted(e.to_string()))??;
        Ok(text)
    }

    /// A panicking analyzer costs only the current unit, the same as a
    /// panicking extractor.
    async fn step_analyze(&self, text: &str) -> Result<Vec<Finding>, PipelineError> {
        let findings = AssertUnwindSafe(self.analyzer.analyze(text, DOCUMENT_LABEL))
            .catch_unwind()
            .await
            .map_err(|payload| PipelineError::AnalysisAborted(panic_message(&*payload)))??;
        Ok(findings)
    }
}
