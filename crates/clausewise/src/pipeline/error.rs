use std::any::Any;

use thiserror::Error;

/// Why a single work unit produced no findings.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Text extraction failed: {0}")]
    Extraction(#[from] crate::error::ProcessError),

    #[error("Text extraction task aborted: {0}")]
    ExtractionAborted(String),

    #[error("Analysis failed: {0}")]
    Analysis(#[from] crate::error::AnalysisError),

    #[error("Analysis aborted: {0}")]
    AnalysisAborted(String),
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// A unit that was left out of the report. The job carries on without it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineWarning {
    InsufficientText { filename: String, chars: usize },
    UnitFailed { filename: String, error: String },
}

impl PipelineWarning {
    pub fn filename(&self) -> &str {
        match self {
            PipelineWarning::InsufficientText { filename, .. }
            | PipelineWarning::UnitFailed { filename, .. } => filename,
        }
    }
}
