pub mod pdf;
pub mod text;

use std::path::Path;

use crate::error::ProcessError;

pub use pdf::PdfTextExtractor;
pub use text::PlainTextExtractor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Text,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "txt" | "text" | "md" => Some(DocumentFormat::Text),
            _ => None,
        }
    }
}

/// Pulls plain text out of a stored document.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String, ProcessError>;
    fn supports(&self, format: DocumentFormat) -> bool;
}

/// Dispatches to the first extractor that handles the file's format.
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn TextExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::with_extractors(vec![
            Box::new(PdfTextExtractor::new()),
            Box::new(PlainTextExtractor::new()),
        ])
    }

    pub fn with_extractors(extractors: Vec<Box<dyn TextExtractor>>) -> Self {
        Self { extractors }
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TextExtractor for ExtractorRegistry {
    fn extract(&self, path: &Path) -> Result<String, ProcessError> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let format = DocumentFormat::from_extension(extension)
            .ok_or_else(|| ProcessError::UnsupportedFormat(extension.to_string()))?;

        for extractor in &self.extractors {
            if extractor.supports(format) {
                return extractor.extract(path);
            }
        }

        Err(ProcessError::UnsupportedFormat(extension.to_string()))
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        self.extractors.iter().any(|e| e.supports(format))
    }
}
