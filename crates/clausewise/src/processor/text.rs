use std::path::Path;

use crate::error::ProcessError;
use crate::processor::{DocumentFormat, TextExtractor};

pub struct PlainTextExtractor;

impl PlainTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PlainTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<String, ProcessError> {
        let bytes = std::fs::read(path).map_err(|e| ProcessError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_supports_text_only() {
        let extractor = PlainTextExtractor::new();
        assert!(extractor.supports(DocumentFormat::Text));
        assert!(!extractor.supports(DocumentFormat::Pdf));
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let temp_file = NamedTempFile::with_suffix(".txt").unwrap();
        std::fs::write(temp_file.path(), b"Clause \xff one").unwrap();

        let text = PlainTextExtractor::new().extract(temp_file.path()).unwrap();
        assert!(text.starts_with("Clause "));
        assert!(text.ends_with(" one"));
    }
}
