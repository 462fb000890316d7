//! Turns uploaded documents into pipeline input text.
//!
//! Supports plain text, Word (`.docx`) and PDF. Word and PDF need the
//! `documents` feature.

#[cfg(feature = "documents")]
mod docx;

use crate::errors::ExtractionError;
use std::path::Path;
use tracing::debug;

/// A document format we can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// UTF-8 text (`.txt`).
    Text,
    /// Office Open XML word processing document (`.docx`).
    Word,
    /// Portable Document Format (`.pdf`).
    Pdf,
}

impl DocumentKind {
    /// Detects the format from a file extension, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedFormat` for any other extension.
    pub fn from_path(path: &Path) -> Result<Self, ExtractionError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "txt" => Ok(Self::Text),
            "docx" => Ok(Self::Word),
            "pdf" => Ok(Self::Pdf),
            _ => Err(ExtractionError::UnsupportedFormat(ext)),
        }
    }

    /// Short lowercase name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Word => "docx",
            Self::Pdf => "pdf",
        }
    }
}

/// Reads a document and returns its text.
///
/// Paragraphs (Word) and pages (PDF) are joined with blank lines, skipping
/// blank ones.
///
/// # Errors
///
/// Returns `UnsupportedFormat` for unknown extensions, `Io` if the file
/// cannot be read, `Corrupt` if it cannot be parsed and `Empty` if it holds
/// no text.
pub fn extract_text(path: impl AsRef<Path>) -> Result<String, ExtractionError> {
    let path = path.as_ref();
    let kind = DocumentKind::from_path(path)?;
    let bytes = std::fs::read(path)?;
    let text = extract_bytes(kind, &bytes)?;
    debug!(path = %path.display(), kind = kind.name(), chars = text.chars().count(), "Extracted document text");
    Ok(text)
}

/// Extracts text from an in-memory document.
///
/// # Errors
///
/// See [`extract_text`].
pub fn extract_bytes(kind: DocumentKind, bytes: &[u8]) -> Result<String, ExtractionError> {
    let text = match kind {
        DocumentKind::Text => String::from_utf8_lossy(bytes).into_owned(),
        DocumentKind::Word => read_word(bytes)?,
        DocumentKind::Pdf => read_pdf(bytes)?,
    };

    if text.trim().is_empty() {
        return Err(ExtractionError::Empty);
    }
    Ok(text)
}

#[cfg(feature = "documents")]
fn read_word(bytes: &[u8]) -> Result<String, ExtractionError> {
    docx::paragraphs(bytes).map(join_blocks)
}

#[cfg(not(feature = "documents"))]
fn read_word(_bytes: &[u8]) -> Result<String, ExtractionError> {
    Err(ExtractionError::UnsupportedFormat("docx".into()))
}

#[cfg(feature = "documents")]
fn read_pdf(bytes: &[u8]) -> Result<String, ExtractionError> {
    let corrupt = |reason: String| ExtractionError::Corrupt {
        format: "pdf",
        reason,
    };
    // The PDF parser can panic on malformed input.
    let text = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
        .map_err(|_| corrupt("parser panicked".to_string()))?
        .map_err(|e| corrupt(e.to_string()))?;
    // Pages come back separated by form feeds.
    Ok(join_blocks(text.split('\u{c}').map(str::to_string)))
}

#[cfg(not(feature = "documents"))]
fn read_pdf(_bytes: &[u8]) -> Result<String, ExtractionError> {
    Err(ExtractionError::UnsupportedFormat("pdf".into()))
}

#[cfg_attr(not(feature = "documents"), allow(dead_code))]
fn join_blocks(blocks: impl IntoIterator<Item = String>) -> String {
    blocks
        .into_iter()
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_kind_from_path() {
        assert_eq!(DocumentKind::from_path(Path::new("a.TXT")).unwrap(), DocumentKind::Text);
        assert_eq!(DocumentKind::from_path(Path::new("b.docx")).unwrap(), DocumentKind::Word);
        assert_eq!(DocumentKind::from_path(Path::new("c.Pdf")).unwrap(), DocumentKind::Pdf);
        assert!(matches!(
            DocumentKind::from_path(Path::new("d.odt")),
            Err(ExtractionError::UnsupportedFormat(ext)) if ext == "odt"
        ));
        assert!(matches!(
            DocumentKind::from_path(Path::new("noext")),
            Err(ExtractionError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_extract_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("story.txt");
        std::fs::write(&path, "Customers order bread.\nThe baker bakes it.").unwrap();

        assert_eq!(
            extract_text(&path).unwrap(),
            "Customers order bread.\nThe baker bakes it."
        );
    }

    #[test]
    fn test_extract_text_file_invalid_utf8_is_lossy() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        file.write_all(b"caf\xe9 order").unwrap();

        let text = extract_text(file.path()).unwrap();
        assert!(text.starts_with("caf"));
        assert!(text.ends_with(" order"));
    }

    #[test]
    fn test_blank_document_is_empty() {
        assert!(matches!(
            extract_bytes(DocumentKind::Text, b"  \n\t "),
            Err(ExtractionError::Empty)
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            extract_text(dir.path().join("missing.txt")),
            Err(ExtractionError::Io(_))
        ));
    }

    #[test]
    fn test_join_blocks() {
        let blocks = vec![" one ".to_string(), "   ".to_string(), "two".to_string()];
        assert_eq!(join_blocks(blocks), "one\n\ntwo");
    }

    #[cfg(feature = "documents")]
    #[test]
    fn test_extract_docx_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("story.docx");
        std::fs::write(
            &path,
            docx::tests::build_docx(&["Customers order bread.", "", "Bakers &amp; couriers."]),
        )
        .unwrap();

        assert_eq!(
            extract_text(&path).unwrap(),
            "Customers order bread.\n\nBakers & couriers."
        );
    }

    #[cfg(feature = "documents")]
    #[test]
    fn test_corrupt_pdf() {
        assert!(matches!(
            extract_bytes(DocumentKind::Pdf, b"not a pdf"),
            Err(ExtractionError::Corrupt { format: "pdf", .. })
        ));
    }
}
