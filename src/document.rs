//! Input-side data model: the uploaded [`Document`], its [`DocumentFormat`],
//! and the [`ExtractedText`] every extraction strategy must produce.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub const MIME_PLAIN_TEXT: &str = "text/plain";
pub const MIME_PDF: &str = "application/pdf";
pub const MIME_LEGACY_WORD: &str = "application/msword";
pub const MIME_WORD: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// An uploaded document: raw bytes plus the MIME type the caller declared.
///
/// Immutable. Cloning is cheap (the payload is reference-counted), which lets
/// blocking extraction run on another thread without copying the bytes.
#[derive(Clone)]
pub struct Document {
    bytes: Arc<[u8]>,
    mime: String,
}

impl Document {
    pub fn new(bytes: impl Into<Arc<[u8]>>, mime: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime: mime.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The declared MIME type, exactly as received.
    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Resolve the declared type to a supported format.
    pub fn format(&self) -> Result<DocumentFormat, PipelineError> {
        DocumentFormat::from_mime(&self.mime)
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// The closed set of formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentFormat {
    PlainText,
    Pdf,
    /// Word 97–2003 (`.doc`).
    LegacyWord,
    /// Office Open XML (`.docx`).
    Word,
}

impl DocumentFormat {
    pub const ALL: [DocumentFormat; 4] = [
        DocumentFormat::PlainText,
        DocumentFormat::Pdf,
        DocumentFormat::LegacyWord,
        DocumentFormat::Word,
    ];

    /// Map a declared MIME type to a format.
    ///
    /// Case and parameters are ignored (`Text/Plain; charset=utf-8` is plain
    /// text). Anything outside the supported set is `UnsupportedFormat`,
    /// naming the type as declared.
    pub fn from_mime(mime: &str) -> Result<Self, PipelineError> {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            MIME_PLAIN_TEXT => Ok(DocumentFormat::PlainText),
            MIME_PDF => Ok(DocumentFormat::Pdf),
            MIME_LEGACY_WORD => Ok(DocumentFormat::LegacyWord),
            MIME_WORD => Ok(DocumentFormat::Word),
            _ => Err(PipelineError::UnsupportedFormat {
                mime: mime.to_string(),
            }),
        }
    }

    /// Canonical MIME type for this format.
    pub fn mime(self) -> &'static str {
        match self {
            DocumentFormat::PlainText => MIME_PLAIN_TEXT,
            DocumentFormat::Pdf => MIME_PDF,
            DocumentFormat::LegacyWord => MIME_LEGACY_WORD,
            DocumentFormat::Word => MIME_WORD,
        }
    }

    /// Short human name used in error messages.
    pub fn label(self) -> &'static str {
        match self {
            DocumentFormat::PlainText => "plain text",
            DocumentFormat::Pdf => "PDF",
            DocumentFormat::LegacyWord => "Word 97-2003",
            DocumentFormat::Word => "Word",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Normalized, guaranteed non-blank document text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    text: String,
    format: DocumentFormat,
}

impl ExtractedText {
    /// Normalize `raw` and enforce the non-blank invariant.
    ///
    /// Normalization strips a leading BOM and NUL characters, converts CRLF
    /// and lone CR to LF, and trims surrounding whitespace. Blank results are
    /// `EmptyContent` regardless of format.
    pub fn new(raw: &str, format: DocumentFormat) -> Result<Self, PipelineError> {
        let text = normalize(raw);
        if text.is_empty() {
            return Err(PipelineError::EmptyContent {
                format: format.label().to_string(),
            });
        }
        Ok(Self { text, format })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    /// Length in characters.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

fn normalize(raw: &str) -> String {
    let s = raw.strip_prefix('\u{FEFF}').unwrap_or(raw);
    let s = s.replace("\r\n", "\n").replace('\r', "\n").replace('\0', "");
    s.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_mime_supported_set() {
        for format in DocumentFormat::ALL {
            assert_eq!(DocumentFormat::from_mime(format.mime()).unwrap(), format);
        }
    }

    #[test]
    fn from_mime_ignores_case_and_parameters() {
        assert_eq!(
            DocumentFormat::from_mime("Text/Plain; charset=utf-8").unwrap(),
            DocumentFormat::PlainText
        );
        assert_eq!(
            DocumentFormat::from_mime(" application/PDF ").unwrap(),
            DocumentFormat::Pdf
        );
    }

    #[test]
    fn from_mime_unsupported_names_declared_type() {
        for mime in ["image/png", "text/html", "application/zip", ""] {
            match DocumentFormat::from_mime(mime) {
                Err(PipelineError::UnsupportedFormat { mime: m }) => assert_eq!(m, mime),
                other => panic!("expected UnsupportedFormat for {mime:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn extracted_text_is_normalized() {
        let t = ExtractedText::new("\u{FEFF}  line one\r\nline\0 two\r  ", DocumentFormat::PlainText)
            .unwrap();
        assert_eq!(t.as_str(), "line one\nline two");
        assert_eq!(t.char_count(), 17);
    }

    #[test]
    fn blank_text_is_empty_content_for_every_format() {
        for format in DocumentFormat::ALL {
            for blank in ["", "   ", "\n\t\r\n", "\u{FEFF}"] {
                let err = ExtractedText::new(blank, format).unwrap_err();
                assert!(
                    matches!(err, PipelineError::EmptyContent { .. }),
                    "{format}: {err}"
                );
            }
        }
    }

    #[test]
    fn document_is_cheap_to_clone_and_debug_hides_bytes() {
        let doc = Document::new(b"hello".to_vec(), MIME_PLAIN_TEXT);
        let copy = doc.clone();
        assert_eq!(copy.bytes(), b"hello");
        assert_eq!(format!("{doc:?}"), "Document { mime: \"text/plain\", len: 5 }");
    }
}
