//! Text extraction: dispatch a [`Document`] to its format's strategy.
//!
//! [`extract`] is the single gate between raw bytes and the rest of the
//! pipeline. Whatever strategy runs, its output passes through
//! [`ExtractedText::new`], so downstream stages never see blank input.
//!
//! Strategies are synchronous and may be CPU-heavy (pdfium, inflate), so the
//! orchestrator calls [`extract_blocking`], which moves the work onto the
//! blocking thread pool.

use super::{pdf, word};
use crate::document::{Document, DocumentFormat, ExtractedText};
use crate::error::PipelineError;
use tracing::debug;

/// Extract normalized text from a document.
pub fn extract(document: &Document) -> Result<ExtractedText, PipelineError> {
    let format = document.format()?;
    debug!(
        "Extracting {} bytes as {} ({})",
        document.len(),
        format,
        document.mime()
    );

    let raw = match format {
        DocumentFormat::PlainText => decode_plain_text(document.bytes()),
        DocumentFormat::Pdf => pdf::extract_text(document.bytes())?,
        DocumentFormat::Word => word::extract_docx(document.bytes())?,
        DocumentFormat::LegacyWord => word::extract_legacy(document.bytes())?,
    };

    let text = ExtractedText::new(&raw, format)?;
    debug!("Extracted {} chars from {}", text.char_count(), format);
    Ok(text)
}

/// [`extract`] on tokio's blocking pool.
pub async fn extract_blocking(document: &Document) -> Result<ExtractedText, PipelineError> {
    let document = document.clone();
    tokio::task::spawn_blocking(move || extract(&document))
        .await
        .map_err(|e| PipelineError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Decode plain text as UTF-8, replacing invalid sequences.
fn decode_plain_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
