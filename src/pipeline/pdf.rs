//! PDF strategy: read the text layer through pdfium.
//!
//! Only the embedded text layer is read; pages are never rasterised, so
//! scanned PDFs without a text layer come back blank and fail the shared
//! `EmptyContent` check.
//!
//! Every failure (wrong magic bytes, corrupt structure, encryption, missing
//! pdfium library) is reported as `ExtractionFailure` with a hint the user
//! can act on. pdfium's own error types never leave this module.

use crate::error::PipelineError;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::debug;

const FORMAT: &str = "PDF";

const CORRUPT_HINT: &str =
    "Could not parse PDF file. Please check the file format, or re-export it from the original application.";

const ENCRYPTED_HINT: &str =
    "The PDF is password-protected. Remove the password and upload it again.";

const LIBRARY_HINT: &str =
    "The PDFium library could not be loaded. Set PDFIUM_LIB_PATH=/path/to/libpdfium or install PDFium system-wide.";

/// Extract the concatenated text layer of every page, pages separated by a
/// blank line.
pub fn extract_text(bytes: &[u8]) -> Result<String, PipelineError> {
    if !bytes.starts_with(b"%PDF") {
        let magic: Vec<u8> = bytes.iter().take(4).copied().collect();
        return Err(PipelineError::extraction(
            FORMAT,
            format!("missing %PDF header (first bytes: {magic:?})"),
            CORRUPT_HINT,
        ));
    }

    let pdfium = load_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(map_load_error)?;

    let pages = document.pages();
    debug!("PDF loaded: {} pages", pages.len());

    let mut text = String::new();
    for (idx, page) in pages.iter().enumerate() {
        let page_text = page.text().map_err(|e| {
            PipelineError::extraction(
                FORMAT,
                format!("text layer of page {} unreadable: {e}", idx + 1),
                CORRUPT_HINT,
            )
        })?;
        if idx > 0 {
            text.push_str("\n\n");
        }
        text.push_str(&page_text.all());
    }

    Ok(text)
}

/// Bind to a pdfium library.
///
/// Discovery order:
/// 1. `PDFIUM_LIB_PATH` (explicit path to the library file)
/// 2. Alongside the running executable
/// 3. System library search paths
fn load_pdfium() -> Result<Pdfium, PipelineError> {
    if let Ok(path) = std::env::var("PDFIUM_LIB_PATH") {
        debug!("Loading PDFium from PDFIUM_LIB_PATH={}", path);
        let bindings = Pdfium::bind_to_library(&path).map_err(|e| {
            PipelineError::extraction(
                FORMAT,
                format!("failed to load PDFium from {path}: {e}"),
                LIBRARY_HINT,
            )
        })?;
        return Ok(Pdfium::new(bindings));
    }

    if let Some(dir) = exe_dir() {
        let lib_path = Pdfium::pdfium_platform_library_name_at_path(dir.to_string_lossy().as_ref());
        if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
            debug!("Loaded PDFium from {}", dir.display());
            return Ok(Pdfium::new(bindings));
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|e| {
        PipelineError::extraction(FORMAT, format!("PDFium library not found: {e}"), LIBRARY_HINT)
    })?;
    Ok(Pdfium::new(bindings))
}

fn exe_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
}

/// Encrypted documents get their own hint; everything else is "corrupt".
fn map_load_error(e: PdfiumError) -> PipelineError {
    let detail = format!("{e:?}");
    let lower = detail.to_lowercase();
    if lower.contains("password") || lower.contains("encrypt") || lower.contains("security") {
        PipelineError::extraction(FORMAT, detail, ENCRYPTED_HINT)
    } else {
        PipelineError::extraction(FORMAT, detail, CORRUPT_HINT)
    }
}
