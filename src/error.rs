//! Error types for the doc2cards library.
//!
//! Every stage of the pipeline fails with a [`PipelineError`]. The variant is
//! the *kind* of failure; the `Display` text is the human-readable message.
//! Errors are terminal: the orchestrator never retries or downgrades them.
//! Only [`crate::classify`] turns a kind into the category/status/message
//! triple shown to an end user.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the doc2cards library.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The caller invoked the pipeline without a document.
    #[error("No file provided")]
    MissingInput,

    /// The declared MIME type is outside the supported set.
    #[error("Unsupported file type: {mime}")]
    UnsupportedFormat { mime: String },

    /// The extraction strategy ran but produced only whitespace.
    #[error("No text could be extracted from the {format} document")]
    EmptyContent { format: String },

    /// The caller could not turn its input into a document (missing file,
    /// unreadable path, failed download).
    #[error("Invalid input '{input}': {reason}")]
    InvalidInput { input: String, reason: String },

    /// The document exceeds the caller's size ceiling.
    #[error("Document '{input}' is {size} bytes; the limit is {limit} bytes")]
    DocumentTooLarge {
        input: String,
        size: u64,
        limit: u64,
    },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// A format-specific strategy failed on the document bytes.
    #[error("Could not read {format} document: {detail}\n{hint}")]
    ExtractionFailure {
        format: String,
        detail: String,
        hint: String,
    },

    // ── Backend errors ────────────────────────────────────────────────────
    /// The generation backend reported a failure. `message` is the backend's
    /// own text, untouched.
    #[error("LLM backend error: {message}")]
    BackendFailure { message: String },

    /// The configured provider could not be created (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Response errors ───────────────────────────────────────────────────
    /// The backend answered, but not with a valid flashcard array.
    ///
    /// `content` is the payload that failed, kept for diagnostics.
    #[error("Failed to parse flashcards: {reason}")]
    MalformedResponse { reason: String, content: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not write an output file.
    #[error("Failed to write output file '{}': {reason}", path.display())]
    OutputWriteFailed { path: PathBuf, reason: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Field-less mirror of [`PipelineError`] for matching and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    MissingInput,
    UnsupportedFormat,
    EmptyContent,
    InvalidInput,
    DocumentTooLarge,
    ExtractionFailure,
    BackendFailure,
    ProviderNotConfigured,
    MalformedResponse,
    InvalidConfig,
    OutputWriteFailed,
    Internal,
}

impl PipelineError {
    /// The kind of this error, without its payload.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::MissingInput => ErrorKind::MissingInput,
            PipelineError::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            PipelineError::EmptyContent { .. } => ErrorKind::EmptyContent,
            PipelineError::InvalidInput { .. } => ErrorKind::InvalidInput,
            PipelineError::DocumentTooLarge { .. } => ErrorKind::DocumentTooLarge,
            PipelineError::ExtractionFailure { .. } => ErrorKind::ExtractionFailure,
            PipelineError::BackendFailure { .. } => ErrorKind::BackendFailure,
            PipelineError::ProviderNotConfigured { .. } => ErrorKind::ProviderNotConfigured,
            PipelineError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            PipelineError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            PipelineError::OutputWriteFailed { .. } => ErrorKind::OutputWriteFailed,
            PipelineError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>, content: impl Into<String>) -> Self {
        PipelineError::MalformedResponse {
            reason: reason.into(),
            content: content.into(),
        }
    }

    pub(crate) fn extraction(
        format: impl Into<String>,
        detail: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        PipelineError::ExtractionFailure {
            format: format.into(),
            detail: detail.into(),
            hint: hint.into(),
        }
    }
}
