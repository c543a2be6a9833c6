//! Error classification: map a [`PipelineError`] to what an end user sees.
//!
//! The pipeline reports *what* failed; this module decides *how to say it*.
//! Classification is pure and total: every error lands in exactly one
//! [`ErrorCategory`] with a stable HTTP-style status.
//!
//! Message patterns apply to backend failures only: a backend message that
//! mentions rate limiting is [`ErrorCategory::RateLimited`], one that reports
//! a context overflow is [`ErrorCategory::TooLarge`]. Caller-supplied text
//! such as file names or MIME types never reaches the matcher. Internal
//! details are logged, never returned.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::error;

/// Generic text shown for every [`ErrorCategory::Internal`] failure.
pub const INTERNAL_MESSAGE: &str = "Failed to generate flashcards. Please try again.";

const RATE_LIMITED_MESSAGE: &str = "Rate limit exceeded. Please try again in a few minutes.";

const TOO_LARGE_MESSAGE: &str = "Document is too large. Please try with a smaller document.";

const RATE_LIMIT_PATTERNS: &[&str] = &["rate_limit", "rate limit"];

const CONTEXT_LENGTH_PATTERNS: &[&str] = &["maximum context length", "context_length_exceeded"];

/// User-facing failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// The request itself is unusable (no file, wrong type, empty document).
    BadInput,
    /// The document is too big for the backend or the caller's ceiling.
    TooLarge,
    /// The backend is throttling us; retry later.
    RateLimited,
    /// Everything else.
    Internal,
}

impl ErrorCategory {
    /// Suggested HTTP status for this category.
    pub fn status(self) -> u16 {
        match self {
            ErrorCategory::BadInput => 400,
            ErrorCategory::TooLarge => 413,
            ErrorCategory::RateLimited => 429,
            ErrorCategory::Internal => 500,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::BadInput => "BadInput",
            ErrorCategory::TooLarge => "TooLarge",
            ErrorCategory::RateLimited => "RateLimited",
            ErrorCategory::Internal => "Internal",
        };
        f.write_str(name)
    }
}

/// A [`PipelineError`] ready for presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedError {
    pub category: ErrorCategory,
    pub status: u16,
    pub message: String,
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {}] {}", self.status, self.category, self.message)
    }
}

impl std::error::Error for ClassifiedError {}

/// Does this backend message describe rate limiting?
///
/// Shared with the model client, which retries only these failures.
pub fn is_rate_limited(message: &str) -> bool {
    contains_any(message, RATE_LIMIT_PATTERNS)
}

/// Does this backend message describe a context-length overflow?
pub fn is_context_overflow(message: &str) -> bool {
    contains_any(message, CONTEXT_LENGTH_PATTERNS)
}

fn contains_any(message: &str, patterns: &[&str]) -> bool {
    let lower = message.to_lowercase();
    patterns.iter().any(|p| lower.contains(p))
}

/// Classify an error. Pure: no logging, same input → same output.
pub fn classify(err: &PipelineError) -> ClassifiedError {
    let (category, message) = match err {
        PipelineError::BackendFailure { message } if is_rate_limited(message) => {
            (ErrorCategory::RateLimited, RATE_LIMITED_MESSAGE.to_string())
        }
        PipelineError::BackendFailure { message } if is_context_overflow(message) => {
            (ErrorCategory::TooLarge, TOO_LARGE_MESSAGE.to_string())
        }
        PipelineError::DocumentTooLarge { .. } => {
            (ErrorCategory::TooLarge, TOO_LARGE_MESSAGE.to_string())
        }
        PipelineError::MissingInput
        | PipelineError::UnsupportedFormat { .. }
        | PipelineError::EmptyContent { .. }
        | PipelineError::InvalidInput { .. } => (ErrorCategory::BadInput, err.to_string()),
        PipelineError::ExtractionFailure { .. }
        | PipelineError::BackendFailure { .. }
        | PipelineError::ProviderNotConfigured { .. }
        | PipelineError::MalformedResponse { .. }
        | PipelineError::InvalidConfig(_)
        | PipelineError::OutputWriteFailed { .. }
        | PipelineError::Internal(_) => (ErrorCategory::Internal, INTERNAL_MESSAGE.to_string()),
    };

    ClassifiedError {
        category,
        status: category.status(),
        message,
    }
}

/// Classify and log: the full diagnostic goes to `tracing`, the caller gets
/// only the classified triple.
pub fn classify_and_log(err: &PipelineError) -> ClassifiedError {
    let classified = classify(err);
    match err {
        PipelineError::MalformedResponse { reason, content } => error!(
            kind = ?err.kind(),
            status = classified.status,
            "{reason}; response content: {}",
            truncate(content, 2000)
        ),
        _ => error!(kind = ?err.kind(), status = classified.status, "{err}"),
    }
    classified
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}\u{2026}", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(msg: &str) -> PipelineError {
        PipelineError::BackendFailure {
            message: msg.to_string(),
        }
    }

    #[test]
    fn rate_limit_maps_to_429() {
        let c = classify(&backend("Error: rate_limit_exceeded for gpt-4o-mini"));
        assert_eq!(c.category, ErrorCategory::RateLimited);
        assert_eq!(c.status, 429);
        assert!(c.message.contains("try again"));
    }

    #[test]
    fn rate_limit_pattern_is_case_insensitive() {
        let c = classify(&backend("Rate limit reached for requests"));
        assert_eq!(c.category, ErrorCategory::RateLimited);
    }

    #[test]
    fn context_length_maps_to_413() {
        let c = classify(&backend(
            "This model's maximum context length is 128000 tokens",
        ));
        assert_eq!(c.category, ErrorCategory::TooLarge);
        assert_eq!(c.status, 413);
        assert!(c.message.contains("smaller document"));

        let c = classify(&backend("code: context_length_exceeded"));
        assert_eq!(c.status, 413);
    }

    #[test]
    fn rate_limit_wins_over_context_length() {
        let c = classify(&backend("rate_limit while checking maximum context length"));
        assert_eq!(c.category, ErrorCategory::RateLimited);
    }

    #[test]
    fn bad_input_kinds_map_to_400_with_own_message() {
        let cases = [
            PipelineError::MissingInput,
            PipelineError::UnsupportedFormat {
                mime: "image/png".into(),
            },
            PipelineError::EmptyContent {
                format: "plain text".into(),
            },
            PipelineError::InvalidInput {
                input: "nope.txt".into(),
                reason: "file not found".into(),
            },
        ];
        for err in cases {
            let c = classify(&err);
            assert_eq!(c.category, ErrorCategory::BadInput, "{err}");
            assert_eq!(c.status, 400);
            assert_eq!(c.message, err.to_string());
        }
    }

    #[test]
    fn caller_text_never_triggers_message_patterns() {
        let named = PipelineError::InvalidInput {
            input: "rate_limit_notes.txt".into(),
            reason: "file not found".into(),
        };
        let c = classify(&named);
        assert_eq!(c.category, ErrorCategory::BadInput);
        assert_eq!(c.status, 400);
        assert_eq!(c.message, named.to_string());

        let typed = PipelineError::UnsupportedFormat {
            mime: "text/rate_limit".into(),
        };
        assert_eq!(classify(&typed).status, 400);

        let overflow_name = PipelineError::InvalidInput {
            input: "maximum context length.pdf".into(),
            reason: "download failed".into(),
        };
        assert_eq!(classify(&overflow_name).status, 400);

        let extraction = PipelineError::extraction("PDF", "rate limit table on page 3", "re-save");
        assert_eq!(classify(&extraction).category, ErrorCategory::Internal);
    }

    #[test]
    fn missing_input_message() {
        assert_eq!(classify(&PipelineError::MissingInput).message, "No file provided");
    }

    #[test]
    fn document_too_large_maps_to_413() {
        let c = classify(&PipelineError::DocumentTooLarge {
            input: "a.pdf".into(),
            size: 20,
            limit: 10,
        });
        assert_eq!(c.category, ErrorCategory::TooLarge);
    }

    #[test]
    fn unknown_failures_are_internal_and_generic() {
        let cases = [
            backend("connection reset by peer"),
            PipelineError::malformed("not an array", "{\"api_key\":\"sk-123\"}"),
            PipelineError::extraction("PDF", "xref table broken", "try re-saving"),
            PipelineError::Internal("task panicked".into()),
        ];
        for err in cases {
            let c = classify(&err);
            assert_eq!(c.category, ErrorCategory::Internal, "{err}");
            assert_eq!(c.status, 500);
            assert_eq!(c.message, INTERNAL_MESSAGE);
        }
    }

    #[test]
    fn classification_is_deterministic() {
        let err = backend("rate_limit");
        assert_eq!(classify(&err), classify(&err));
    }

    #[test]
    fn classified_display() {
        let c = classify(&PipelineError::MissingInput);
        assert_eq!(c.to_string(), "[400 BadInput] No file provided");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé\u{2026}");
        assert_eq!(truncate("hi", 5), "hi");
    }
}
