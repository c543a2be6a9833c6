//! Output types: the validated cards and the response bodies built from them.

use crate::classify::ClassifiedError;
use serde::{Deserialize, Serialize};

/// One question/answer study card. Both fields are non-blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub question: String,
    pub answer: String,
}

/// Cards in generation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlashcardSet(Vec<Flashcard>);

impl FlashcardSet {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Flashcard> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Flashcard] {
        &self.0
    }
}

impl From<Vec<Flashcard>> for FlashcardSet {
    fn from(cards: Vec<Flashcard>) -> Self {
        Self(cards)
    }
}

impl IntoIterator for FlashcardSet {
    type Item = Flashcard;
    type IntoIter = std::vec::IntoIter<Flashcard>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a FlashcardSet {
    type Item = &'a Flashcard;
    type IntoIter = std::slice::Iter<'a, Flashcard>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Result of one successful pipeline run.
///
/// Serialises to the success response body:
/// `{"flashcards": [...], "totalChunks": 1, "processedChunks": 1, "stats": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutput {
    pub flashcards: FlashcardSet,
    /// Content units identified in the document. Always 1: documents are
    /// processed whole.
    pub total_chunks: usize,
    /// Content units actually sent to the backend. A value below
    /// `total_chunks` would mean partial processing.
    pub processed_chunks: usize,
    pub stats: GenerationStats,
}

impl GenerationOutput {
    /// True when every identified chunk was processed.
    pub fn is_complete(&self) -> bool {
        self.processed_chunks == self.total_chunks
    }
}

/// Timing and usage for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStats {
    pub extracted_chars: usize,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub extraction_duration_ms: u64,
    pub llm_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Failure response body: `{"error": "<message>"}`, sent with `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl From<&ClassifiedError> for ErrorBody {
    fn from(c: &ClassifiedError) -> Self {
        Self {
            error: c.message.clone(),
        }
    }
}
