//! Prompts for flashcard generation.
//!
//! Every prompt lives here so a wording change touches one place and tests
//! can inspect the exact text sent to the backend.
//!
//! The contract asked of the model is deliberately minimal: a JSON array of
//! flat `{"question", "answer"}` objects and nothing else. The parser in
//! [`crate::pipeline::parse`] validates exactly that shape.

use crate::document::ExtractedText;
use std::fmt;

/// Default system message. Overridable via
/// [`crate::config::GenerationConfig::system_prompt`].
pub const SYSTEM_PROMPT: &str = "You are a flashcard generation assistant.";

/// Instruction placed before the document text.
pub const INSTRUCTION: &str = r#"Generate flashcards from the following content. Respond ONLY with a JSON array of flashcard objects. Each object must have a "question" field and an "answer" field, both strings. Do not include any other text, explanations, or Markdown formatting."#;

/// A complete user prompt for one document. Built once, never modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationPrompt(String);

impl GenerationPrompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GenerationPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Wrap extracted text in the fixed instruction template.
pub fn build_prompt(text: &ExtractedText) -> GenerationPrompt {
    GenerationPrompt(format!(
        "{INSTRUCTION}\n\nContent:\n{}\n\nFlashcards:\n",
        text.as_str()
    ))
}
