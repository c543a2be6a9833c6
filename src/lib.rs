//! # doc2cards
//!
//! Turn an uploaded document into question/answer flashcards with an LLM.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Document (bytes + declared MIME)
//!  │
//!  ├─ 1. Extract  plain text / PDF text layer / Word XML (spawn_blocking)
//!  ├─ 2. Prompt   fixed instruction + extracted text
//!  ├─ 3. Model    one chat call through edgequake-llm
//!  ├─ 4. Parse    strip fence, parse JSON array, validate every card
//!  └─ 5. Output   FlashcardSet + 1/1 chunks + stats, or one classified error
//! ```
//!
//! Each stage fails fast. A caller gets either a complete, validated set of
//! cards or exactly one [`ClassifiedError`] with an HTTP-style status
//! (400/413/429/500) and a message safe to show an end user.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use doc2cards::{generate_from_input, GenerationConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / ...
//!     let config = GenerationConfig::default();
//!     let output = generate_from_input("lecture.pdf", None, &config).await?;
//!     for card in &output.flashcards {
//!         println!("Q: {}\nA: {}\n", card.question, card.answer);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Plugging in a backend
//!
//! [`FlashcardPipeline`] is generic over [`ModelClient`], so tests and
//! embedders can swap the LLM for anything that returns text:
//!
//! ```rust
//! use doc2cards::{Document, FlashcardPipeline, GenerationPrompt, ModelClient, PipelineError, RawModelOutput};
//!
//! struct Canned;
//!
//! impl ModelClient for Canned {
//!     async fn generate(&self, _prompt: &GenerationPrompt) -> Result<RawModelOutput, PipelineError> {
//!         Ok(RawModelOutput::from_text(r#"[{"question":"Q","answer":"A"}]"#))
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let pipeline = FlashcardPipeline::new(Canned);
//! let doc = Document::new(b"Some notes.".to_vec(), "text/plain");
//! let out = pipeline.run(Some(&doc)).await.unwrap();
//! assert_eq!(out.flashcards.len(), 1);
//! # });
//! ```
//!
//! ## Supported Formats
//!
//! | MIME type | Strategy |
//! |-----------|----------|
//! | `text/plain` | UTF-8 decode (lossy) |
//! | `application/pdf` | pdfium text layer, no OCR |
//! | `application/vnd.openxmlformats-officedocument.wordprocessingml.document` | `word/document.xml` via zip + quick-xml |
//! | `application/msword` | OOXML if the payload is a ZIP, otherwise the Word 97 piece table via cfb |
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doc2cards` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! doc2cards = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod classify;
pub mod config;
pub mod document;
pub mod error;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use classify::{classify, classify_and_log, ClassifiedError, ErrorCategory};
pub use config::{GenerationConfig, GenerationConfigBuilder, RetryBudget, DEFAULT_MODEL};
pub use document::{Document, DocumentFormat, ExtractedText};
pub use error::{ErrorKind, PipelineError};
pub use generate::{
    generate, generate_from_input, generate_sync, resolve_provider, write_output,
    FlashcardPipeline,
};
pub use output::{ErrorBody, Flashcard, FlashcardSet, GenerationOutput, GenerationStats};
pub use pipeline::input::resolve_input;
pub use pipeline::llm::{LlmModelClient, ModelClient, RawModelOutput};
pub use prompts::{build_prompt, GenerationPrompt};
