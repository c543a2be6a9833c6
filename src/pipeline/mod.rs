//! Pipeline stages for document-to-flashcard generation.
//!
//! Each submodule implements one transformation step and can be tested on
//! its own. The orchestrator in [`crate::generate`] chains them and stops at
//! the first failure.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ prompts ──▶ llm ──▶ parse
//! (path/URL) (pdf/word)  (builder)  (model)  (JSON → cards)
//! ```
//!
//! 1. [`input`]:   caller-side: read a path or download a URL into a
//!    `Document`, enforcing the size ceiling
//! 2. [`extract`]: dispatch on the declared format to [`pdf`], [`word`] or
//!    the plain-text decoder; runs in `spawn_blocking`
//! 3. [`llm`]:     the only stage with network I/O; one call per run unless
//!    a retry budget is configured
//! 4. [`parse`]:   strip a Markdown fence, parse JSON, validate every card

pub mod extract;
pub mod input;
pub mod llm;
pub mod parse;
pub mod pdf;
pub mod word;
