//! Pipeline orchestrator and library entry points.
//!
//! [`FlashcardPipeline`] sequences extraction, prompt building, the backend
//! call and response parsing for one document. Every stage is fail-fast: the
//! first error ends the run and nothing is retried here. The only retry in
//! the crate is the opt-in rate-limit budget inside the model client.
//!
//! The free functions ([`generate`], [`generate_from_input`],
//! [`generate_sync`]) build a pipeline from a [`GenerationConfig`] for
//! callers that do not need to plug in their own [`ModelClient`].

use crate::classify::{classify_and_log, ClassifiedError};
use crate::config::GenerationConfig;
use crate::document::Document;
use crate::error::PipelineError;
use crate::output::{GenerationOutput, GenerationStats};
use crate::pipeline::llm::{LlmModelClient, ModelClient};
use crate::pipeline::{extract, input, parse};
use crate::prompts::build_prompt;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Runs documents through extract → prompt → model → parse.
///
/// Holds no per-request state, so one pipeline can serve any number of
/// concurrent [`run`](Self::run) calls.
pub struct FlashcardPipeline<C> {
    client: C,
}

impl<C: ModelClient> FlashcardPipeline<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Generate flashcards for one document.
    ///
    /// `None` models a request that arrived without a file; it fails with
    /// [`PipelineError::MissingInput`] before any other work.
    pub async fn run(&self, document: Option<&Document>) -> Result<GenerationOutput, PipelineError> {
        let total_start = Instant::now();
        let document = document.ok_or(PipelineError::MissingInput)?;
        info!("Generating flashcards: {:?}", document);

        // ── Step 1: Extract text ─────────────────────────────────────────────
        let extraction_start = Instant::now();
        let text = extract::extract_blocking(document).await?;
        let extraction_duration_ms = extraction_start.elapsed().as_millis() as u64;
        debug!(
            "Extracted {} chars in {}ms",
            text.char_count(),
            extraction_duration_ms
        );

        // ── Step 2: Build prompt ─────────────────────────────────────────────
        let prompt = build_prompt(&text);

        // ── Step 3: Call the model ───────────────────────────────────────────
        let llm_start = Instant::now();
        let raw = self.client.generate(&prompt).await?;
        let llm_duration_ms = llm_start.elapsed().as_millis() as u64;

        // ── Step 4: Parse and validate ───────────────────────────────────────
        let flashcards = parse::parse_flashcards(&raw)?;

        let stats = GenerationStats {
            extracted_chars: text.char_count(),
            prompt_tokens: raw.prompt_tokens,
            completion_tokens: raw.completion_tokens,
            extraction_duration_ms,
            llm_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };

        info!(
            "Generated {} flashcards in {}ms",
            flashcards.len(),
            stats.total_duration_ms
        );

        Ok(GenerationOutput {
            flashcards,
            total_chunks: 1,
            processed_chunks: 1,
            stats,
        })
    }

    /// [`run`](Self::run), with failures classified for presentation.
    ///
    /// The full error is logged; the caller only sees the category, status
    /// and user-facing message.
    pub async fn respond(
        &self,
        document: Option<&Document>,
    ) -> Result<GenerationOutput, ClassifiedError> {
        self.run(document).await.map_err(|e| classify_and_log(&e))
    }
}

impl FlashcardPipeline<LlmModelClient> {
    /// Pipeline backed by the provider `config` resolves to.
    pub fn from_config(config: &GenerationConfig) -> Result<Self, PipelineError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(LlmModelClient::new(provider, config)))
    }
}

/// Generate flashcards for an in-memory document.
pub async fn generate(
    document: &Document,
    config: &GenerationConfig,
) -> Result<GenerationOutput, PipelineError> {
    FlashcardPipeline::from_config(config)?
        .run(Some(document))
        .await
}

/// Resolve a path or URL, then generate flashcards for it.
///
/// `declared_mime` overrides the type detected from headers or extension.
/// The size ceiling is checked before the provider is created.
pub async fn generate_from_input(
    input_str: impl AsRef<str>,
    declared_mime: Option<&str>,
    config: &GenerationConfig,
) -> Result<GenerationOutput, PipelineError> {
    let document = input::resolve_input(input_str.as_ref(), declared_mime, config).await?;
    generate(&document, config).await
}

/// Synchronous wrapper around [`generate_from_input`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_sync(
    input_str: impl AsRef<str>,
    declared_mime: Option<&str>,
    config: &GenerationConfig,
) -> Result<GenerationOutput, PipelineError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PipelineError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate_from_input(input_str, declared_mime, config))
}

/// Write the success body as pretty JSON.
///
/// Uses atomic write (temp file + rename) so a crash never leaves a
/// half-written file behind.
pub async fn write_output(
    output: &GenerationOutput,
    path: impl AsRef<Path>,
) -> Result<(), PipelineError> {
    let path = path.as_ref();
    let write_failed = |reason: String| PipelineError::OutputWriteFailed {
        path: path.to_path_buf(),
        reason,
    };

    let json = serde_json::to_string_pretty(output).map_err(|e| write_failed(e.to_string()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| write_failed(e.to_string()))?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, json)
        .await
        .map_err(|e| write_failed(e.to_string()))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| write_failed(e.to_string()))?;

    Ok(())
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, PipelineError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        PipelineError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider** (`config.provider_name`) with the configured model.
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when
///    both are set and non-empty.
/// 4. **OpenAI** when `OPENAI_API_KEY` is set, so users holding several
///    keys get a predictable default.
/// 5. **Auto-detection** via [`ProviderFactory::from_env`].
pub fn resolve_provider(config: &GenerationConfig) -> Result<Arc<dyn LLMProvider>, PipelineError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_provider(name, config.model_or_default());
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", config.model_or_default());
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| PipelineError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ErrorCategory;
    use crate::document::MIME_PLAIN_TEXT;
    use crate::output::{Flashcard, FlashcardSet};
    use crate::pipeline::llm::RawModelOutput;
    use crate::prompts::GenerationPrompt;
    use std::sync::Mutex;

    /// Returns a canned response and records every prompt it receives.
    struct Scripted {
        reply: Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn ok(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    impl ModelClient for Scripted {
        async fn generate(
            &self,
            prompt: &GenerationPrompt,
        ) -> Result<RawModelOutput, PipelineError> {
            self.prompts.lock().unwrap().push(prompt.as_str().to_string());
            match &self.reply {
                Ok(text) => Ok(RawModelOutput {
                    text: text.clone(),
                    prompt_tokens: 42,
                    completion_tokens: 7,
                }),
                Err(message) => Err(PipelineError::BackendFailure {
                    message: message.clone(),
                }),
            }
        }
    }

    fn text_doc(s: &str) -> Document {
        Document::new(s.as_bytes().to_vec(), MIME_PLAIN_TEXT)
    }

    #[tokio::test]
    async fn run_returns_cards_and_stats() {
        let pipeline = FlashcardPipeline::new(Scripted::ok(
            r#"[{"question":"What do ribosomes make?","answer":"Proteins"}]"#,
        ));
        let out = pipeline
            .run(Some(&text_doc("Ribosomes make proteins.")))
            .await
            .unwrap();

        assert_eq!(
            out.flashcards,
            FlashcardSet::from(vec![Flashcard {
                question: "What do ribosomes make?".into(),
                answer: "Proteins".into(),
            }])
        );
        assert_eq!(out.total_chunks, 1);
        assert_eq!(out.processed_chunks, 1);
        assert!(out.is_complete());
        assert_eq!(out.stats.extracted_chars, 24);
        assert_eq!(out.stats.prompt_tokens, 42);
        assert_eq!(out.stats.completion_tokens, 7);
    }

    #[tokio::test]
    async fn prompt_embeds_extracted_text() {
        let pipeline = FlashcardPipeline::new(Scripted::ok("[]"));
        pipeline
            .run(Some(&text_doc("  Enzymes lower activation energy.\r\n")))
            .await
            .unwrap();

        let prompts = pipeline.client().prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Content:\nEnzymes lower activation energy.\n"));
    }

    #[tokio::test]
    async fn missing_document_never_reaches_the_backend() {
        let pipeline = FlashcardPipeline::new(Scripted::ok("[]"));
        assert!(matches!(
            pipeline.run(None).await,
            Err(PipelineError::MissingInput)
        ));
        assert_eq!(pipeline.client().calls(), 0);
    }

    #[tokio::test]
    async fn extraction_failure_skips_the_backend() {
        let pipeline = FlashcardPipeline::new(Scripted::ok("[]"));
        let doc = Document::new(b"   ".to_vec(), MIME_PLAIN_TEXT);
        assert!(matches!(
            pipeline.run(Some(&doc)).await,
            Err(PipelineError::EmptyContent { .. })
        ));
        assert_eq!(pipeline.client().calls(), 0);
    }

    #[tokio::test]
    async fn backend_failure_is_surfaced_unchanged() {
        let pipeline = FlashcardPipeline::new(Scripted::failing("upstream exploded"));
        match pipeline.run(Some(&text_doc("Some text."))).await {
            Err(PipelineError::BackendFailure { message }) => {
                assert_eq!(message, "upstream exploded")
            }
            other => panic!("expected BackendFailure, got {other:?}"),
        }
        assert_eq!(pipeline.client().calls(), 1);
    }

    #[tokio::test]
    async fn respond_classifies_failures() {
        let pipeline = FlashcardPipeline::new(Scripted::failing("429: rate_limit_exceeded"));
        let err = pipeline
            .respond(Some(&text_doc("Some text.")))
            .await
            .unwrap_err();
        assert_eq!(err.category, ErrorCategory::RateLimited);
        assert_eq!(err.status, 429);

        let pipeline = FlashcardPipeline::new(Scripted::ok("not json"));
        let err = pipeline
            .respond(Some(&text_doc("Some text.")))
            .await
            .unwrap_err();
        assert_eq!(err.category, ErrorCategory::Internal);
        assert_eq!(err.status, 500);
    }

    #[tokio::test]
    async fn write_output_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cards.json");
        let pipeline = FlashcardPipeline::new(Scripted::ok(
            r#"[{"question":"Q","answer":"A"}]"#,
        ));
        let out = pipeline.run(Some(&text_doc("text"))).await.unwrap();

        write_output(&out, &path).await.unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["flashcards"][0]["answer"], "A");
        assert_eq!(written["totalChunks"], 1);
        assert!(!path.with_extension("json.tmp").exists());
    }
}
