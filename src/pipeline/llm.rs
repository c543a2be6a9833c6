//! Model client: the pipeline's only network boundary.
//!
//! [`ModelClient`] is the seam the orchestrator talks to. [`LlmModelClient`]
//! implements it on top of any `edgequake_llm` provider; tests substitute a
//! stub. The client sends one request and hands back the raw text; parsing
//! and classification happen elsewhere.
//!
//! ## Retry Strategy
//!
//! By default a pipeline run makes exactly one backend call. A caller may
//! hand the client a non-zero [`RetryBudget`]; the client then retries
//! failures whose message indicates rate limiting, and nothing else, with
//! exponential backoff (`backoff_ms * 2^(attempt-1)`).

use crate::classify::is_rate_limited;
use crate::config::{GenerationConfig, RetryBudget};
use crate::error::PipelineError;
use crate::prompts::{GenerationPrompt, SYSTEM_PROMPT};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Unparsed text returned by the backend, with the usage it reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawModelOutput {
    pub text: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

impl RawModelOutput {
    /// Output with no usage information.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            prompt_tokens: 0,
            completion_tokens: 0,
        }
    }
}

/// Sends a prompt to a generation backend.
///
/// Any backend failure must come back as [`PipelineError::BackendFailure`]
/// carrying the backend's message unchanged.
pub trait ModelClient: Send + Sync {
    fn generate(
        &self,
        prompt: &GenerationPrompt,
    ) -> impl Future<Output = Result<RawModelOutput, PipelineError>> + Send;
}

impl<C: ModelClient> ModelClient for Arc<C> {
    fn generate(
        &self,
        prompt: &GenerationPrompt,
    ) -> impl Future<Output = Result<RawModelOutput, PipelineError>> + Send {
        self.as_ref().generate(prompt)
    }
}

/// [`ModelClient`] backed by an `edgequake_llm` provider.
pub struct LlmModelClient {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    options: CompletionOptions,
    retry: RetryBudget,
    timeout: Option<Duration>,
}

impl LlmModelClient {
    /// Build a client from a provider and the relevant config fields.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &GenerationConfig) -> Self {
        Self {
            provider,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| SYSTEM_PROMPT.to_string()),
            options: build_options(config),
            retry: config.retry,
            timeout: config.api_timeout(),
        }
    }

    /// Replace the retry budget, e.g. with [`RetryBudget::NONE`] for a
    /// client shared by callers that do their own retrying.
    pub fn with_retry(mut self, retry: RetryBudget) -> Self {
        self.retry = retry;
        self
    }

    async fn attempt(&self, messages: &[ChatMessage]) -> Result<RawModelOutput, String> {
        let call = self.provider.chat(messages, Some(&self.options));
        let response = match self.timeout {
            Some(limit) => timeout(limit, call)
                .await
                .map_err(|_| format!("request timed out after {}s", limit.as_secs()))?,
            None => call.await,
        }
        .map_err(|e| format!("{}", e))?;

        Ok(RawModelOutput {
            text: response.content,
            prompt_tokens: response.prompt_tokens as usize,
            completion_tokens: response.completion_tokens as usize,
        })
    }
}

impl ModelClient for LlmModelClient {
    async fn generate(&self, prompt: &GenerationPrompt) -> Result<RawModelOutput, PipelineError> {
        let messages = vec![
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user(prompt.as_str()),
        ];

        let mut attempt: u32 = 0;
        loop {
            match self.attempt(&messages).await {
                Ok(output) => {
                    debug!(
                        "LLM call succeeded: {} input tokens, {} output tokens",
                        output.prompt_tokens, output.completion_tokens
                    );
                    return Ok(output);
                }
                Err(message) => {
                    if attempt < self.retry.max_retries && is_rate_limited(&message) {
                        attempt += 1;
                        let backoff = self.retry.backoff(attempt);
                        warn!(
                            "Rate limited; retry {}/{} after {}ms",
                            attempt,
                            self.retry.max_retries,
                            backoff.as_millis()
                        );
                        sleep(backoff).await;
                        continue;
                    }
                    warn!("LLM call failed: {}", message);
                    return Err(PipelineError::BackendFailure { message });
                }
            }
        }
    }
}

/// Build `CompletionOptions` from the generation config.
fn build_options(config: &GenerationConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: config.temperature,
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}
