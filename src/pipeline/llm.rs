//! LLM interaction: send the extracted text to a generation backend and turn
//! the reply into an [`ExtractionResult`].
//!
//! All prompt engineering lives in [`crate::prompts`]; all reply cleanup
//! lives in [`super::postprocess`]. This module owns backend selection,
//! retries and the mapping of failures to inline result fields.
//!
//! ## Backends
//!
//! * [`GeminiClient`]: the default. One `POST` to the Gemini REST
//!   `generateContent` endpoint authenticated by an API key.
//! * [`ProviderGenerator`]: any other `edgequake-llm` provider (OpenAI,
//!   Anthropic, Ollama, …) resolved by name through `ProviderFactory`.
//!
//! Both sit behind the [`TextGenerator`] trait so tests can substitute a
//! canned implementation.
//!
//! ## Retry Strategy
//!
//! Off by default. When `max_retries > 0`, transient failures (timeouts,
//! connection errors, 429, 5xx) are retried with exponential backoff
//! (`retry_backoff_ms * 2^attempt`). Permanent failures return immediately.

use crate::config::ExtractorConfig;
use crate::error::{GenerationError, Pdf2TableError};
use crate::output::ExtractionResult;
use crate::pipeline::postprocess::parse_reply;
use crate::prompts::{char_prefix, table_extraction_prompt};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// A backend that turns a prompt into generated text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Send `prompt` and return the generated text.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

// ── Gemini REST client ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: [RequestContent<'a>; 1],
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Pull the generated text out of a `generateContent` response body.
///
/// Concatenates the text parts of the first candidate.
fn reply_text(body: &str) -> Result<String, GenerationError> {
    let envelope: GenerateContentResponse =
        serde_json::from_str(body).map_err(|e| GenerationError::Envelope(e.to_string()))?;

    let parts = envelope
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts)
        .ok_or_else(|| GenerationError::Envelope("no candidates in response".into()))?;

    let text: String = parts.into_iter().filter_map(|p| p.text).collect();
    if text.is_empty() {
        return Err(GenerationError::Envelope(
            "first candidate has no text part".into(),
        ));
    }
    Ok(text)
}

/// Minimal client for the Gemini `generateContent` REST endpoint.
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout_secs: u64,
}

impl GeminiClient {
    pub fn new(
        api_base: &str,
        model: &str,
        api_key: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, Pdf2TableError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Pdf2TableError::Internal(format!("HTTP client init failed: {e}")))?;

        Ok(Self {
            http,
            endpoint: format!(
                "{}/v1beta/models/{}:generateContent",
                api_base.trim_end_matches('/'),
                model
            ),
            api_key: api_key.into(),
            timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_send_error(&self, e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            GenerationError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = GenerateContentRequest {
            contents: [RequestContent {
                parts: [RequestPart { text: prompt }],
            }],
        };

        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.map_send_error(e))?;

        if !status.is_success() {
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: char_prefix(&text, 200).to_string(),
            });
        }

        reply_text(&text)
    }
}

// ── edgequake-llm provider adapter ───────────────────────────────────────────

/// Adapts an `edgequake-llm` chat provider to [`TextGenerator`].
pub struct ProviderGenerator {
    provider: Arc<dyn LLMProvider>,
    name: String,
    temperature: f32,
    max_tokens: usize,
}

impl ProviderGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, name: impl Into<String>, config: &ExtractorConfig) -> Self {
        Self {
            provider,
            name: name.into(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl TextGenerator for ProviderGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let messages = vec![ChatMessage::user(prompt)];
        let response = self
            .provider
            .chat(&messages, Some(&self.options()))
            .await
            .map_err(|e| GenerationError::Provider(format!("{}", e)))?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.name, response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

/// Pick the generation backend for `config`.
///
/// Resolution order:
/// 1. Injected [`ExtractorConfig::generator`]
/// 2. Built-in Gemini REST client, when `provider_name` is `gemini` and a key is set
/// 3. `ProviderFactory::create_llm_provider(provider_name, model)` for any other name
///
/// `Ok(None)` means no credential is available; the caller then skips the
/// remote call entirely.
pub fn resolve_generator(
    config: &ExtractorConfig,
) -> Result<Option<Arc<dyn TextGenerator>>, Pdf2TableError> {
    if let Some(ref generator) = config.generator {
        return Ok(Some(Arc::clone(generator)));
    }

    if config.uses_gemini_rest() {
        let Some(key) = config.api_key.as_deref().filter(|k| !k.trim().is_empty()) else {
            return Ok(None);
        };
        let client = GeminiClient::new(
            &config.api_base,
            &config.model,
            key.trim(),
            config.api_timeout_secs,
        )?;
        info!("Using Gemini REST backend: {}", config.model);
        return Ok(Some(Arc::new(client)));
    }

    match ProviderFactory::create_llm_provider(&config.provider_name, &config.model) {
        Ok(provider) => {
            info!(
                "Using provider backend: {}/{}",
                config.provider_name, config.model
            );
            Ok(Some(Arc::new(ProviderGenerator::new(
                provider,
                config.provider_name.clone(),
                config,
            ))))
        }
        Err(e) => {
            warn!(
                "Provider '{}' unavailable ({}); remote extraction disabled",
                config.provider_name, e
            );
            Ok(None)
        }
    }
}

// ── Table extraction client ──────────────────────────────────────────────────

/// Turns document text into structured tables via a [`TextGenerator`].
///
/// Never fails: every failure mode is expressed as an [`ExtractionResult`]
/// carrying an `error` or `message` field.
pub struct TableExtractionClient {
    generator: Option<Arc<dyn TextGenerator>>,
    prompt_char_limit: usize,
    preview_char_limit: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl TableExtractionClient {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>, config: &ExtractorConfig) -> Self {
        Self {
            generator,
            prompt_char_limit: config.prompt_char_limit,
            preview_char_limit: config.preview_char_limit,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        }
    }

    pub fn from_config(config: &ExtractorConfig) -> Result<Self, Pdf2TableError> {
        Ok(Self::new(resolve_generator(config)?, config))
    }

    /// Whether a generation backend is available.
    pub fn credential_configured(&self) -> bool {
        self.generator.is_some()
    }

    /// Extract tables from `text`.
    ///
    /// Without a backend, returns the "no API key" result with a preview of
    /// the text and makes no outbound call.
    pub async fn extract_tables(&self, text: &str) -> ExtractionResult {
        let Some(ref generator) = self.generator else {
            info!("No LLM credential configured; returning text preview");
            return ExtractionResult::no_credential(
                char_prefix(text, self.preview_char_limit).to_string(),
            );
        };

        let prompt = table_extraction_prompt(text, self.prompt_char_limit);
        let start = Instant::now();

        let reply = match self.generate_with_retry(generator.as_ref(), &prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("{}: table extraction call failed: {}", generator.name(), e);
                return ExtractionResult::connection_error();
            }
        };

        debug!(
            "{}: {} chars back in {:?}",
            generator.name(),
            reply.chars().count(),
            start.elapsed()
        );

        match parse_reply(&reply) {
            Ok(result) => {
                for table in &result.tables {
                    let ragged = table.ragged_rows();
                    if ragged > 0 {
                        debug!(
                            "Table {:?}: {} rows differ in width from headers",
                            table.title, ragged
                        );
                    }
                }
                info!("Extracted {} tables", result.tables.len());
                result
            }
            Err(e) => {
                warn!("Could not parse model reply as JSON: {}", e);
                ExtractionResult::parse_error(reply)
            }
        }
    }

    async fn generate_with_retry(
        &self,
        generator: &dyn TextGenerator,
        prompt: &str,
    ) -> Result<String, GenerationError> {
        let mut last_err: Option<GenerationError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self
                    .retry_backoff_ms
                    .saturating_mul(1u64 << (attempt - 1).min(16));
                warn!(
                    "{}: retry {}/{} after {}ms",
                    generator.name(),
                    attempt,
                    self.max_retries,
                    backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match generator.generate(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    warn!("{}: attempt {} failed: {}", generator.name(), attempt + 1, e);
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| GenerationError::Transport("no attempt made".into())))
    }
}
