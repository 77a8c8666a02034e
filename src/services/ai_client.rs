//! Generative text model client.
//!
//! Talks to the Gemini `generateContent` REST endpoint. The rest of the crate
//! only sees the [`GenerativeModel`] trait, so a deployment without an API key
//! runs with [`DisabledModel`] and tests can script responses.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, instrument};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI service is not configured")]
    NotConfigured,

    #[error("AI service request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("AI service rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("AI service quota exhausted")]
    QuotaExceeded,

    #[error("AI service returned no text")]
    EmptyResponse,
}

#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AiError>;

    fn is_enabled(&self) -> bool {
        true
    }

    fn model_name(&self) -> &str;
}

/// Stand-in used when no API key is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledModel;

#[async_trait]
impl GenerativeModel for DisabledModel {
    async fn generate(&self, _prompt: &str) -> Result<String, AiError> {
        Err(AiError::NotConfigured)
    }

    fn is_enabled(&self) -> bool {
        false
    }

    fn model_name(&self) -> &str {
        "disabled"
    }
}

/// Client for the Gemini API.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

/// Error envelope returned by the Gemini API.
#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
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

impl GenerateResponse {
    fn into_text(self) -> Option<String> {
        let text: String = self
            .candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

impl GeminiClient {
    /// Create a new Gemini client.
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout_seconds: u64,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        tracing::info!(base_url = base_url, model = model, "Gemini client initialized");

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    fn generate_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    // =========================================================================
    // Content generation
    // =========================================================================

    async fn post(&self, body: &GenerateRequest<'_>) -> Result<GenerateResponse, AiError> {
        let url = self.generate_url();
        debug!(url = %url, "Gemini request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Gemini request failed");
                AiError::Http(e)
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<GenerateResponse>().await?);
        }

        let message = response
            .json::<GeminiErrorResponse>()
            .await
            .map(|e| e.error.message)
            .unwrap_or_else(|_| format!("Gemini error: {status}"));

        match status {
            StatusCode::TOO_MANY_REQUESTS => Err(AiError::QuotaExceeded),
            _ => {
                error!(status = %status, message = %message, "Gemini error");
                Err(AiError::Rejected {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    #[instrument(skip(self, prompt), fields(model = %self.model, prompt_chars = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String, AiError> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                max_output_tokens: 4096,
            },
        };

        self.post(&request)
            .await?
            .into_text()
            .ok_or(AiError::EmptyResponse)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
