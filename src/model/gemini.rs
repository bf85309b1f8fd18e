//! Google Gemini backend over the `generateContent` REST endpoint.
//!
//! The API key travels in the `x-goog-api-key` header of each request, taken
//! from the [`Credential`] of that call. The client itself holds no secret.

use super::{Credential, EncodedImage, GenerationOptions, GenerativeModel};
use crate::error::ModelError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini client with separate vision and text models.
#[derive(Debug, Clone)]
pub struct GeminiModel {
    client: Client,
    base_url: String,
    vision_model: String,
    text_model: String,
    options: GenerationOptions,
}

impl GeminiModel {
    pub fn new(
        vision_model: impl Into<String>,
        text_model: impl Into<String>,
        options: GenerationOptions,
    ) -> Result<Self, ModelError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| ModelError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            vision_model: vision_model.into(),
            text_model: text_model.into(),
            options,
        })
    }

    /// Point the client at another endpoint (proxy, regional gateway).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    async fn generate(
        &self,
        model: &str,
        parts: Vec<Part<'_>>,
        credential: &Credential,
    ) -> Result<String, ModelError> {
        let key = credential.key()?;
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts,
            }],
            generation_config: GenerationConfig {
                temperature: self.options.temperature,
                max_output_tokens: self.options.max_output_tokens,
            },
        };

        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Network(format!("request timed out: {e}"))
                } else {
                    ModelError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let text = response
            .text()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_error(status, retry_after, &text));
        }

        let parsed: GenerateResponse = serde_json::from_str(&text).map_err(|e| ModelError::Api {
            status: status.as_u16(),
            message: format!("unreadable response body: {e}"),
        })?;
        let out = parsed.text().ok_or(ModelError::EmptyResponse)?;
        debug!("{} returned {} chars", model, out.len());
        Ok(out)
    }
}

#[async_trait]
impl GenerativeModel for GeminiModel {
    fn name(&self) -> String {
        format!("gemini:{}", self.vision_model)
    }

    async fn generate_from_image(
        &self,
        prompt: &str,
        image: &EncodedImage,
        credential: &Credential,
    ) -> Result<String, ModelError> {
        let parts = vec![
            Part::Text { text: prompt },
            Part::InlineData {
                inline_data: InlineData {
                    mime_type: &image.mime_type,
                    data: &image.data_base64,
                },
            },
        ];
        self.generate(&self.vision_model, parts, credential).await
    }

    async fn generate_from_text(
        &self,
        prompt: &str,
        credential: &Credential,
    ) -> Result<String, ModelError> {
        self.generate(&self.text_model, vec![Part::Text { text: prompt }], credential)
            .await
    }
}

/// Map a non-success HTTP answer to a [`ModelError`].
///
/// Gemini reports an invalid key as `400 INVALID_ARGUMENT`, so the message is
/// inspected as well as the status.
fn classify_error(status: StatusCode, retry_after_secs: Option<u64>, body: &str) -> ModelError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.chars().take(300).collect());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ModelError::Auth { detail: message },
        StatusCode::TOO_MANY_REQUESTS => ModelError::RateLimited { retry_after_secs },
        StatusCode::BAD_REQUEST if message.contains("API key") => {
            ModelError::Auth { detail: message }
        }
        _ => ModelError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    #[serde(rename_all = "camelCase")]
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: usize,
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
    /// Concatenated text parts of the first candidate.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}
