//! The external generation service.
//!
//! The pipeline needs exactly two things from a model provider:
//!
//! * `generate_from_image(prompt, image)` — one résumé page in, text out
//! * `generate_from_text(prompt)` — a composed prompt in, text out
//!
//! [`GenerativeModel`] is that seam. Every call takes a [`Credential`]
//! explicitly; nothing is configured globally, so two callers with two keys
//! can share one pipeline.
//!
//! Two backends ship with the crate:
//!
//! | Backend           | Credential                                      |
//! |-------------------|-------------------------------------------------|
//! | [`GeminiModel`]   | per call, sent as `x-goog-api-key`              |
//! | [`ProviderModel`] | bound by the `edgequake-llm` provider at build  |

pub mod gemini;
pub mod provider;

use crate::error::ModelError;
use async_trait::async_trait;
use std::fmt;

pub use gemini::GeminiModel;
pub use provider::ProviderModel;

/// API credential passed into every model call.
///
/// `Debug` never prints the key.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    api_key: Option<String>,
}

impl Credential {
    /// A caller-supplied API key. Blank keys are rejected.
    pub fn api_key(key: impl Into<String>) -> Result<Self, ModelError> {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            return Err(ModelError::MissingCredential);
        }
        Ok(Self { api_key: Some(key) })
    }

    /// No key: the backend authenticates by its own means (e.g. an
    /// `edgequake-llm` provider configured from its environment, or a local
    /// Ollama server).
    pub fn provider_managed() -> Self {
        Self { api_key: None }
    }

    /// The key, or [`ModelError::MissingCredential`] when none was supplied.
    pub fn key(&self) -> Result<&str, ModelError> {
        self.api_key.as_deref().ok_or(ModelError::MissingCredential)
    }

    pub fn is_provider_managed(&self) -> bool {
        self.api_key.is_none()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.api_key {
            Some(_) => f.write_str("Credential(***)"),
            None => f.write_str("Credential(provider-managed)"),
        }
    }
}

/// A page image ready for a multimodal request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime_type: String,
    /// Standard base64 of the encoded image bytes.
    pub data_base64: String,
}

/// Sampling options shared by every call a backend makes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_output_tokens: usize,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_output_tokens: 4096,
        }
    }
}

impl From<&crate::config::PipelineConfig> for GenerationOptions {
    fn from(config: &crate::config::PipelineConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

/// A vision- and text-capable generation service.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Short identifier for logs, e.g. `gemini:gemini-2.0-flash`.
    fn name(&self) -> String;

    /// Generate text from a prompt and a single image.
    async fn generate_from_image(
        &self,
        prompt: &str,
        image: &EncodedImage,
        credential: &Credential,
    ) -> Result<String, ModelError>;

    /// Generate text from a prompt alone.
    async fn generate_from_text(
        &self,
        prompt: &str,
        credential: &Credential,
    ) -> Result<String, ModelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_key_is_rejected() {
        assert!(matches!(
            Credential::api_key("   "),
            Err(ModelError::MissingCredential)
        ));
    }

    #[test]
    fn debug_redacts_key() {
        let c = Credential::api_key("sk-secret").unwrap();
        let shown = format!("{c:?}");
        assert!(!shown.contains("secret"), "got: {shown}");
        assert_eq!(c.key().unwrap(), "sk-secret");
    }

    #[test]
    fn provider_managed_has_no_key() {
        let c = Credential::provider_managed();
        assert!(c.is_provider_managed());
        assert!(matches!(c.key(), Err(ModelError::MissingCredential)));
    }
}
