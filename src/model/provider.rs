//! Adapter from any `edgequake-llm` provider to [`GenerativeModel`].
//!
//! `edgequake-llm` providers (OpenAI, Anthropic, Gemini, Mistral, Ollama, …)
//! read their API key when they are constructed by [`ProviderFactory`]. The
//! per-call [`Credential`] therefore cannot be forwarded; callers pass
//! [`Credential::provider_managed`].

use super::{Credential, EncodedImage, GenerationOptions, GenerativeModel};
use crate::error::{ModelError, PipelineError};
use async_trait::async_trait;
use edgequake_llm::{
    ChatMessage, CompletionOptions, ImageData, LLMProvider, LlmError, ProviderFactory,
};
use std::sync::Arc;
use tracing::debug;

/// A [`GenerativeModel`] backed by `edgequake-llm` providers.
pub struct ProviderModel {
    label: String,
    vision: Arc<dyn LLMProvider>,
    text: Arc<dyn LLMProvider>,
    options: GenerationOptions,
}

impl ProviderModel {
    /// Use one pre-built provider for both vision and text calls.
    pub fn new(provider: Arc<dyn LLMProvider>, options: GenerationOptions) -> Self {
        Self {
            label: "edgequake".to_string(),
            vision: Arc::clone(&provider),
            text: provider,
            options,
        }
    }

    /// Build vision and text providers by name through [`ProviderFactory`].
    pub fn from_factory(
        provider_name: &str,
        vision_model: &str,
        text_model: &str,
        options: GenerationOptions,
    ) -> Result<Self, PipelineError> {
        let create = |model: &str| {
            ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
                PipelineError::InvalidConfig(format!(
                    "LLM provider '{provider_name}' with model '{model}' is not configured: {e}"
                ))
            })
        };
        let vision = create(vision_model)?;
        let text = if text_model == vision_model {
            Arc::clone(&vision)
        } else {
            create(text_model)?
        };
        Ok(Self {
            label: format!("{provider_name}:{vision_model}"),
            vision,
            text,
            options,
        })
    }

    fn completion_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.options.temperature),
            max_tokens: Some(self.options.max_output_tokens),
            ..Default::default()
        }
    }

    async fn chat(
        &self,
        provider: &Arc<dyn LLMProvider>,
        messages: Vec<ChatMessage>,
    ) -> Result<String, ModelError> {
        let options = self.completion_options();
        let response = provider
            .chat(&messages, Some(&options))
            .await
            .map_err(classify_provider_error)?;
        debug!(
            "{}: {} input tokens, {} output tokens",
            self.label, response.prompt_tokens, response.completion_tokens
        );
        if response.content.trim().is_empty() {
            return Err(ModelError::EmptyResponse);
        }
        Ok(response.content)
    }
}

#[async_trait]
impl GenerativeModel for ProviderModel {
    fn name(&self) -> String {
        self.label.clone()
    }

    async fn generate_from_image(
        &self,
        prompt: &str,
        image: &EncodedImage,
        _credential: &Credential,
    ) -> Result<String, ModelError> {
        let data = ImageData::new(image.data_base64.clone(), image.mime_type.clone())
            .with_detail("high");
        let messages = vec![ChatMessage::user_with_images(prompt, vec![data])];
        self.chat(&self.vision, messages).await
    }

    async fn generate_from_text(
        &self,
        prompt: &str,
        _credential: &Credential,
    ) -> Result<String, ModelError> {
        self.chat(&self.text, vec![ChatMessage::user(prompt)]).await
    }
}

/// Map `edgequake-llm` errors onto the categories retries and user-facing
/// messages depend on.
fn classify_provider_error(err: LlmError) -> ModelError {
    match err {
        LlmError::AuthError(detail) => ModelError::Auth { detail },
        LlmError::RateLimited(_) => ModelError::RateLimited {
            retry_after_secs: None,
        },
        LlmError::NetworkError(detail) => ModelError::Network(detail),
        LlmError::Timeout => ModelError::Network(LlmError::Timeout.to_string()),
        other => ModelError::Provider(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_errors_are_classified_by_variant() {
        assert!(matches!(
            classify_provider_error(LlmError::AuthError("invalid api key".into())),
            ModelError::Auth { .. }
        ));
        assert!(matches!(
            classify_provider_error(LlmError::RateLimited("slow down".into())),
            ModelError::RateLimited { .. }
        ));
        assert!(classify_provider_error(LlmError::Timeout).is_transient());
        assert!(classify_provider_error(LlmError::NetworkError("reset".into())).is_transient());
    }

    #[test]
    fn status_like_digits_in_messages_do_not_change_the_category() {
        let err = classify_provider_error(LlmError::ApiError(
            "request req_401403 used 503 tokens".into(),
        ));
        assert!(matches!(err, ModelError::Provider(_)), "got {err:?}");
        assert!(!err.is_transient());
    }
}
