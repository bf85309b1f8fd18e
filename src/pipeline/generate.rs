//! Text generation from the persisted résumé state.
//!
//! One stage per [`StageKind`]. Each composes a prompt from its template and
//! the latest [`IntermediateState`], then makes exactly one text-only model
//! call. There is no retry at this level; generation calls are billed and the
//! user can simply ask again.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::model::{Credential, GenerativeModel};
use crate::pipeline::llm;
use crate::prompts::{self, TemplateValues};
use crate::types::{IntermediateState, StageKind};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

pub struct GenerationStage {
    model: Arc<dyn GenerativeModel>,
    timeout_secs: u64,
}

impl GenerationStage {
    pub fn new(model: Arc<dyn GenerativeModel>, config: &PipelineConfig) -> Self {
        Self {
            model,
            timeout_secs: config.api_timeout_secs,
        }
    }

    /// Build the final prompt for `kind`.
    ///
    /// Interview questions append the records, space-separated, to the
    /// template. The other stages render the template's `job_description`
    /// and `json_data` placeholders, where `json_data` is the batch as the
    /// same JSON array text that is stored on disk.
    pub fn compose(
        kind: StageKind,
        template: &str,
        state: &IntermediateState,
    ) -> Result<String, PipelineError> {
        match kind {
            StageKind::InterviewQuestions => {
                Ok(format!("{}{}", template, state.batch.joined(" ")))
            }
            StageKind::SkillGap | StageKind::CoverLetter => {
                let json_data = state.batch.to_json();
                let values = TemplateValues {
                    job_description: &state.job_description,
                    json_data: &json_data,
                };
                prompts::render(kind.template().file_name(), template, &values)
            }
        }
    }

    /// Compose the prompt and call the text model once.
    pub async fn generate(
        &self,
        kind: StageKind,
        state: &IntermediateState,
        template: &str,
        credential: &Credential,
    ) -> Result<String, PipelineError> {
        let prompt = Self::compose(kind, template, state)?;
        debug!("{}: prompt is {} chars", kind, prompt.len());

        let start = Instant::now();
        let text = llm::with_timeout(
            self.timeout_secs,
            self.model.generate_from_text(&prompt, credential),
        )
        .await?;

        info!(
            "Generated {} ({} chars) in {}ms",
            kind.title(),
            text.len(),
            start.elapsed().as_millis()
        );
        Ok(text)
    }
}
