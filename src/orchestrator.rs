//! The operations a front end calls.
//!
//! [`Pipeline`] wires the prompt store, renderer, extraction stage, state
//! store and generation stages together. It holds no per-run state of its
//! own: everything a later call needs is read back from the
//! [`IntermediateStore`], so a restarted process picks up where the last
//! one left off.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::model::{Credential, GenerativeModel};
use crate::pipeline::extract::ExtractionStage;
use crate::pipeline::generate::GenerationStage;
use crate::pipeline::render::DocumentRenderer;
use crate::progress::{NoopProgress, ProgressHandle};
use crate::prompts::{PromptStore, PromptTemplate};
use crate::store::IntermediateStore;
use crate::types::{ExtractionBatch, IntermediateState, PageImage, ProcessedResume, StageKind};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

/// Shown instead of an artifact when nothing has been extracted yet.
pub const NO_STATE_MESSAGE: &str = "No data available yet. Please process a résumé first.";

/// Flatten an operation result into display text.
///
/// This is the only place where an error becomes a plain string.
pub fn display_outcome(result: Result<String, PipelineError>) -> String {
    match result {
        Ok(text) => text,
        Err(PipelineError::NoState) => NO_STATE_MESSAGE.to_string(),
        Err(e) => format!("An error occurred: {}", e),
    }
}

/// Log infrastructure failures; user errors are only returned.
fn log_failure(err: PipelineError) -> PipelineError {
    if !err.is_user_error() {
        error!("{}", err);
    }
    err
}

fn require_job_description(job_description: &str) -> Result<(), PipelineError> {
    if job_description.trim().is_empty() {
        return Err(PipelineError::InvalidInput {
            detail: "the job description is empty".to_string(),
        });
    }
    Ok(())
}

/// The batch as a JSON array, indented by four spaces.
pub fn pretty_batch(batch: &ExtractionBatch) -> Result<String, PipelineError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    batch
        .serialize(&mut ser)
        .map_err(|e| PipelineError::Internal(format!("Batch did not serialise: {}", e)))?;
    String::from_utf8(buf).map_err(|e| PipelineError::Internal(e.to_string()))
}

/// Résumé pipeline bound to one model backend and one state root.
pub struct Pipeline {
    config: PipelineConfig,
    renderer: DocumentRenderer,
    prompts: PromptStore,
    store: IntermediateStore,
    model: Arc<dyn GenerativeModel>,
    progress: ProgressHandle,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, model: Arc<dyn GenerativeModel>) -> Self {
        Self {
            renderer: DocumentRenderer::new(&config),
            prompts: PromptStore::new(&config.prompt_dir),
            store: IntermediateStore::new(&config.state_dir),
            config,
            model,
            progress: Arc::new(NoopProgress),
        }
    }

    /// Receive per-page extraction events.
    pub fn with_progress(mut self, progress: ProgressHandle) -> Self {
        self.progress = progress;
        self
    }

    /// Use a specific store, e.g. one shared with another pipeline.
    pub fn with_store(mut self, store: IntermediateStore) -> Self {
        self.store = store;
        self
    }

    /// Isolate persisted state under `<state_dir>/sessions/<id>`.
    pub fn with_session(mut self, id: &str) -> Result<Self, PipelineError> {
        self.store = self.store.for_session(id)?;
        Ok(self)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn prompts(&self) -> &PromptStore {
        &self.prompts
    }

    pub fn store(&self) -> &IntermediateStore {
        &self.store
    }

    /// Render, extract and persist one résumé.
    ///
    /// Nothing is persisted unless every page was extracted; on failure the
    /// previous state stays current. The rendered pages are returned for
    /// display.
    pub async fn process_resume(
        &self,
        pdf_bytes: Vec<u8>,
        job_description: &str,
        credential: &Credential,
    ) -> Result<ProcessedResume, PipelineError> {
        require_job_description(job_description)?;

        let pages = self.renderer.render(pdf_bytes).await.map_err(log_failure)?;
        info!("Rendered {} pages", pages.len());

        let state = self
            .extract_and_save(&pages, job_description, credential)
            .await?;
        Ok(ProcessedResume { pages, state })
    }

    /// Extract already-rendered pages and persist the batch.
    pub async fn extract_and_save(
        &self,
        pages: &[PageImage],
        job_description: &str,
        credential: &Credential,
    ) -> Result<IntermediateState, PipelineError> {
        require_job_description(job_description)?;
        if pages.is_empty() {
            return Err(PipelineError::InvalidInput {
                detail: "there are no pages to extract".to_string(),
            });
        }

        let result = async {
            let prompt = self.prompts.load(PromptTemplate::Extraction).await?;
            let batch = ExtractionStage::new(Arc::clone(&self.model), &self.config)
                .with_progress(Arc::clone(&self.progress))
                .extract(pages, &prompt, credential)
                .await?;
            self.store.save(&batch, job_description).await
        }
        .await;
        result.map_err(log_failure)
    }

    /// The latest batch as pretty-printed JSON.
    pub async fn view_extracted_data(&self) -> Result<String, PipelineError> {
        let state = self.store.load().await.map_err(log_failure)?;
        pretty_batch(&state.batch)
    }

    /// Produce one artifact from the latest persisted state.
    ///
    /// Fails with [`PipelineError::NoState`] or [`PipelineError::PromptLoad`]
    /// before any model call is made.
    pub async fn generate_artifact(
        &self,
        kind: StageKind,
        credential: &Credential,
    ) -> Result<String, PipelineError> {
        let result = async {
            let state = self.store.load().await?;
            let template = self.prompts.load(kind.template()).await?;
            GenerationStage::new(Arc::clone(&self.model), &self.config)
                .generate(kind, &state, &template, credential)
                .await
        }
        .await;
        result.map_err(log_failure)
    }
}
