//! Per-page extraction: one multimodal request per page image.
//!
//! Pages are sent with the same fixed extraction prompt. With concurrency 1
//! (the default) requests go out strictly one after another; above 1 they
//! run through `buffer_unordered` and results are put back by page position,
//! never by arrival order.
//!
//! The batch is all-or-nothing. The first page that fails after its retries
//! aborts the stage, outstanding requests are dropped, and the caller gets
//! [`PipelineError::Extraction`] naming that page.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::model::{Credential, GenerativeModel};
use crate::pipeline::llm::{self, RetryPolicy};
use crate::pipeline::{encode, postprocess};
use crate::progress::{NoopProgress, ProgressHandle};
use crate::types::{ExtractionBatch, PageImage};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Turns page images into an [`ExtractionBatch`].
pub struct ExtractionStage {
    model: Arc<dyn GenerativeModel>,
    policy: RetryPolicy,
    concurrency: usize,
    strip_code_fences: bool,
    progress: ProgressHandle,
}

impl ExtractionStage {
    pub fn new(model: Arc<dyn GenerativeModel>, config: &PipelineConfig) -> Self {
        Self {
            model,
            policy: RetryPolicy::from(config),
            concurrency: config.extraction_concurrency.max(1),
            strip_code_fences: config.strip_code_fences,
            progress: Arc::new(NoopProgress),
        }
    }

    pub fn with_progress(mut self, progress: ProgressHandle) -> Self {
        self.progress = progress;
        self
    }

    /// Extract one record per page, in page order.
    pub async fn extract(
        &self,
        pages: &[PageImage],
        extraction_prompt: &str,
        credential: &Credential,
    ) -> Result<ExtractionBatch, PipelineError> {
        let start = Instant::now();
        let total = pages.len();
        self.progress.on_extraction_start(total);

        let mut records: Vec<(usize, String)> = stream::iter(pages.iter().enumerate())
            .map(|(pos, page)| self.extract_page(pos, page, total, extraction_prompt, credential))
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        records.sort_by_key(|(pos, _)| *pos);
        let batch = ExtractionBatch::new(records.into_iter().map(|(_, text)| text).collect());

        self.progress.on_extraction_complete(total);
        info!(
            "Extracted {} pages with {} in {}ms",
            batch.len(),
            self.model.name(),
            start.elapsed().as_millis()
        );
        Ok(batch)
    }

    async fn extract_page(
        &self,
        pos: usize,
        page: &PageImage,
        total: usize,
        prompt: &str,
        credential: &Credential,
    ) -> Result<(usize, String), PipelineError> {
        let page_num = page.page_num();
        self.progress.on_page_start(page_num, total);

        let image = encode::encode_page(&page.image).map_err(|e| {
            PipelineError::Internal(format!("Page {page_num}: image encoding failed: {e}"))
        })?;

        let label = format!("Page {page_num}");
        let model = &self.model;
        let image = &image;
        let result = llm::call_with_retry(&self.policy, &label, move || {
            model.generate_from_image(prompt, image, credential)
        })
        .await;

        match result {
            Ok(text) => {
                let record = if self.strip_code_fences {
                    postprocess::clean_record(&text)
                } else {
                    text
                };
                debug!("{}: {} chars extracted", label, record.len());
                self.progress.on_page_complete(page_num, total, record.len());
                Ok((pos, record))
            }
            Err(source) => {
                self.progress.on_page_error(page_num, total, &source.to_string());
                Err(PipelineError::Extraction {
                    page: page_num,
                    source,
                })
            }
        }
    }
}
