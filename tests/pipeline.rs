//! Pipeline integration tests against a scripted model.
//!
//! No network and no pdfium: pages are synthesised in memory and handed to
//! `extract_and_save`, and the model answers from a script while counting
//! its calls.

use async_trait::async_trait;
use base64::Engine as _;
use image::{DynamicImage, Rgba, RgbaImage};
use resume_insight::{
    display_outcome, Credential, EncodedImage, ExtractionBatch, GeminiModel, GenerativeModel,
    IntermediateStore, ModelError, PageImage, Pipeline, PipelineConfig, PipelineError,
    PromptStore, PromptTemplate, StageKind, NO_STATE_MESSAGE,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use tracing_subscriber::EnvFilter;

// ── Scripted model ───────────────────────────────────────────────────────────

/// Each synthetic page is `n` pixels wide for page `n`, so the model can
/// answer with the page number it was shown.
struct ScriptedModel {
    image_calls: AtomicUsize,
    text_calls: AtomicUsize,
    fail_page: Option<u32>,
    rate_limit_first_call: bool,
    jitter: bool,
    last_text_prompt: Mutex<Option<String>>,
}

impl ScriptedModel {
    fn new() -> Self {
        Self {
            image_calls: AtomicUsize::new(0),
            text_calls: AtomicUsize::new(0),
            fail_page: None,
            rate_limit_first_call: false,
            jitter: false,
            last_text_prompt: Mutex::new(None),
        }
    }

    fn failing_on(page: u32) -> Self {
        Self {
            fail_page: Some(page),
            ..Self::new()
        }
    }

    fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }

    fn text_calls(&self) -> usize {
        self.text_calls.load(Ordering::SeqCst)
    }

    fn last_text_prompt(&self) -> String {
        self.last_text_prompt.lock().unwrap().clone().unwrap_or_default()
    }
}

fn page_of(image: &EncodedImage) -> u32 {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(&image.data_base64)
        .unwrap();
    image::load_from_memory(&bytes).unwrap().width()
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    fn name(&self) -> String {
        "scripted".into()
    }

    async fn generate_from_image(
        &self,
        prompt: &str,
        image: &EncodedImage,
        _credential: &Credential,
    ) -> Result<String, ModelError> {
        assert!(!prompt.is_empty());
        let call = self.image_calls.fetch_add(1, Ordering::SeqCst);
        if self.rate_limit_first_call && call == 0 {
            return Err(ModelError::RateLimited {
                retry_after_secs: None,
            });
        }

        let page = page_of(image);
        if self.jitter {
            let ms = (page as u64 * 37) % 13;
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        if Some(page) == self.fail_page {
            return Err(ModelError::Api {
                status: 400,
                message: format!("page {page} rejected"),
            });
        }
        Ok(format!("{{\"page\":{page}}}"))
    }

    async fn generate_from_text(
        &self,
        prompt: &str,
        _credential: &Credential,
    ) -> Result<String, ModelError> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_text_prompt.lock().unwrap() = Some(prompt.to_string());
        Ok("generated artifact".to_string())
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn pages(n: u32) -> Vec<PageImage> {
    (1..=n)
        .map(|w| {
            let img = RgbaImage::from_pixel(w, 2, Rgba([255, 255, 255, 255]));
            PageImage::new(w as usize - 1, DynamicImage::ImageRgba8(img))
        })
        .collect()
}

fn config(root: &Path, concurrency: usize) -> PipelineConfig {
    PipelineConfig::builder()
        .prompt_dir(root.join("prompts"))
        .state_dir(root.join("state"))
        .extraction_concurrency(concurrency)
        .retry_backoff_ms(1)
        .build()
        .unwrap()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn pipeline_with(root: &Path, model: Arc<ScriptedModel>, concurrency: usize) -> Pipeline {
    init_tracing();
    let config = config(root, concurrency);
    PromptStore::new(&config.prompt_dir)
        .write_defaults(false)
        .await
        .unwrap();
    Pipeline::new(config, model)
}

fn key() -> Credential {
    Credential::api_key("test-key").unwrap()
}

fn expected_records(n: u32) -> Vec<String> {
    (1..=n).map(|p| format!("{{\"page\":{p}}}")).collect()
}

// ── Extraction and persistence ───────────────────────────────────────────────

#[tokio::test]
async fn extraction_persists_one_record_per_page_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let model = Arc::new(ScriptedModel::new());
    let pipeline = pipeline_with(dir.path(), model.clone(), 1).await;

    let state = assert_ok!(
        pipeline
            .extract_and_save(&pages(3), "Backend engineer", &key())
            .await
    );

    assert_eq!(state.batch.records(), expected_records(3).as_slice());
    assert_eq!(model.image_calls(), 3);
    assert_eq!(pipeline.store().load().await.unwrap(), state);
}

#[tokio::test]
async fn concurrent_extraction_with_jitter_keeps_page_order() {
    let dir = tempfile::tempdir().unwrap();
    let model = Arc::new(ScriptedModel {
        jitter: true,
        ..ScriptedModel::new()
    });
    let pipeline = pipeline_with(dir.path(), model.clone(), 4).await;

    let state = pipeline
        .extract_and_save(&pages(9), "SRE", &key())
        .await
        .unwrap();

    assert_eq!(state.batch.len(), 9);
    assert_eq!(state.batch.records(), expected_records(9).as_slice());
}

#[tokio::test]
async fn failure_on_page_two_of_three_persists_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let model = Arc::new(ScriptedModel::failing_on(2));
    let pipeline = pipeline_with(dir.path(), model.clone(), 1).await;

    let err = assert_err!(
        pipeline
            .extract_and_save(&pages(3), "Backend engineer", &key())
            .await
    );

    assert!(matches!(err, PipelineError::Extraction { page: 2, .. }), "got {err:?}");
    assert_eq!(model.image_calls(), 2);
    assert!(matches!(
        pipeline.store().load().await,
        Err(PipelineError::NoState)
    ));
}

#[tokio::test]
async fn failed_run_leaves_previous_state_current() {
    let dir = tempfile::tempdir().unwrap();
    let good = pipeline_with(dir.path(), Arc::new(ScriptedModel::new()), 1).await;
    let previous = good
        .extract_and_save(&pages(1), "First role", &key())
        .await
        .unwrap();

    let bad = pipeline_with(dir.path(), Arc::new(ScriptedModel::failing_on(2)), 1).await;
    assert!(bad
        .extract_and_save(&pages(3), "Second role", &key())
        .await
        .is_err());

    assert_eq!(bad.store().load().await.unwrap(), previous);
}

#[tokio::test]
async fn transient_page_error_is_retried() {
    let dir = tempfile::tempdir().unwrap();
    let model = Arc::new(ScriptedModel {
        rate_limit_first_call: true,
        ..ScriptedModel::new()
    });
    let pipeline = pipeline_with(dir.path(), model.clone(), 1).await;

    let state = pipeline
        .extract_and_save(&pages(2), "jd", &key())
        .await
        .unwrap();

    assert_eq!(state.batch.records(), expected_records(2).as_slice());
    assert_eq!(model.image_calls(), 3);
}

#[tokio::test]
async fn blank_job_description_is_rejected_before_any_call() {
    let dir = tempfile::tempdir().unwrap();
    let model = Arc::new(ScriptedModel::new());
    let pipeline = pipeline_with(dir.path(), model.clone(), 1).await;

    let err = pipeline
        .extract_and_save(&pages(1), "   ", &key())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidInput { .. }));
    assert_eq!(model.image_calls(), 0);
}

#[tokio::test]
async fn non_pdf_input_fails_without_model_calls() {
    let dir = tempfile::tempdir().unwrap();
    let model = Arc::new(ScriptedModel::new());
    let pipeline = pipeline_with(dir.path(), model.clone(), 1).await;

    let err = pipeline
        .process_resume(b"just some text".to_vec(), "Backend engineer", &key())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::DocumentFormat { .. }));
    assert!(err.is_user_error());
    assert_eq!(model.image_calls(), 0);
}

#[tokio::test]
async fn gemini_without_key_fails_extraction_on_first_page() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), 1);
    PromptStore::new(&config.prompt_dir)
        .write_defaults(false)
        .await
        .unwrap();
    let model = GeminiModel::new("vision", "text", (&config).into()).unwrap();
    let pipeline = Pipeline::new(config, Arc::new(model));

    let err = pipeline
        .extract_and_save(&pages(2), "jd", &Credential::provider_managed())
        .await
        .unwrap_err();

    match err {
        PipelineError::Extraction { page, source } => {
            assert_eq!(page, 1);
            assert!(matches!(source, ModelError::MissingCredential));
        }
        other => panic!("expected Extraction, got {other:?}"),
    }
}

// ── Viewing and generation ───────────────────────────────────────────────────

#[tokio::test]
async fn jane_scenario_round_trips_and_displays() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_with(dir.path(), Arc::new(ScriptedModel::new()), 1).await;

    let batch = ExtractionBatch::new(vec!["{\"name\":\"Jane\"}".to_string()]);
    pipeline
        .store()
        .save(&batch, "Backend engineer")
        .await
        .unwrap();

    let state = pipeline.store().load().await.unwrap();
    assert_eq!(state.batch, batch);
    assert_eq!(state.job_description, "Backend engineer");

    let shown = pipeline.view_extracted_data().await.unwrap();
    assert_eq!(shown, "[\n    \"{\\\"name\\\":\\\"Jane\\\"}\"\n]");
}

#[tokio::test]
async fn state_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let first = pipeline_with(dir.path(), Arc::new(ScriptedModel::new()), 1).await;
    let saved = first
        .extract_and_save(&pages(2), "Data engineer", &key())
        .await
        .unwrap();
    drop(first);

    let model = Arc::new(ScriptedModel::new());
    let second = pipeline_with(dir.path(), model.clone(), 1).await;
    assert_eq!(second.store().load().await.unwrap(), saved);

    let out = second
        .generate_artifact(StageKind::CoverLetter, &key())
        .await
        .unwrap();
    assert_eq!(out, "generated artifact");
    assert_eq!(model.image_calls(), 0);
}

#[tokio::test]
async fn generation_without_state_is_no_state_and_makes_no_call() {
    let dir = tempfile::tempdir().unwrap();
    let model = Arc::new(ScriptedModel::new());
    let pipeline = pipeline_with(dir.path(), model.clone(), 1).await;

    for kind in StageKind::ALL {
        let result = pipeline.generate_artifact(kind, &key()).await;
        assert!(matches!(result, Err(PipelineError::NoState)), "{kind}");
        assert_eq!(display_outcome(result), NO_STATE_MESSAGE);
    }
    assert_eq!(model.text_calls(), 0);
    assert!(matches!(
        pipeline.view_extracted_data().await,
        Err(PipelineError::NoState)
    ));
}

#[tokio::test]
async fn each_generation_makes_exactly_one_call() {
    let dir = tempfile::tempdir().unwrap();
    let model = Arc::new(ScriptedModel::new());
    let pipeline = pipeline_with(dir.path(), model.clone(), 1).await;
    pipeline
        .extract_and_save(&pages(2), "Backend engineer", &key())
        .await
        .unwrap();

    for (i, kind) in StageKind::ALL.into_iter().enumerate() {
        pipeline.generate_artifact(kind, &key()).await.unwrap();
        assert_eq!(model.text_calls(), i + 1, "{kind}");
    }
}

#[tokio::test]
async fn skill_gap_prompt_carries_job_description_and_batch_json() {
    let dir = tempfile::tempdir().unwrap();
    let model = Arc::new(ScriptedModel::new());
    let pipeline = pipeline_with(dir.path(), model.clone(), 1).await;
    let state = pipeline
        .extract_and_save(&pages(2), "Backend engineer", &key())
        .await
        .unwrap();

    pipeline
        .generate_artifact(StageKind::SkillGap, &key())
        .await
        .unwrap();

    let prompt = model.last_text_prompt();
    assert!(prompt.contains("Backend engineer"));
    assert!(prompt.contains(&state.batch.to_json()));
    assert!(!prompt.contains("{{"));
}

#[tokio::test]
async fn interview_prompt_appends_records_to_template() {
    let dir = tempfile::tempdir().unwrap();
    let model = Arc::new(ScriptedModel::new());
    let pipeline = pipeline_with(dir.path(), model.clone(), 1).await;
    pipeline
        .extract_and_save(&pages(2), "Backend engineer", &key())
        .await
        .unwrap();

    pipeline
        .generate_artifact(StageKind::InterviewQuestions, &key())
        .await
        .unwrap();

    let expected = format!(
        "{}{}",
        PromptTemplate::InterviewQuestions.default_text(),
        "{\"page\":1} {\"page\":2}"
    );
    assert_eq!(model.last_text_prompt(), expected);
}

#[tokio::test]
async fn missing_template_fails_before_the_model_is_called() {
    let dir = tempfile::tempdir().unwrap();
    let model = Arc::new(ScriptedModel::new());
    let pipeline = pipeline_with(dir.path(), model.clone(), 1).await;
    pipeline
        .extract_and_save(&pages(1), "Backend engineer", &key())
        .await
        .unwrap();

    std::fs::remove_file(
        pipeline
            .prompts()
            .path_of(PromptTemplate::CoverLetter),
    )
    .unwrap();

    let result = pipeline
        .generate_artifact(StageKind::CoverLetter, &key())
        .await;
    assert!(matches!(result, Err(PipelineError::PromptLoad { .. })));
    assert_eq!(model.text_calls(), 0);
    assert!(display_outcome(result).starts_with("An error occurred: Error loading prompt"));
}

// ── Sessions ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sessions_do_not_see_each_other() {
    let dir = tempfile::tempdir().unwrap();
    let alice = pipeline_with(dir.path(), Arc::new(ScriptedModel::new()), 1)
        .await
        .with_session("alice")
        .unwrap();
    let bob = pipeline_with(dir.path(), Arc::new(ScriptedModel::new()), 1)
        .await
        .with_session("bob")
        .unwrap();

    alice
        .extract_and_save(&pages(1), "Alice's role", &key())
        .await
        .unwrap();

    assert!(matches!(
        bob.view_extracted_data().await,
        Err(PipelineError::NoState)
    ));
    let shared = IntermediateStore::new(dir.path().join("state"));
    assert!(matches!(shared.load().await, Err(PipelineError::NoState)));
}

#[tokio::test]
async fn invalid_session_id_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let result = pipeline_with(dir.path(), Arc::new(ScriptedModel::new()), 1)
        .await
        .with_session("../../etc");
    assert!(matches!(result, Err(PipelineError::InvalidInput { .. })));
}
