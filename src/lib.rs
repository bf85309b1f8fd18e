//! # resume-insight
//!
//! Turn a résumé PDF and a job description into structured résumé data,
//! interview questions, a skill-gap analysis and a cover letter.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF + job description
//!  │
//!  ├─ 1. Render    rasterise every page via pdfium (spawn_blocking)
//!  ├─ 2. Extract   one vision call per page → ordered per-page records
//!  ├─ 3. Persist   batch + job description, swapped in atomically
//!  │
//!  └─ later, on demand, from the persisted state:
//!     ├─ interview questions
//!     ├─ skill-gap analysis
//!     └─ cover letter
//! ```
//!
//! Extraction runs once per résumé. The three generation stages only read the
//! persisted state, so each can be re-run (or run from another process) without
//! paying for extraction again.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use resume_insight::{Credential, GeminiModel, Pipeline, PipelineConfig, StageKind};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::default();
//!     let model = GeminiModel::new(&config.vision_model, &config.text_model, (&config).into())?;
//!     let pipeline = Pipeline::new(config, Arc::new(model));
//!     let credential = Credential::api_key(std::env::var("GOOGLE_API_KEY")?)?;
//!
//!     let pdf = std::fs::read("cv.pdf")?;
//!     pipeline.process_resume(pdf, "Senior backend engineer", &credential).await?;
//!
//!     let letter = pipeline.generate_artifact(StageKind::CoverLetter, &credential).await?;
//!     println!("{letter}");
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `resume-insight` binary (clap + anyhow + tracing-subscriber + dotenvy) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! resume-insight = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod store;
pub mod types;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use error::{ModelError, PipelineError};
pub use model::{Credential, EncodedImage, GeminiModel, GenerationOptions, GenerativeModel, ProviderModel};
pub use orchestrator::{display_outcome, Pipeline, NO_STATE_MESSAGE};
pub use progress::{ExtractionProgress, NoopProgress, ProgressHandle};
pub use prompts::{PromptStore, PromptTemplate};
pub use store::IntermediateStore;
pub use types::{ExtractionBatch, IntermediateState, PageImage, ProcessedResume, StageKind};
