//! Configuration for the résumé pipeline.
//!
//! Every knob lives in [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]. The same config drives rendering, extraction,
//! persistence and generation, so two runs with equal configs behave the
//! same way.

use crate::error::PipelineError;
use std::path::PathBuf;

/// Rasterisation at 72 DPI reproduces the page at its intrinsic size
/// (one PDF point per pixel).
pub const INTRINSIC_DPI: u32 = 72;

/// Configuration for the résumé pipeline.
///
/// # Example
/// ```rust
/// use resume_insight::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .dpi(144)
///     .extraction_concurrency(2)
///     .state_dir("/tmp/resume-state")
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 144);
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory holding the four prompt template files. Default: `prompts`.
    pub prompt_dir: PathBuf,

    /// Root of the persisted intermediate state. Default: `.resume-insight`.
    pub state_dir: PathBuf,

    /// Rendering DPI. Range: 36–400. Default: 72 (intrinsic page size).
    pub dpi: u32,

    /// Cap on the longest edge of a rendered page, in pixels. Default: 2000.
    ///
    /// Applied after DPI scaling so an oversized page never exhausts memory.
    pub max_rendered_pixels: u32,

    /// Directory containing the pdfium shared library. If None, the system
    /// library search path is used.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Pages extracted concurrently. Default: 1 (sequential).
    pub extraction_concurrency: usize,

    /// Retry attempts per page on a transient model error. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds; doubles per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per model call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Sampling temperature. Default: 0.2.
    pub temperature: f32,

    /// Maximum output tokens per model call. Default: 4096.
    pub max_output_tokens: usize,

    /// Model used for per-page extraction. Default: `gemini-2.0-flash`.
    pub vision_model: String,

    /// Model used by the generation stages. Default: `gemini-2.0-flash`.
    pub text_model: String,

    /// Strip a wrapping ```` ```json ```` fence from extraction records.
    /// Default: false (records are stored exactly as returned).
    pub strip_code_fences: bool,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            prompt_dir: PathBuf::from("prompts"),
            state_dir: PathBuf::from(".resume-insight"),
            dpi: INTRINSIC_DPI,
            max_rendered_pixels: 2000,
            pdfium_lib_path: None,
            extraction_concurrency: 1,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            temperature: 0.2,
            max_output_tokens: 4096,
            vision_model: "gemini-2.0-flash".to_string(),
            text_model: "gemini-2.0-flash".to_string(),
            strip_code_fences: false,
            download_timeout_secs: 120,
        }
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.prompt_dir = dir.into();
        self
    }

    pub fn state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.state_dir = dir.into();
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn extraction_concurrency(mut self, n: usize) -> Self {
        self.config.extraction_concurrency = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_output_tokens(mut self, n: usize) -> Self {
        self.config.max_output_tokens = n;
        self
    }

    pub fn vision_model(mut self, model: impl Into<String>) -> Self {
        self.config.vision_model = model.into();
        self
    }

    pub fn text_model(mut self, model: impl Into<String>) -> Self {
        self.config.text_model = model.into();
        self
    }

    pub fn strip_code_fences(mut self, v: bool) -> Self {
        self.config.strip_code_fences = v;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        let c = &self.config;
        if !(36..=400).contains(&c.dpi) {
            return Err(PipelineError::InvalidConfig(format!(
                "DPI must be 36–400, got {}",
                c.dpi
            )));
        }
        if c.extraction_concurrency == 0 {
            return Err(PipelineError::InvalidConfig(
                "Extraction concurrency must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(PipelineError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.vision_model.trim().is_empty() || c.text_model.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "Model identifiers must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
