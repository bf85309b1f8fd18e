//! Error types for the resume-insight library.
//!
//! Two error types reflect two layers of failure:
//!
//! * [`ModelError`] — a single call to the external generation service
//!   failed (auth, rate limit, timeout, network, malformed response). It
//!   knows whether the failure is transient, which drives retries.
//!
//! * [`PipelineError`] — an operation of the pipeline could not complete
//!   (bad PDF, no persisted state, missing prompt template, a page that
//!   could not be extracted). Every public operation returns it.
//!
//! Nothing here is flattened to a string. The outermost caller decides how
//! to present a failure; see [`crate::orchestrator::display_outcome`].

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Document errors ───────────────────────────────────────────────────
    /// The byte stream is not a PDF, or pdfium could not open or render it.
    #[error("Document is not a readable PDF: {detail}")]
    DocumentFormat { detail: String },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The vision model failed on one page; the whole batch is discarded.
    #[error("Extraction failed on page {page}: {source}")]
    Extraction {
        page: usize,
        #[source]
        source: ModelError,
    },

    // ── State errors ──────────────────────────────────────────────────────
    /// Generation was requested before any extraction run completed.
    #[error("No extracted résumé data is available yet; process a résumé first")]
    NoState,

    /// A persisted run exists but its files cannot be decoded.
    #[error("Persisted state at '{path}' is corrupt: {detail}")]
    StateCorrupt { path: PathBuf, detail: String },

    /// Reading or writing a file on disk failed.
    #[error("Storage error at '{path}': {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Prompt errors ─────────────────────────────────────────────────────
    /// A prompt template file is missing or unreadable.
    #[error("Error loading prompt '{name}' from '{path}': {source}")]
    PromptLoad {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A prompt template references a placeholder that is not provided.
    #[error("Invalid prompt template '{name}': {detail}")]
    Template { name: String, detail: String },

    // ── Model errors ──────────────────────────────────────────────────────
    /// The text-generation call of a generation stage failed.
    #[error("Model invocation failed: {0}")]
    ModelInvocation(#[from] ModelError),

    // ── Input errors ──────────────────────────────────────────────────────
    /// Caller-supplied input was rejected before any work started.
    #[error("Invalid input: {detail}")]
    InvalidInput { detail: String },

    /// Local résumé file does not exist.
    #[error("Résumé file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH to the directory containing libpdfium, or install it system-wide."
    )]
    PdfiumBinding(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// True when the failure stems from what the user supplied or did, as
    /// opposed to infrastructure (storage, pdfium, network, provider outage).
    ///
    /// User errors are surfaced as-is; infrastructure errors are also logged.
    pub fn is_user_error(&self) -> bool {
        match self {
            PipelineError::DocumentFormat { .. }
            | PipelineError::NoState
            | PipelineError::InvalidInput { .. }
            | PipelineError::FileNotFound { .. }
            | PipelineError::Template { .. }
            | PipelineError::PromptLoad { .. } => true,
            PipelineError::Extraction { source, .. } => source.is_credential_problem(),
            PipelineError::ModelInvocation(e) => e.is_credential_problem(),
            PipelineError::StateCorrupt { .. }
            | PipelineError::Storage { .. }
            | PipelineError::DownloadFailed { .. }
            | PipelineError::InvalidConfig(_)
            | PipelineError::PdfiumBinding(_)
            | PipelineError::Internal(_) => false,
        }
    }
}

/// A failed call to the external generation service.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// No API key was supplied for the call.
    #[error("No API credential supplied")]
    MissingCredential,

    /// The provider rejected the credential (401/403).
    #[error("Authentication rejected by provider: {detail}")]
    Auth { detail: String },

    /// HTTP 429; the caller should back off.
    #[error("Rate limit exceeded")]
    RateLimited { retry_after_secs: Option<u64> },

    /// The call did not finish within the configured timeout.
    #[error("Model call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Connection, DNS or TLS failure before a response was received.
    #[error("Network error: {0}")]
    Network(String),

    /// The provider answered with a non-success status.
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The provider answered but produced no text.
    #[error("Model returned no text")]
    EmptyResponse,

    /// Any other error surfaced by an `edgequake_llm` provider.
    #[error("Provider error: {0}")]
    Provider(String),
}

impl ModelError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ModelError::RateLimited { .. } | ModelError::Timeout { .. } | ModelError::Network(_) => {
                true
            }
            ModelError::Api { status, .. } => *status >= 500,
            ModelError::MissingCredential
            | ModelError::Auth { .. }
            | ModelError::EmptyResponse
            | ModelError::Provider(_) => false,
        }
    }

    fn is_credential_problem(&self) -> bool {
        matches!(self, ModelError::MissingCredential | ModelError::Auth { .. })
    }
}
