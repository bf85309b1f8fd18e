//! Progress events emitted while pages are extracted.
//!
//! Inject an [`Arc<dyn ExtractionProgress>`] through
//! [`crate::Pipeline::with_progress`] to drive a progress bar, a log line per
//! page, or a push channel to a browser session. The trait is `Send + Sync`
//! because pages may be extracted concurrently.
//!
//! # Example
//!
//! ```rust
//! use resume_insight::ExtractionProgress;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct Counter(AtomicUsize);
//!
//! impl ExtractionProgress for Counter {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, record_len: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("page {page_num}/{total_pages}: {record_len} chars");
//!     }
//! }
//! ```

use std::sync::Arc;

/// Called by the extraction stage as it processes each page.
///
/// All methods default to no-ops. When extraction concurrency is above 1,
/// page events may arrive out of order and from different threads.
pub trait ExtractionProgress: Send + Sync {
    /// Called once, before the first model request.
    fn on_extraction_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before the model request for a page (1-indexed).
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page produced its record.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, record_len: usize) {
        let _ = (page_num, total_pages, record_len);
    }

    /// Called when a page failed after retries; the batch is abandoned.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once when every page succeeded.
    fn on_extraction_complete(&self, total_pages: usize) {
        let _ = total_pages;
    }
}

/// Progress sink that ignores every event.
pub struct NoopProgress;

impl ExtractionProgress for NoopProgress {}

/// Shared handle stored by the pipeline.
pub type ProgressHandle = Arc<dyn ExtractionProgress>;
