//! Pipeline stages for résumé analysis.
//!
//! Each submodule implements one step.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ extract ──▶ (store) ──▶ generate
//! (URL/path) (pdfium)  (base64)   (vision)                 (text)
//! ```
//!
//! 1. [`input`]   load the résumé from a path or URL into memory
//! 2. [`render`]  rasterise every page; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 3. [`encode`]  PNG-encode and base64-wrap each page for the request body
//! 4. [`extract`] one vision call per page, with [`llm`] retry and timeout;
//!    [`postprocess`] optionally strips wrapping code fences
//! 5. [`generate`] compose a stage prompt from the persisted state and make
//!    one text call

pub mod encode;
pub mod extract;
pub mod generate;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod render;
