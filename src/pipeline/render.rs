//! PDF rasterisation: render every page of an in-memory PDF via pdfium.
//!
//! pdfium is a blocking C++ library with thread-local state, so rendering
//! runs inside `tokio::task::spawn_blocking`. The `PdfDocument` is owned by
//! the blocking closure and dropped on every exit path, including when a
//! later page fails, before any error reaches the caller.

use crate::config::{PipelineConfig, INTRINSIC_DPI};
use crate::error::PipelineError;
use crate::types::PageImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

/// How far into the stream the `%PDF-` header may appear.
const MAGIC_SEARCH_WINDOW: usize = 1024;

/// Renders PDF byte streams to page images.
#[derive(Debug, Clone)]
pub struct DocumentRenderer {
    dpi: u32,
    max_rendered_pixels: u32,
    pdfium_lib_path: Option<PathBuf>,
}

impl DocumentRenderer {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            dpi: config.dpi,
            max_rendered_pixels: config.max_rendered_pixels,
            pdfium_lib_path: config.pdfium_lib_path.clone(),
        }
    }

    /// Render every page of `pdf_bytes`, in document order.
    ///
    /// Fails with [`PipelineError::DocumentFormat`] when the bytes are not a
    /// PDF, the document cannot be opened, it has no pages, or any page fails
    /// to rasterise. No partial list is ever returned.
    pub async fn render(&self, pdf_bytes: Vec<u8>) -> Result<Vec<PageImage>, PipelineError> {
        check_pdf_magic(&pdf_bytes)?;

        let renderer = self.clone();
        tokio::task::spawn_blocking(move || renderer.render_blocking(&pdf_bytes))
            .await
            .map_err(|e| PipelineError::Internal(format!("Render task panicked: {}", e)))?
    }

    fn bind(&self) -> Result<Pdfium, PipelineError> {
        let bindings = match &self.pdfium_lib_path {
            Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
                .or_else(|_| Pdfium::bind_to_system_library()),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| PipelineError::PdfiumBinding(format!("{:?}", e)))?;
        Ok(Pdfium::new(bindings))
    }

    fn render_config(&self) -> PdfRenderConfig {
        let max = self.max_rendered_pixels as i32;
        PdfRenderConfig::new()
            .scale_page_by_factor(self.dpi as f32 / INTRINSIC_DPI as f32)
            .set_maximum_width(max)
            .set_maximum_height(max)
    }

    fn render_blocking(&self, pdf_bytes: &[u8]) -> Result<Vec<PageImage>, PipelineError> {
        let pdfium = self.bind()?;

        let document = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, None)
            .map_err(|e| {
                let detail = format!("{:?}", e);
                if detail.to_ascii_lowercase().contains("password") {
                    PipelineError::DocumentFormat {
                        detail: "the PDF is password-protected".to_string(),
                    }
                } else {
                    PipelineError::DocumentFormat { detail }
                }
            })?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        if total_pages == 0 {
            return Err(PipelineError::DocumentFormat {
                detail: "the document has no pages".to_string(),
            });
        }
        info!("PDF loaded: {} pages", total_pages);

        let render_config = self.render_config();
        let mut results = Vec::with_capacity(total_pages);

        for (idx, page) in pages.iter().enumerate() {
            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                PipelineError::DocumentFormat {
                    detail: format!("page {} could not be rasterised: {:?}", idx + 1, e),
                }
            })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );
            results.push(PageImage::new(idx, image));
        }

        Ok(results)
    }
}

/// Reject streams that are empty or carry no `%PDF-` header.
pub fn check_pdf_magic(bytes: &[u8]) -> Result<(), PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::DocumentFormat {
            detail: "the byte stream is empty".to_string(),
        });
    }
    let window = &bytes[..bytes.len().min(MAGIC_SEARCH_WINDOW)];
    if window.windows(5).any(|w| w == b"%PDF-") {
        Ok(())
    } else {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        Err(PipelineError::DocumentFormat {
            detail: format!("missing %PDF header (first bytes: {:?})", magic),
        })
    }
}
