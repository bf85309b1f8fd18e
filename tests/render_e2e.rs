//! Rendering tests against a real pdfium library.
//!
//! Gated behind `E2E_ENABLED` so they do not run in CI unless requested.
//! `PDF_FIXTURE` names the PDF to render and `PDF_FIXTURE_PAGES` its page
//! count.
//!
//! Run with:
//!   E2E_ENABLED=1 PDF_FIXTURE=test_cases/cv.pdf PDF_FIXTURE_PAGES=2 \
//!   PDFIUM_LIB_PATH=. cargo test --test render_e2e -- --nocapture

use resume_insight::pipeline::render::DocumentRenderer;
use resume_insight::PipelineConfig;
use std::path::PathBuf;

/// Skip unless E2E_ENABLED is set and the fixture exists.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let Ok(path) = std::env::var("PDF_FIXTURE") else {
            println!("SKIP — set PDF_FIXTURE to a PDF file");
            return;
        };
        let p = PathBuf::from(path);
        if !p.exists() {
            println!("SKIP — fixture not found: {}", p.display());
            return;
        }
        p
    }};
}

fn config() -> PipelineConfig {
    let mut builder = PipelineConfig::builder();
    if let Ok(dir) = std::env::var("PDFIUM_LIB_PATH") {
        builder = builder.pdfium_lib_path(dir);
    }
    builder.build().unwrap()
}

#[tokio::test]
async fn renders_every_page_in_order() {
    let path = e2e_skip_unless_ready!();
    let bytes = std::fs::read(&path).unwrap();

    let pages = DocumentRenderer::new(&config()).render(bytes).await.unwrap();

    if let Ok(expected) = std::env::var("PDF_FIXTURE_PAGES") {
        assert_eq!(pages.len(), expected.parse::<usize>().unwrap());
    }
    assert!(!pages.is_empty());
    for (i, page) in pages.iter().enumerate() {
        assert_eq!(page.index, i);
        assert!(page.image.width() > 0 && page.image.height() > 0);
        assert!(page.image.width() <= 2000 && page.image.height() <= 2000);
    }
}

#[tokio::test]
async fn higher_dpi_renders_larger_pages() {
    let path = e2e_skip_unless_ready!();
    let bytes = std::fs::read(&path).unwrap();

    let base = DocumentRenderer::new(&config())
        .render(bytes.clone())
        .await
        .unwrap();

    let mut builder = PipelineConfig::builder().dpi(144);
    if let Ok(dir) = std::env::var("PDFIUM_LIB_PATH") {
        builder = builder.pdfium_lib_path(dir);
    }
    let doubled = DocumentRenderer::new(&builder.build().unwrap())
        .render(bytes)
        .await
        .unwrap();

    assert_eq!(base.len(), doubled.len());
    assert!(doubled[0].image.width() > base[0].image.width());
}

#[tokio::test]
async fn truncated_pdf_is_a_document_error() {
    let path = e2e_skip_unless_ready!();
    let bytes = std::fs::read(&path).unwrap();
    let truncated = bytes[..bytes.len().min(64)].to_vec();

    let err = DocumentRenderer::new(&config())
        .render(truncated)
        .await
        .unwrap_err();
    assert!(
        matches!(err, resume_insight::PipelineError::DocumentFormat { .. }),
        "got {err:?}"
    );
}
