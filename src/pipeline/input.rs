//! Input resolution: load a résumé from a local path or an HTTP(S) URL.
//!
//! The renderer works on an in-memory byte stream, so both sources end up as
//! a `Vec<u8>`. The `%PDF-` header is checked here as well, so a wrong file
//! is reported against the name the user typed rather than as an anonymous
//! byte stream.

use crate::error::PipelineError;
use crate::pipeline::render::check_pdf_magic;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Read the PDF named by `input` into memory.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<Vec<u8>, PipelineError> {
    let bytes = if is_url(input) {
        download_url(input, timeout_secs).await?
    } else {
        read_local(input).await?
    };

    check_pdf_magic(&bytes).map_err(|e| match e {
        PipelineError::DocumentFormat { detail } => PipelineError::DocumentFormat {
            detail: format!("'{}': {}", input, detail),
        },
        other => other,
    })?;
    Ok(bytes)
}

async fn read_local(path_str: &str) -> Result<Vec<u8>, PipelineError> {
    let path = PathBuf::from(path_str);
    let bytes = tokio::fs::read(&path).await.map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            PipelineError::FileNotFound { path: path.clone() }
        } else {
            PipelineError::Storage {
                path: path.clone(),
                source,
            }
        }
    })?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(bytes)
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, PipelineError> {
    info!("Downloading résumé from: {}", url);
    let failed = |reason: String| PipelineError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            failed(format!("timed out after {}s", timeout_secs))
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
    info!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}
