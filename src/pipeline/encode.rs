//! Image encoding: `DynamicImage` → base64 PNG for the multimodal request.
//!
//! PNG is lossless; JPEG artefacts around small résumé fonts make the vision
//! model misread contact details and dates.

use crate::model::EncodedImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// PNG-encode a page into raw bytes.
pub fn png_bytes(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Encode a rasterised page as a base64 PNG ready for the model.
pub fn encode_page(img: &DynamicImage) -> Result<EncodedImage, image::ImageError> {
    let buf = png_bytes(img)?;
    let b64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", b64.len());

    Ok(EncodedImage {
        mime_type: "image/png".to_string(),
        data_base64: b64,
    })
}
