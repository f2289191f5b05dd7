//! Image attachments encoded as data URLs for JSON upload.

use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::Path;

pub const MAX_IMAGE_BYTES: usize = 2 * 1024 * 1024;

/// Encode raw image bytes as `data:<mime>;base64,...`.
///
/// Only the MIME prefix is checked, not the file contents.
pub fn encode_image(data: &[u8], mime_type: &str) -> Result<String> {
    if !mime_type.starts_with("image/") {
        return Err(Error::UnsupportedFileType(mime_type.to_string()));
    }
    if data.len() > MAX_IMAGE_BYTES {
        return Err(Error::FileTooLarge {
            size: data.len(),
            limit: MAX_IMAGE_BYTES,
        });
    }

    Ok(format!("data:{};base64,{}", mime_type, STANDARD.encode(data)))
}

pub fn encode_image_file(path: &Path) -> Result<String> {
    let mime_type = mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream");

    // Check the size before reading the whole file in.
    let size = std::fs::metadata(path)?.len() as usize;
    if size > MAX_IMAGE_BYTES {
        return Err(Error::FileTooLarge {
            size,
            limit: MAX_IMAGE_BYTES,
        });
    }

    let data = std::fs::read(path)?;
    encode_image(&data, mime_type)
}
