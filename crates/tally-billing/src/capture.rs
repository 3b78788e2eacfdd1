//! # Image Capture
//!
//! An encoded label photo, however it reached the counter: a file on disk,
//! bytes from a camera, or a browser `data:` URI from an upload widget.
//!
//! ```text
//!   file path ──┐
//!   raw bytes ──┼──► ImagePayload { bytes, mime, label } ──► to_base64() ──► OCR
//!   data: URI ──┘                                            (no prefix)
//! ```

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::debug;

use crate::error::{BillingError, BillingResult};

const DEFAULT_MIME: &str = "application/octet-stream";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    bytes: Vec<u8>,
    mime: String,
    label: String,
}

impl ImagePayload {
    /// Wraps raw bytes. `label` names the image in logs and batch summaries.
    pub fn from_bytes(bytes: Vec<u8>, label: impl Into<String>) -> BillingResult<Self> {
        let label = label.into();
        if bytes.is_empty() {
            return Err(BillingError::Capture(format!("{} is empty", label)));
        }
        let mime = sniff_mime(&bytes).unwrap_or(DEFAULT_MIME).to_string();
        Ok(ImagePayload { bytes, mime, label })
    }

    /// Reads an image file. The MIME type comes from the extension, falling
    /// back to the file's magic bytes.
    pub async fn from_path(path: impl AsRef<Path>) -> BillingResult<Self> {
        let path = path.as_ref();
        let label = path.display().to_string();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| BillingError::Capture(format!("{}: {}", label, e)))?;

        let mut payload = Self::from_bytes(bytes, label)?;
        if let Some(mime) = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(mime_for_extension)
        {
            payload.mime = mime.to_string();
        }

        debug!(image = %payload.label, size = payload.bytes.len(), mime = %payload.mime, "Image loaded");
        Ok(payload)
    }

    /// Parses `data:<mime>;base64,<data>`.
    pub fn from_data_uri(uri: &str, label: impl Into<String>) -> BillingResult<Self> {
        let label = label.into();
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| BillingError::Capture(format!("{} is not a data URI", label)))?;
        let (header, data) = rest
            .split_once(',')
            .ok_or_else(|| BillingError::Capture(format!("{} has no data section", label)))?;
        let mime = header
            .strip_suffix(";base64")
            .ok_or_else(|| BillingError::Capture(format!("{} is not base64 encoded", label)))?;

        let bytes = STANDARD
            .decode(data.trim())
            .map_err(|e| BillingError::Capture(format!("{}: {}", label, e)))?;

        let mut payload = Self::from_bytes(bytes, label)?;
        if !mime.is_empty() {
            payload.mime = mime.to_string();
        }
        Ok(payload)
    }

    /// Standard base64 of the image, without any `data:` prefix.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some("image/png")
    } else if bytes.starts_with(b"GIF8") {
        Some("image/gif")
    } else if bytes.starts_with(b"BM") {
        Some("image/bmp")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}
