use base64::Engine;
use bytes::Bytes;
use tokio::task;
use tracing::{info, warn};

use crate::error::StudioError;
use crate::models::ImageData;

/// One file as received from a multipart field.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl Upload {
    #[cfg(test)]
    pub fn new(bytes: impl Into<Bytes>, content_type: Option<&str>) -> Self {
        Self { file_name: None, content_type: content_type.map(str::to_string), bytes: bytes.into() }
    }

    fn label(&self) -> &str {
        self.file_name.as_deref().unwrap_or("<unnamed>")
    }
}

/// Media type of the payload: the declared `image/*` type if any, otherwise
/// whatever the magic bytes say.
pub fn detect_mime_type(upload: &Upload) -> Option<String> {
    if let Some(declared) = upload.content_type.as_deref() {
        let declared = declared.split(';').next().unwrap_or_default().trim();
        if declared.starts_with("image/") {
            return Some(declared.to_ascii_lowercase());
        }
    }
    image::guess_format(&upload.bytes)
        .ok()
        .map(|format| format.to_mime_type().to_string())
}

pub fn encode(upload: &Upload) -> Result<ImageData, StudioError> {
    if upload.bytes.is_empty() {
        warn!("Upload {} is empty", upload.label());
        return Err(StudioError::unreadable_photo());
    }
    let mime_type = detect_mime_type(upload).ok_or_else(|| {
        warn!("Upload {} is not a recognisable image", upload.label());
        StudioError::unreadable_photo()
    })?;
    let data = base64::engine::general_purpose::STANDARD.encode(&upload.bytes);
    info!("📷 Encoded {} ({}, {} bytes)", upload.label(), mime_type, upload.bytes.len());
    Ok(ImageData { data, mime_type })
}

pub async fn encode_one(upload: Upload) -> Result<ImageData, StudioError> {
    task::spawn_blocking(move || encode(&upload))
        .await
        .map_err(|e| StudioError::ReadFailure(format!("Task join error: {}", e)))?
}

/// Encodes every upload on the blocking pool. Results come back in the
/// order the uploads were given, whichever finishes first.
pub async fn encode_all(uploads: Vec<Upload>) -> Result<Vec<ImageData>, StudioError> {
    let handles: Vec<_> = uploads
        .into_iter()
        .map(|upload| task::spawn_blocking(move || encode(&upload)))
        .collect();

    let mut images = Vec::with_capacity(handles.len());
    for handle in handles {
        let image = handle
            .await
            .map_err(|e| StudioError::ReadFailure(format!("Task join error: {}", e)))??;
        images.push(image);
    }
    Ok(images)
}


#[cfg(test)]
mod tests {
    use super::*;
    use super::fixtures::{JPEG_MAGIC, PNG_MAGIC};
    use pretty_assertions::assert_eq;

    #[test]
    fn declared_image_type_wins() {
        let upload = Upload::new(PNG_MAGIC, Some("image/webp"));
        assert_eq!(detect_mime_type(&upload).as_deref(), Some("image/webp"));
    }

    #[test]
    fn sniffs_when_declared_type_is_generic() {
        let upload = Upload::new(JPEG_MAGIC, Some("application/octet-stream"));
        assert_eq!(detect_mime_type(&upload).as_deref(), Some("image/jpeg"));
        let upload = Upload::new(PNG_MAGIC, None);
        assert_eq!(detect_mime_type(&upload).as_deref(), Some("image/png"));
    }

    #[test]
    fn encodes_payload_as_standard_base64() {
        let image = encode(&Upload::new(&b"abc"[..], Some("image/png"))).unwrap();
        assert_eq!(image, ImageData::new("YWJj", "image/png"));
    }

    #[test]
    fn empty_or_unknown_payload_is_a_read_failure() {
        assert_eq!(encode(&Upload::new(Bytes::new(), Some("image/png"))), Err(StudioError::unreadable_photo()));
        assert!(matches!(
            encode(&Upload::new(&b"plain text"[..], Some("text/plain"))),
            Err(StudioError::ReadFailure(_))
        ));
    }

    #[tokio::test]
    async fn encode_all_preserves_submission_order() {
        let uploads = vec![
            Upload::new(&b"first"[..], Some("image/png")),
            Upload::new(&b"second"[..], Some("image/jpeg")),
            Upload::new(&b"third"[..], Some("image/gif")),
        ];
        let images = encode_all(uploads).await.unwrap();
        let types: Vec<_> = images.iter().map(|i| i.mime_type.as_str()).collect();
        assert_eq!(types, vec!["image/png", "image/jpeg", "image/gif"]);
        assert_eq!(images[1].data, base64::engine::general_purpose::STANDARD.encode(b"second"));
    }

    #[tokio::test]
    async fn one_bad_file_fails_the_batch() {
        let uploads = vec![Upload::new(&b"ok"[..], Some("image/png")), Upload::new(Bytes::new(), None)];
        assert!(encode_all(uploads).await.is_err());
    }
}
