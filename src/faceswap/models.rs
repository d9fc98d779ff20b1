use serde::{Deserialize, Serialize};

use crate::faceswap::error::SwapError;

pub const MIN_IMAGE_BYTES: usize = 1024;
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

pub const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];
pub const PNG_MAGIC: [u8; 4] = [0x89, 0x50, 0x4E, 0x47];

/// Raw image bytes plus the content type they were declared with.
/// Immutable once constructed; validation happens against exactly these
/// bytes and this declared type.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    bytes: Vec<u8>,
    content_type: String,
}

impl ImagePayload {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// One-shot signed upload destination. Consumed immediately after
/// creation; the signed URL expires and is never persisted or reused.
#[derive(Debug, Clone)]
pub struct UploadTicket {
    pub upload_url: String,
    pub image_url: String,
    pub declared_size: i64,
}

/// Remote job status. Anything the service reports that we do not
/// recognize maps to `Unknown` and is treated as still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum JobStatus {
    Init,
    Active,
    Failed,
    Unknown,
}

impl From<String> for JobStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "init" => JobStatus::Init,
            "active" => JobStatus::Active,
            "failed" => JobStatus::Failed,
            _ => JobStatus::Unknown,
        }
    }
}

/// Success envelope shared by every JSON endpoint of the face-swap
/// service: `{statusCode: 2000, body: {...}}`.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiEnvelope<T> {
    #[serde(rename = "statusCode")]
    pub status_code: i64,
    #[serde(default)]
    pub body: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

pub const ENVELOPE_OK: i64 = 2000;

impl<T> ApiEnvelope<T> {
    pub fn into_body(self) -> Result<T, SwapError> {
        if self.status_code != ENVELOPE_OK {
            return Err(SwapError::InvalidResponse(format!(
                "statusCode {} ({})",
                self.status_code,
                self.message.unwrap_or_default()
            )));
        }
        self.body
            .ok_or_else(|| SwapError::InvalidResponse("missing body".to_string()))
    }
}

#[derive(Debug, Serialize)]
pub struct UploadUrlRequest {
    #[serde(rename = "uploadType")]
    pub upload_type: &'static str,
    pub size: usize,
    #[serde(rename = "contentType")]
    pub content_type: String,
}

impl UploadUrlRequest {
    pub fn for_payload(size: usize, content_type: &str) -> Self {
        Self {
            upload_type: "imageUrl",
            size,
            content_type: content_type.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UploadUrlBody {
    #[serde(rename = "uploadImage")]
    pub upload_image: Option<String>,
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub size: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SwapRequest {
    #[serde(rename = "imageUrl")]
    pub image_url: String,
    #[serde(rename = "styleImageUrl")]
    pub style_image_url: String,
}

#[derive(Debug, Deserialize)]
pub struct SwapBody {
    #[serde(rename = "orderId")]
    pub order_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusRequest {
    #[serde(rename = "orderId")]
    pub order_id: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: JobStatus,
    #[serde(default)]
    pub output: Option<String>,
}
