use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::media_service::MediaAsset;

/// Persisted record of one completed face-swap request: the upstream
/// output URL and the mirrored copy in media storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapRecord {
    pub id: Uuid,
    pub result_url: String,
    pub media_public_id: String,
    pub media_url: String,
    pub width: i64,
    pub height: i64,
    pub format: String,
    pub media_bytes: i64,
    pub created_at: DateTime<Utc>,
}

impl SwapRecord {
    pub fn new(result_url: String, media: &MediaAsset) -> Self {
        Self {
            id: Uuid::new_v4(),
            result_url,
            media_public_id: media.public_id.clone(),
            media_url: media.url.clone(),
            width: media.width,
            height: media.height,
            format: media.format.clone(),
            media_bytes: media.bytes,
            created_at: chrono::Utc::now(),
        }
    }
}
