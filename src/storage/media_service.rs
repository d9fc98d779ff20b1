use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use hex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A stored copy of an image in the media bucket, with the metadata the
/// persistence layer keeps alongside each swap record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAsset {
    pub url: String,
    pub public_id: String,
    pub width: i64,
    pub height: i64,
    pub format: String,
    pub bytes: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Failed to fetch media: {0}")]
    Fetch(String),
    #[error("Failed to decode media: {0}")]
    Decode(String),
}

/// S3-backed media host. Results from the face-swap service are mirrored
/// here so downloads keep working after the upstream output URL expires.
#[derive(Clone)]
pub struct MediaService {
    client: Client,
    http: reqwest::Client,
    bucket_name: String,
    public_base_url: String,
}

impl MediaService {
    pub fn new(client: Client, bucket_name: String, public_base_url: String) -> Self {
        Self {
            client,
            http: reqwest::Client::new(),
            bucket_name,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn content_hash(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    fn object_key(content_hash: &str, format: &str) -> String {
        format!("swaps/{}.{}", content_hash, format)
    }

    /// Downloads an image by URL and stores it in the bucket. Dimensions
    /// and format come from decoding the actual bytes, not from the URL.
    pub async fn store_from_url(&self, url: &str) -> Result<MediaAsset, MediaError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| MediaError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MediaError::Fetch(format!(
                "GET {} returned {}",
                url,
                response.status().as_u16()
            )));
        }

        let data = response
            .bytes()
            .await
            .map_err(|e| MediaError::Fetch(e.to_string()))?
            .to_vec();

        self.store_bytes(&data).await
    }

    pub async fn store_bytes(&self, data: &[u8]) -> Result<MediaAsset, MediaError> {
        let format = image::guess_format(data)
            .map_err(|e| MediaError::Decode(e.to_string()))?
            .extensions_str()
            .first()
            .copied()
            .unwrap_or("bin");
        let decoded =
            image::load_from_memory(data).map_err(|e| MediaError::Decode(e.to_string()))?;

        let content_hash = Self::content_hash(data);
        let key = Self::object_key(&content_hash, format);
        let content_type = format!("image/{}", format);

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .body(ByteStream::from(data.to_vec()))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| MediaError::Storage(e.to_string()))?;

        Ok(MediaAsset {
            url: format!("{}/{}", self.public_base_url, key),
            public_id: key,
            width: decoded.width() as i64,
            height: decoded.height() as i64,
            format: format.to_string(),
            bytes: data.len() as i64,
        })
    }

    pub async fn get_media(&self, public_id: &str) -> Result<Vec<u8>, MediaError> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket_name)
            .key(public_id)
            .send()
            .await
            .map_err(|e| MediaError::Storage(e.to_string()))?;

        let body = result
            .body
            .collect()
            .await
            .map_err(|e| MediaError::Storage(e.to_string()))?;
        Ok(body.into_bytes().to_vec())
    }

    pub async fn delete_media(&self, public_id: &str) -> Result<(), MediaError> {
        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(public_id)
            .send()
            .await
            .map_err(|e| MediaError::Storage(e.to_string()))?;

        Ok(())
    }
}
