use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::faceswap::api::SwapApi;
use crate::faceswap::error::SwapError;
use crate::faceswap::models::ImagePayload;

/// Where one input image comes from. The HTTP layer maps uploaded files
/// to `LocalPath` and pasted links to `RemoteUrl`.
#[derive(Debug, Clone)]
pub enum ImageSource {
    RemoteUrl(String),
    LocalPath(PathBuf),
}

fn content_type_from_extension(path: &Path) -> Result<&'static str, SwapError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "png" => Ok("image/png"),
        other => Err(SwapError::UnsupportedFormat(format!(
            "file extension '{}' is not a supported image type",
            other
        ))),
    }
}

/// Resolves an `ImageSource` into raw bytes plus a content type.
/// Single attempt by design; the caller decides whether to retry the
/// whole job.
pub async fn acquire(
    api: &impl SwapApi,
    source: &ImageSource,
    timeout: Duration,
) -> Result<ImagePayload, SwapError> {
    match source {
        ImageSource::RemoteUrl(url) => {
            let (bytes, declared_type) = api.fetch_image(url, timeout).await?;
            // Strip any media-type parameters; default to jpeg when the
            // response carries no content type at all.
            let content_type = declared_type
                .as_deref()
                .and_then(|raw| raw.split(';').next())
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
                .unwrap_or_else(|| "image/jpeg".to_string());
            Ok(ImagePayload::new(bytes, content_type))
        }
        ImageSource::LocalPath(path) => {
            if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                return Err(SwapError::NotFound(path.display().to_string()));
            }
            let content_type = content_type_from_extension(path)?;
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| SwapError::Fetch(format!("{}: {}", path.display(), e)))?;
            Ok(ImagePayload::new(bytes, content_type))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faceswap::models::{StatusBody, UploadTicket};

    struct NoRemoteApi;

    impl SwapApi for NoRemoteApi {
        async fn fetch_image(
            &self,
            _url: &str,
            _timeout: Duration,
        ) -> Result<(Vec<u8>, Option<String>), SwapError> {
            Err(SwapError::Fetch("no remote access in tests".to_string()))
        }

        async fn create_upload_url(
            &self,
            _size: usize,
            _content_type: &str,
        ) -> Result<UploadTicket, SwapError> {
            unimplemented!()
        }

        async fn put_image(
            &self,
            _upload_url: &str,
            _payload: &ImagePayload,
        ) -> Result<(), SwapError> {
            unimplemented!()
        }

        async fn submit_swap(
            &self,
            _source_url: &str,
            _target_url: &str,
        ) -> Result<String, SwapError> {
            unimplemented!()
        }

        async fn order_status(&self, _order_id: &str) -> Result<StatusBody, SwapError> {
            unimplemented!()
        }

        async fn probe(&self, _timeout: Duration) -> Result<u16, SwapError> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn missing_local_path_is_not_found() {
        let source = ImageSource::LocalPath(PathBuf::from("/definitely/not/here.jpg"));
        let result = acquire(&NoRemoteApi, &source, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(SwapError::NotFound(_))));
    }

    #[tokio::test]
    async fn jpg_extension_maps_to_jpeg_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face.JPG");
        std::fs::write(&path, vec![0xFFu8; 2048]).unwrap();

        let source = ImageSource::LocalPath(path);
        let payload = acquire(&NoRemoteApi, &source, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(payload.content_type(), "image/jpeg");
        assert_eq!(payload.len(), 2048);
    }

    #[tokio::test]
    async fn png_extension_maps_to_png_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face.png");
        std::fs::write(&path, vec![0u8; 2048]).unwrap();

        let source = ImageSource::LocalPath(path);
        let payload = acquire(&NoRemoteApi, &source, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(payload.content_type(), "image/png");
    }

    #[tokio::test]
    async fn other_extensions_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face.gif");
        std::fs::write(&path, vec![0u8; 2048]).unwrap();

        let source = ImageSource::LocalPath(path);
        let result = acquire(&NoRemoteApi, &source, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(SwapError::UnsupportedFormat(_))));
    }
}
