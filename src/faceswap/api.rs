use std::time::Duration;

use reqwest::Client as HttpClient;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};

use crate::faceswap::client::SwapConfig;
use crate::faceswap::error::SwapError;
use crate::faceswap::models::{
    ApiEnvelope, ImagePayload, StatusBody, StatusRequest, SwapBody, SwapRequest, UploadTicket,
    UploadUrlBody, UploadUrlRequest,
};

/// Transport seam for the face-swap service. The production
/// implementation talks HTTP; tests script the responses. Retry lives in
/// the poller, never here — every method is a single attempt.
#[allow(async_fn_in_trait)]
pub trait SwapApi {
    /// GET an image by URL, returning its bytes and the declared content
    /// type, if any.
    async fn fetch_image(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<(Vec<u8>, Option<String>), SwapError>;

    /// Negotiation step A: ask the service for a one-shot signed upload
    /// URL plus the public URL the image will resolve to.
    async fn create_upload_url(
        &self,
        size: usize,
        content_type: &str,
    ) -> Result<UploadTicket, SwapError>;

    /// Negotiation step B: PUT the raw bytes to the signed URL.
    async fn put_image(&self, upload_url: &str, payload: &ImagePayload) -> Result<(), SwapError>;

    /// Submit a swap job; returns the order id.
    async fn submit_swap(&self, source_url: &str, target_url: &str) -> Result<String, SwapError>;

    /// One status check for a submitted order.
    async fn order_status(&self, order_id: &str) -> Result<StatusBody, SwapError>;

    /// Lightweight reachability check; returns the raw HTTP status of an
    /// upload-URL request.
    async fn probe(&self, timeout: Duration) -> Result<u16, SwapError>;
}

/// reqwest-backed `SwapApi` implementation.
#[derive(Clone)]
pub struct HttpSwapApi {
    http: HttpClient,
    api_key: String,
    base_url: String,
    request_timeout: Duration,
}

impl HttpSwapApi {
    pub fn new(config: &SwapConfig) -> Self {
        Self {
            http: HttpClient::new(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn map_transport(&self, err: reqwest::Error, timeout: Duration) -> SwapError {
        if err.is_timeout() {
            SwapError::Timeout(timeout)
        } else {
            SwapError::Upstream {
                status: 0,
                body: err.to_string(),
            }
        }
    }
}

impl SwapApi for HttpSwapApi {
    async fn fetch_image(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<(Vec<u8>, Option<String>), SwapError> {
        let response = self
            .http
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SwapError::Timeout(timeout)
                } else {
                    SwapError::Fetch(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SwapError::Fetch(format!(
                "GET {} returned {}",
                url,
                status.as_u16()
            )));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SwapError::Fetch(e.to_string()))?;
        Ok((bytes.to_vec(), content_type))
    }

    async fn create_upload_url(
        &self,
        size: usize,
        content_type: &str,
    ) -> Result<UploadTicket, SwapError> {
        let request = UploadUrlRequest::for_payload(size, content_type);
        let response = self
            .http
            .post(self.endpoint("/v2/uploadImageUrl"))
            .header("x-api-key", &self.api_key)
            .timeout(self.request_timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_transport(e, self.request_timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(match status.as_u16() {
                403 => SwapError::Authentication,
                429 => SwapError::RateLimit,
                402 => SwapError::Billing,
                code => SwapError::Upstream {
                    status: code,
                    body: response.text().await.unwrap_or_default(),
                },
            });
        }

        let envelope: ApiEnvelope<UploadUrlBody> = response
            .json()
            .await
            .map_err(|e| SwapError::InvalidResponse(e.to_string()))?;
        let body = envelope.into_body()?;

        match (body.upload_image, body.image_url) {
            (Some(upload_url), Some(image_url)) => Ok(UploadTicket {
                upload_url,
                image_url,
                declared_size: body.size.unwrap_or(size as i64),
            }),
            _ => Err(SwapError::InvalidResponse(
                "upload envelope is missing uploadImage or imageUrl".to_string(),
            )),
        }
    }

    async fn put_image(&self, upload_url: &str, payload: &ImagePayload) -> Result<(), SwapError> {
        let response = self
            .http
            .put(upload_url)
            .header(CONTENT_TYPE, payload.content_type())
            .header(CONTENT_LENGTH, payload.len())
            .timeout(self.request_timeout)
            .body(payload.bytes().to_vec())
            .send()
            .await
            .map_err(|e| self.map_transport(e, self.request_timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SwapError::Upload {
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    async fn submit_swap(&self, source_url: &str, target_url: &str) -> Result<String, SwapError> {
        let request = SwapRequest {
            image_url: source_url.to_string(),
            style_image_url: target_url.to_string(),
        };
        let response = self
            .http
            .post(self.endpoint("/v1/face-swap"))
            .header("x-api-key", &self.api_key)
            .timeout(self.request_timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_transport(e, self.request_timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(match status.as_u16() {
                403 => SwapError::AccessDenied,
                402 => SwapError::InsufficientCredits,
                400 => SwapError::InvalidFaces,
                code => SwapError::Upstream {
                    status: code,
                    body: response.text().await.unwrap_or_default(),
                },
            });
        }

        let envelope: ApiEnvelope<SwapBody> = response
            .json()
            .await
            .map_err(|e| SwapError::InvalidResponse(e.to_string()))?;
        envelope
            .into_body()?
            .order_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SwapError::InvalidResponse("swap envelope is missing orderId".to_string()))
    }

    async fn order_status(&self, order_id: &str) -> Result<StatusBody, SwapError> {
        let request = StatusRequest {
            order_id: order_id.to_string(),
        };
        let response = self
            .http
            .post(self.endpoint("/v1/order-status"))
            .header("x-api-key", &self.api_key)
            .timeout(self.request_timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_transport(e, self.request_timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SwapError::Upstream {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let envelope: ApiEnvelope<StatusBody> = response
            .json()
            .await
            .map_err(|e| SwapError::InvalidResponse(e.to_string()))?;
        envelope.into_body()
    }

    async fn probe(&self, timeout: Duration) -> Result<u16, SwapError> {
        let request = UploadUrlRequest::for_payload(1024, "image/jpeg");
        let response = self
            .http
            .post(self.endpoint("/v2/uploadImageUrl"))
            .header("x-api-key", &self.api_key)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_transport(e, timeout))?;
        Ok(response.status().as_u16())
    }
}
