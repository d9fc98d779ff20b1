use std::time::Duration;

/// Failure taxonomy for the face-swap pipeline. Acquirer, validator and
/// negotiator errors are terminal for the job; only the poller retries,
/// and only for non-terminal outcomes.
#[derive(Debug, thiserror::Error)]
pub enum SwapError {
    #[error("image validation failed: {0}")]
    Validation(String),
    #[error("failed to fetch remote image: {0}")]
    Fetch(String),
    #[error("image not found at {0}")]
    NotFound(String),
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("authentication with the face swap service failed; check the API key and plan")]
    Authentication,
    #[error("face swap service rate limit reached; retry later")]
    RateLimit,
    #[error("face swap service billing issue; check the account balance")]
    Billing,
    #[error("access to the face swap endpoint was denied")]
    AccessDenied,
    #[error("insufficient credits for a face swap job")]
    InsufficientCredits,
    #[error("the service could not detect usable faces in the submitted images")]
    InvalidFaces,
    #[error("unexpected upstream response ({status}): {body}")]
    Upstream { status: u16, body: String },
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed response from the face swap service: {0}")]
    InvalidResponse(String),
    #[error("binary upload rejected with status {status}")]
    Upload { status: u16 },
    #[error("face swap job ended in a failed state")]
    ProcessingFailed,
    #[error("status polling exhausted after {attempts} attempts ({elapsed_ms} ms)")]
    PollingExhausted { attempts: u32, elapsed_ms: u64 },
    #[error("face swap client is not configured")]
    NotConfigured,
}

impl SwapError {
    /// Errors the submitter should surface to callers as their own fault
    /// (bad input, account state) rather than as a service failure.
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            SwapError::Validation(_)
                | SwapError::NotFound(_)
                | SwapError::UnsupportedFormat(_)
                | SwapError::Authentication
                | SwapError::Billing
                | SwapError::AccessDenied
                | SwapError::InsufficientCredits
                | SwapError::InvalidFaces
                | SwapError::RateLimit
                | SwapError::NotConfigured
        )
    }
}
