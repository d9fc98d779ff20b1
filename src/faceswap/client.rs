use std::env;
use std::time::{Duration, Instant};

use tokio::time::sleep;

use crate::faceswap::acquire::{ImageSource, acquire};
use crate::faceswap::api::{HttpSwapApi, SwapApi};
use crate::faceswap::error::SwapError;
use crate::faceswap::models::JobStatus;
use crate::faceswap::stats::{ClientStats, StatsSnapshot};
use crate::faceswap::validate::validate_image;

const MIN_API_KEY_LEN: usize = 16;

/// Tuning for the status poller. Defaults match the service contract:
/// five attempts, three seconds between pending polls.
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub max_attempts: u32,
    pub poll_interval: Duration,
    pub transport_backoff_cap: Duration,
    pub retry_backoff_cap: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            poll_interval: Duration::from_secs(3),
            transport_backoff_cap: Duration::from_secs(10),
            retry_backoff_cap: Duration::from_secs(8),
        }
    }
}

/// The two backoff curves used inside the poll loop. Transport/HTTP
/// failures grow at 1.5x per attempt (capped at 10 s); every other
/// recoverable error grows at 1.2x (capped at 8 s). The curves are
/// intentionally distinct; merging them changes retry timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Transport,
    Retry,
}

impl Backoff {
    pub fn delay(self, config: &PollConfig, attempt: u32) -> Duration {
        let (factor, cap) = match self {
            Backoff::Transport => (1.5f64, config.transport_backoff_cap),
            Backoff::Retry => (1.2f64, config.retry_backoff_cap),
        };
        let millis = config.poll_interval.as_millis() as f64 * factor.powi(attempt as i32);
        Duration::from_millis(millis.min(cap.as_millis() as f64) as u64)
    }

    fn for_error(err: &SwapError) -> Self {
        match err {
            SwapError::Upstream { .. } | SwapError::Timeout(_) => Backoff::Transport,
            _ => Backoff::Retry,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SwapConfig {
    pub api_key: String,
    pub base_url: String,
    /// Per-call ceiling for upload negotiation, submission and polling.
    pub request_timeout: Duration,
    /// Ceiling for fetching a remote source image.
    pub fetch_timeout: Duration,
    /// Ceiling for the connectivity probe.
    pub probe_timeout: Duration,
    pub poll: PollConfig,
}

impl SwapConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: env::var("FACESWAP_API_KEY").unwrap_or_default(),
            base_url: env::var("FACESWAP_API_BASE").unwrap_or_default(),
            ..Self::with_credentials(String::new(), String::new())
        }
    }

    pub fn with_credentials(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url,
            request_timeout: Duration::from_secs(30),
            fetch_timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(10),
            poll: PollConfig::default(),
        }
    }
}

/// Drives one face-swap job end to end: acquire and validate both
/// images, negotiate their uploads concurrently, submit the job, then
/// poll the order until a terminal state or exhaustion. Generic over the
/// transport so tests can script the remote service.
#[derive(Clone)]
pub struct FaceSwapClient<A = HttpSwapApi> {
    api: A,
    config: SwapConfig,
    stats: ClientStats,
}

impl FaceSwapClient<HttpSwapApi> {
    pub fn from_env() -> Self {
        let config = SwapConfig::from_env();
        let api = HttpSwapApi::new(&config);
        Self::with_api(api, config)
    }
}

impl<A: SwapApi> FaceSwapClient<A> {
    pub fn with_api(api: A, config: SwapConfig) -> Self {
        Self {
            api,
            config,
            stats: ClientStats::new(),
        }
    }

    /// True only when an API key of plausible length and a base URL are
    /// both present. Collaborators use this to short-circuit before
    /// attempting a job.
    pub fn is_configured(&self) -> bool {
        self.config.api_key.len() >= MIN_API_KEY_LEN && !self.config.base_url.is_empty()
    }

    /// Issues a lightweight upload-URL request and interprets the raw
    /// status: 200 means reachable and authenticated, 403 means the key
    /// was rejected, anything else means not connected. Never errors.
    pub async fn test_connection(&self) -> bool {
        match self.api.probe(self.config.probe_timeout).await {
            Ok(200) => true,
            Ok(403) => {
                log::warn!("face swap service rejected the configured API key");
                false
            }
            Ok(status) => {
                log::warn!("face swap connectivity probe returned status {}", status);
                false
            }
            Err(e) => {
                log::warn!("face swap connectivity probe failed: {}", e);
                false
            }
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    /// Runs one job to completion and returns the output image URL.
    /// The first failure in either image pipeline, in submission or in
    /// polling aborts the whole job; there is no partial-success state.
    pub async fn perform_face_swap(
        &self,
        source: &ImageSource,
        target: &ImageSource,
    ) -> Result<String, SwapError> {
        if !self.is_configured() {
            return Err(SwapError::NotConfigured);
        }

        let started = Instant::now();

        let (source_url, target_url) =
            tokio::try_join!(self.prepare_image(source), self.prepare_image(target))?;

        let order_id = self.submit(&source_url, &target_url).await?;
        log::info!("face swap submitted, order {}", order_id);

        self.poll_order(&order_id, started).await
    }

    /// One image pipeline: acquire, validate, negotiate. Single attempt
    /// at every step; a validation failure is terminal for the job.
    async fn prepare_image(&self, source: &ImageSource) -> Result<String, SwapError> {
        let payload = acquire(&self.api, source, self.config.fetch_timeout).await?;

        let report = validate_image(payload.bytes(), payload.content_type());
        if !report.is_valid() {
            return Err(SwapError::Validation(report.to_string()));
        }

        let ticket = self
            .api
            .create_upload_url(payload.len(), payload.content_type())
            .await?;
        log::debug!(
            "negotiated upload slot for {} bytes of {}",
            ticket.declared_size,
            payload.content_type()
        );
        self.api.put_image(&ticket.upload_url, &payload).await?;

        Ok(ticket.image_url)
    }

    async fn submit(&self, source_url: &str, target_url: &str) -> Result<String, SwapError> {
        self.stats.record_request();
        match self.api.submit_swap(source_url, target_url).await {
            Ok(order_id) => Ok(order_id),
            Err(e) => {
                self.stats.record_failure();
                Err(e)
            }
        }
    }

    async fn poll_order(&self, order_id: &str, started: Instant) -> Result<String, SwapError> {
        let poll = &self.config.poll;

        for attempt in 0..poll.max_attempts {
            let last_attempt = attempt + 1 == poll.max_attempts;

            match self.api.order_status(order_id).await {
                Ok(body) => match body.status {
                    JobStatus::Active => {
                        if let Some(output) = body.output.filter(|o| !o.is_empty()) {
                            let elapsed = started.elapsed();
                            self.stats.record_success(elapsed);
                            log::info!(
                                "face swap order {} completed in {} ms",
                                order_id,
                                elapsed.as_millis()
                            );
                            return Ok(output);
                        }
                        // Active without an output URL is not terminal yet.
                        if !last_attempt {
                            sleep(poll.poll_interval).await;
                        }
                    }
                    JobStatus::Failed => {
                        self.stats.record_failure();
                        log::warn!("face swap order {} failed upstream", order_id);
                        return Err(SwapError::ProcessingFailed);
                    }
                    JobStatus::Init | JobStatus::Unknown => {
                        if !last_attempt {
                            sleep(poll.poll_interval).await;
                        }
                    }
                },
                Err(e) => {
                    if last_attempt {
                        log::warn!(
                            "final poll attempt for order {} failed: {}",
                            order_id,
                            e
                        );
                        break;
                    }
                    let backoff = Backoff::for_error(&e);
                    log::warn!(
                        "poll attempt {} for order {} failed ({}), backing off",
                        attempt + 1,
                        order_id,
                        e
                    );
                    sleep(backoff.delay(poll, attempt)).await;
                }
            }
        }

        self.stats.record_failure();
        Err(SwapError::PollingExhausted {
            attempts: poll.max_attempts,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faceswap::models::{
        ImagePayload, JPEG_MAGIC, PNG_MAGIC, StatusBody, UploadTicket,
    };
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Scripted transport: negotiation succeeds unless told to fail for a
    /// given content type, submission returns a fixed order id and status
    /// checks pop from a queue (defaulting to `init` when empty).
    #[derive(Default)]
    struct ScriptedApi {
        fail_upload_for: Option<&'static str>,
        submit_error: Mutex<Option<SwapError>>,
        statuses: Mutex<VecDeque<Result<StatusBody, SwapError>>>,
        upload_calls: AtomicU32,
        submit_calls: AtomicU32,
        status_calls: AtomicU32,
        probe_status: AtomicU32,
    }

    impl ScriptedApi {
        fn with_statuses(statuses: Vec<Result<StatusBody, SwapError>>) -> Self {
            Self {
                statuses: Mutex::new(statuses.into()),
                ..Self::default()
            }
        }

        fn status(status: JobStatus, output: Option<&str>) -> Result<StatusBody, SwapError> {
            Ok(StatusBody {
                status,
                output: output.map(str::to_string),
            })
        }
    }

    impl SwapApi for ScriptedApi {
        async fn fetch_image(
            &self,
            _url: &str,
            _timeout: Duration,
        ) -> Result<(Vec<u8>, Option<String>), SwapError> {
            Err(SwapError::Fetch("remote fetch is not scripted".to_string()))
        }

        async fn create_upload_url(
            &self,
            size: usize,
            content_type: &str,
        ) -> Result<UploadTicket, SwapError> {
            self.upload_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_upload_for == Some(content_type) {
                return Err(SwapError::Authentication);
            }
            Ok(UploadTicket {
                upload_url: "https://upload.example/slot".to_string(),
                image_url: format!("https://cdn.example/{}", content_type.replace('/', "-")),
                declared_size: size as i64,
            })
        }

        async fn put_image(
            &self,
            _upload_url: &str,
            _payload: &ImagePayload,
        ) -> Result<(), SwapError> {
            Ok(())
        }

        async fn submit_swap(
            &self,
            _source_url: &str,
            _target_url: &str,
        ) -> Result<String, SwapError> {
            self.submit_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.submit_error.lock().unwrap().take() {
                return Err(err);
            }
            Ok("order-123".to_string())
        }

        async fn order_status(&self, _order_id: &str) -> Result<StatusBody, SwapError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            self.statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Self::status(JobStatus::Init, None))
        }

        async fn probe(&self, _timeout: Duration) -> Result<u16, SwapError> {
            match self.probe_status.load(Ordering::SeqCst) {
                0 => Ok(200),
                status => Ok(status as u16),
            }
        }
    }

    fn fast_config() -> SwapConfig {
        let mut config =
            SwapConfig::with_credentials("test-key-0123456789".to_string(), "https://api.example".to_string());
        config.poll.poll_interval = Duration::from_millis(1);
        config.poll.transport_backoff_cap = Duration::from_millis(5);
        config.poll.retry_backoff_cap = Duration::from_millis(5);
        config
    }

    fn client(api: ScriptedApi) -> FaceSwapClient<ScriptedApi> {
        FaceSwapClient::with_api(api, fast_config())
    }

    fn write_image(dir: &tempfile::TempDir, name: &str, magic: &[u8], len: usize) -> PathBuf {
        let mut bytes = vec![0u8; len];
        bytes[..magic.len()].copy_from_slice(magic);
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn backoff_curves_stay_distinct() {
        let config = PollConfig {
            poll_interval: Duration::from_millis(1000),
            ..PollConfig::default()
        };

        assert_eq!(
            Backoff::Transport.delay(&config, 1),
            Duration::from_millis(1500)
        );
        assert_eq!(
            Backoff::Transport.delay(&config, 2),
            Duration::from_millis(2250)
        );
        assert_eq!(Backoff::Retry.delay(&config, 1), Duration::from_millis(1200));
        assert_eq!(Backoff::Retry.delay(&config, 2), Duration::from_millis(1440));
    }

    #[test]
    fn backoff_respects_the_caps() {
        let config = PollConfig {
            poll_interval: Duration::from_secs(3),
            ..PollConfig::default()
        };

        assert_eq!(Backoff::Transport.delay(&config, 20), Duration::from_secs(10));
        assert_eq!(Backoff::Retry.delay(&config, 20), Duration::from_secs(8));
    }

    #[test]
    fn short_api_key_is_not_configured() {
        let client = FaceSwapClient::with_api(
            ScriptedApi::default(),
            SwapConfig::with_credentials("short".to_string(), "https://api.example".to_string()),
        );
        assert!(!client.is_configured());
    }

    #[test]
    fn long_key_with_base_url_is_configured() {
        let client = FaceSwapClient::with_api(
            ScriptedApi::default(),
            SwapConfig::with_credentials(
                "01234567890123456789".to_string(),
                "https://api.example".to_string(),
            ),
        );
        assert!(client.is_configured());
    }

    #[test]
    fn missing_base_url_is_not_configured() {
        let client = FaceSwapClient::with_api(
            ScriptedApi::default(),
            SwapConfig::with_credentials("01234567890123456789".to_string(), String::new()),
        );
        assert!(!client.is_configured());
    }

    #[tokio::test]
    async fn always_pending_order_exhausts_after_exactly_five_attempts() {
        let client = client(ScriptedApi::default());

        let result = client.poll_order("order-123", Instant::now()).await;
        match result {
            Err(SwapError::PollingExhausted { attempts, .. }) => assert_eq!(attempts, 5),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(client.api.status_calls.load(Ordering::SeqCst), 5);
        assert_eq!(client.stats().failed_swaps, 1);
    }

    #[tokio::test]
    async fn first_active_poll_returns_the_output() {
        let api = ScriptedApi::with_statuses(vec![ScriptedApi::status(
            JobStatus::Active,
            Some("https://cdn.example/result.jpg"),
        )]);
        let client = client(api);

        let output = client
            .poll_order("order-123", Instant::now())
            .await
            .unwrap();
        assert_eq!(output, "https://cdn.example/result.jpg");
        assert_eq!(client.api.status_calls.load(Ordering::SeqCst), 1);

        let stats = client.stats();
        assert_eq!(stats.successful_swaps, 1);
        assert!(stats.average_processing_time_ms >= 0.0);
    }

    #[tokio::test]
    async fn failed_status_is_terminal_and_not_retried() {
        let api = ScriptedApi::with_statuses(vec![ScriptedApi::status(JobStatus::Failed, None)]);
        let client = client(api);

        let result = client.poll_order("order-123", Instant::now()).await;
        assert!(matches!(result, Err(SwapError::ProcessingFailed)));
        assert_eq!(client.api.status_calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.stats().failed_swaps, 1);
    }

    #[tokio::test]
    async fn transport_errors_are_retried_until_a_terminal_status() {
        let api = ScriptedApi::with_statuses(vec![
            Err(SwapError::Upstream {
                status: 502,
                body: "bad gateway".to_string(),
            }),
            Err(SwapError::Timeout(Duration::from_secs(30))),
            ScriptedApi::status(JobStatus::Active, Some("https://cdn.example/out.png")),
        ]);
        let client = client(api);

        let output = client
            .poll_order("order-123", Instant::now())
            .await
            .unwrap();
        assert_eq!(output, "https://cdn.example/out.png");
        assert_eq!(client.api.status_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn end_to_end_swap_succeeds_with_valid_images() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_image(&dir, "source.jpg", &JPEG_MAGIC, 50 * 1024);
        let target = write_image(&dir, "target.png", &PNG_MAGIC, 80 * 1024);

        let api = ScriptedApi::with_statuses(vec![ScriptedApi::status(
            JobStatus::Active,
            Some("https://cdn.example/swapped.jpg"),
        )]);
        let client = client(api);

        let output = client
            .perform_face_swap(
                &ImageSource::LocalPath(source),
                &ImageSource::LocalPath(target),
            )
            .await
            .unwrap();

        assert_eq!(output, "https://cdn.example/swapped.jpg");
        assert_eq!(client.api.upload_calls.load(Ordering::SeqCst), 2);
        assert_eq!(client.api.submit_calls.load(Ordering::SeqCst), 1);

        let stats = client.stats();
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.successful_swaps, 1);
        assert_eq!(stats.failed_swaps, 0);
    }

    #[tokio::test]
    async fn undersized_target_aborts_before_submission() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_image(&dir, "source.jpg", &JPEG_MAGIC, 50 * 1024);
        let target = write_image(&dir, "target.png", &PNG_MAGIC, 500);

        let client = client(ScriptedApi::default());

        let result = client
            .perform_face_swap(
                &ImageSource::LocalPath(source),
                &ImageSource::LocalPath(target),
            )
            .await;

        match result {
            Err(SwapError::Validation(msg)) => assert!(msg.contains("smaller")),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(client.api.submit_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn negotiation_failure_on_one_image_fails_the_job() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_image(&dir, "source.jpg", &JPEG_MAGIC, 50 * 1024);
        let target = write_image(&dir, "target.png", &PNG_MAGIC, 80 * 1024);

        let api = ScriptedApi {
            fail_upload_for: Some("image/jpeg"),
            ..ScriptedApi::default()
        };
        let client = client(api);

        let result = client
            .perform_face_swap(
                &ImageSource::LocalPath(source),
                &ImageSource::LocalPath(target),
            )
            .await;

        assert!(matches!(result, Err(SwapError::Authentication)));
        assert_eq!(client.api.submit_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn submission_failure_counts_as_a_failed_swap() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_image(&dir, "source.jpg", &JPEG_MAGIC, 10 * 1024);
        let target = write_image(&dir, "target.jpg", &JPEG_MAGIC, 10 * 1024);

        let api = ScriptedApi::default();
        *api.submit_error.lock().unwrap() = Some(SwapError::InvalidFaces);
        let client = client(api);

        let result = client
            .perform_face_swap(
                &ImageSource::LocalPath(source),
                &ImageSource::LocalPath(target),
            )
            .await;

        assert!(matches!(result, Err(SwapError::InvalidFaces)));
        let stats = client.stats();
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.failed_swaps, 1);
    }

    #[tokio::test]
    async fn unconfigured_client_refuses_jobs() {
        let client = FaceSwapClient::with_api(
            ScriptedApi::default(),
            SwapConfig::with_credentials(String::new(), String::new()),
        );
        let result = client
            .perform_face_swap(
                &ImageSource::RemoteUrl("https://img.example/a.jpg".to_string()),
                &ImageSource::RemoteUrl("https://img.example/b.jpg".to_string()),
            )
            .await;
        assert!(matches!(result, Err(SwapError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_connection_reports_reachable_on_200() {
        let client = client(ScriptedApi::default());
        assert!(client.test_connection().await);
    }

    #[tokio::test]
    async fn test_connection_reports_auth_failure_on_403() {
        let api = ScriptedApi::default();
        api.probe_status.store(403, Ordering::SeqCst);
        let client = client(api);
        assert!(!client.test_connection().await);
    }
}
