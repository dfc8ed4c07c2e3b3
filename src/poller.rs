//! Polling jobs that a server accepted for asynchronous processing.

use reqwest_middleware::ClientWithMiddleware;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use x402_payer_types::proto::{JobHandle, JobStatus, StatusCheckWire};

use crate::config::DEFAULT_MAX_POLL_ATTEMPTS;
use crate::error::X402PayerError;

/// Wait between status checks when neither the caller nor the server says otherwise.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Status checks to issue before giving up with a `timeout` status.
    pub max_attempts: u32,
    /// Wait between checks; takes precedence over the server's suggestion.
    pub interval_override: Option<Duration>,
    pub cancellation: Option<CancellationToken>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
            interval_override: None,
            cancellation: None,
        }
    }
}

impl PollOptions {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval_override = Some(interval);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// Checks a job's status URL until it finishes, fails, runs out of attempts or is
/// cancelled.
#[derive(Debug, Clone)]
pub struct JobPoller {
    http: ClientWithMiddleware,
    default_interval: Duration,
}

impl JobPoller {
    pub fn new(http: impl Into<ClientWithMiddleware>) -> Self {
        Self {
            http: http.into(),
            default_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_default_interval(mut self, interval: Duration) -> Self {
        self.default_interval = interval;
        self
    }

    pub async fn poll(
        &self,
        handle: &JobHandle,
        options: &PollOptions,
    ) -> Result<JobStatus, X402PayerError> {
        self.poll_with_progress(handle, options, |_| {}).await
    }

    /// Polls like [`JobPoller::poll`], reporting every status check to `on_progress`.
    ///
    /// Returns after at most `max_attempts` checks. Running out of attempts is not an
    /// error: the result is a failed status coded [`TIMEOUT_CODE`](x402_payer_types::proto::TIMEOUT_CODE).
    /// A failed status check is.
    #[tracing::instrument(name = "x402.payer.poll", skip_all, err, fields(status_url = %handle.status_url))]
    pub async fn poll_with_progress<F>(
        &self,
        handle: &JobHandle,
        options: &PollOptions,
        mut on_progress: F,
    ) -> Result<JobStatus, X402PayerError>
    where
        F: FnMut(&JobStatus),
    {
        let interval = options
            .interval_override
            .or(handle.poll_interval)
            .unwrap_or(self.default_interval);
        let cancellation = options
            .cancellation
            .clone()
            .unwrap_or_else(CancellationToken::new);

        for attempt in 1..=options.max_attempts {
            let status = tokio::select! {
                _ = cancellation.cancelled() => return Ok(JobStatus::cancelled(attempt - 1)),
                status = self.check(handle, attempt) => status?,
            };
            tracing::debug!(attempt, state = ?status.state, "Job status");
            on_progress(&status);
            if status.is_terminal() {
                return Ok(status);
            }
            if attempt < options.max_attempts {
                tokio::select! {
                    _ = cancellation.cancelled() => return Ok(JobStatus::cancelled(attempt)),
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        }

        tracing::warn!(
            attempts = options.max_attempts,
            "Job did not finish within the attempt budget"
        );
        Ok(JobStatus::timed_out(options.max_attempts))
    }

    async fn check(&self, handle: &JobHandle, attempt: u32) -> Result<JobStatus, X402PayerError> {
        let response = self.http.get(handle.status_url.clone()).send().await?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(reqwest_middleware::Error::Reqwest)?;
        if !status.is_success() {
            return Err(X402PayerError::Transport {
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        let wire: StatusCheckWire = serde_json::from_slice(&bytes)?;
        Ok(JobStatus::from_wire(wire, attempt))
    }
}
