use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// Max attempts (first try included) before the last response is returned.
pub const MAX_TRIES: u32 = 3;
/// Base backoff. Actual delay is base * 2^attempt.
pub const BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Anything carrying an HTTP status code.
pub trait HasStatus {
    fn status_code(&self) -> u16;
}

impl HasStatus for reqwest::Response {
    fn status_code(&self) -> u16 {
        self.status().as_u16()
    }
}

/// Which responses count as "not ready yet" and how long to wait for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    retry_on: Vec<u16>,
    max_tries: u32,
    base: Duration,
}

impl Default for RetryPolicy {
    /// 404 covers assets not yet propagated (e.g. images behind an IIIF
    /// server), 400 covers report endpoints that reject unknown subjects
    /// until they are indexed, 502/504 are gateway hiccups.
    fn default() -> Self {
        Self::new([400, 404, 502, 504])
    }
}

impl RetryPolicy {
    pub fn new(retry_on: impl IntoIterator<Item = u16>) -> Self {
        let mut retry_on: Vec<u16> = retry_on.into_iter().collect();
        retry_on.sort_unstable();
        retry_on.dedup();
        Self {
            retry_on,
            max_tries: MAX_TRIES,
            base: BACKOFF_BASE,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new([]).with_max_tries(1)
    }

    pub fn with_max_tries(self, max_tries: u32) -> Self {
        Self {
            max_tries: max_tries.max(1),
            ..self
        }
    }

    pub fn with_base(self, base: Duration) -> Self {
        Self { base, ..self }
    }

    pub fn retry_on(&self) -> &[u16] {
        &self.retry_on
    }

    pub fn max_tries(&self) -> u32 {
        self.max_tries
    }

    pub fn should_retry(&self, status: u16) -> bool {
        self.retry_on.binary_search(&status).is_ok()
    }

    /// Delay before retry number `attempt + 1`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base
            .checked_mul(2u32.saturating_pow(attempt))
            .unwrap_or(Duration::MAX)
    }
}

/// Send a request, re-sending it while its status is in the retry set.
///
/// Returns the final response whatever its status; transport errors are
/// returned immediately. Status inspection is left to the caller.
pub async fn persistently<R, E, F, Fut>(policy: &RetryPolicy, url: &str, mut send: F) -> Result<R, E>
where
    R: HasStatus,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let mut attempt = 0;
    loop {
        let response = send().await?;
        let status = response.status_code();
        if !policy.should_retry(status) || attempt + 1 >= policy.max_tries {
            return Ok(response);
        }

        let delay = policy.backoff(attempt);
        debug!(
            url,
            status,
            attempt = attempt + 1,
            backoff_ms = delay.as_millis() as u64,
            "Transient status, will retry"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
