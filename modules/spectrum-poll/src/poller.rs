use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{HostInfo, Result, TimeoutError};
use crate::outcome::{Diagnostic, PollOutcome};

/// Pause between two attempts.
pub const DEFAULT_STEP: Duration = Duration::from_secs(5);
/// Global wait budget when `SPECTRUM_TIMEOUT` is unset.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);
/// Env var overriding the global wait budget, in seconds.
pub const TIMEOUT_VAR: &str = "SPECTRUM_TIMEOUT";

/// Describes what is being waited for. Deferred messages are only built
/// if the poll actually times out.
pub enum ErrorMessage<'a> {
    Literal(String),
    Deferred(Box<dyn FnOnce() -> String + Send + 'a>),
}

impl<'a> ErrorMessage<'a> {
    pub fn deferred(build: impl FnOnce() -> String + Send + 'a) -> Self {
        ErrorMessage::Deferred(Box::new(build))
    }

    fn render(self) -> String {
        match self {
            ErrorMessage::Literal(message) => message,
            ErrorMessage::Deferred(build) => build(),
        }
    }
}

impl From<&str> for ErrorMessage<'_> {
    fn from(message: &str) -> Self {
        ErrorMessage::Literal(message.to_string())
    }
}

impl From<String> for ErrorMessage<'_> {
    fn from(message: String) -> Self {
        ErrorMessage::Literal(message)
    }
}

/// Repeatedly runs an observation until it succeeds or the budget runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poller {
    step: Duration,
    timeout: Duration,
}

impl Default for Poller {
    fn default() -> Self {
        Self::new(DEFAULT_STEP, DEFAULT_TIMEOUT)
    }
}

impl Poller {
    pub fn new(step: Duration, timeout: Duration) -> Self {
        Self { step, timeout }
    }

    /// Default step, timeout from `SPECTRUM_TIMEOUT` when it is a valid number of seconds.
    pub fn from_env() -> Self {
        let timeout = match std::env::var(TIMEOUT_VAR) {
            Ok(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) => Duration::from_secs(secs),
                Err(_) => {
                    warn!(value = %raw, "{TIMEOUT_VAR} is not a number of seconds, using default");
                    DEFAULT_TIMEOUT
                }
            },
            Err(_) => DEFAULT_TIMEOUT,
        };
        Self::new(DEFAULT_STEP, timeout)
    }

    pub fn with_step(self, step: Duration) -> Self {
        Self { step, ..self }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `action` until it returns `Success`, sleeping `step` between attempts.
    ///
    /// Errors returned by `action` (unrecoverable backend states, ambiguous
    /// matches) end the poll immediately. When the budget is exhausted the
    /// result is a `TimeoutError` built from `message` and the diagnostic of
    /// the final attempt, if it produced one.
    pub async fn poll<'a, T, F, Fut>(
        &self,
        mut action: F,
        message: impl Into<ErrorMessage<'a>>,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<PollOutcome<T>>>,
    {
        let message = message.into();
        let started = Instant::now();
        let mut last_seen: Option<Diagnostic> = None;
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            match action().await? {
                PollOutcome::Success(value) => {
                    debug!(
                        attempts,
                        elapsed_secs = started.elapsed().as_secs(),
                        "Poll succeeded"
                    );
                    return Ok(value);
                }
                // an attempt without evidence clears the older evidence
                PollOutcome::Pending(diagnostic) => last_seen = diagnostic,
            }

            if started.elapsed() >= self.timeout {
                break;
            }
            tokio::time::sleep(self.step).await;
        }

        let target = message.render();
        warn!(
            attempts,
            timeout_secs = self.timeout.as_secs(),
            target = %target,
            "Giving up polling"
        );

        let host = match &last_seen {
            Some(Diagnostic::Transport { url, .. }) => resolve_host(url).await,
            _ => None,
        };

        Err(TimeoutError::giving_up_on(target)
            .with_last_seen(last_seen)
            .with_host(host)
            .into())
    }
}

/// Look up the host of a URL that failed at the transport level.
async fn resolve_host(url: &str) -> Option<HostInfo> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_string();
    let netloc = match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.clone(),
    };
    let port = parsed.port_or_known_default().unwrap_or(80);

    let ip = match tokio::net::lookup_host((host.as_str(), port)).await {
        Ok(mut addrs) => addrs.next().map(|addr| addr.ip()),
        Err(e) => {
            warn!(host = %host, error = %e, "Cannot lookup host");
            None
        }
    };

    Some(HostInfo { host: netloc, ip })
}
