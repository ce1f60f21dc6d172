use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::outcome::Diagnostic;

pub type Result<T> = std::result::Result<T, Error>;

/// Every way a check, a poll or a load iteration can fail.
#[derive(Debug, Error)]
pub enum Error {
    /// The wait budget ran out without the condition becoming true.
    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    /// The backend told us definitively that waiting longer cannot help.
    #[error(transparent)]
    Unrecoverable(#[from] UnrecoverableError),

    /// More than one candidate matched where exactly one was expected.
    #[error("Too many matches for {what}:\n{candidates}")]
    AmbiguousMatch { what: String, candidates: String },

    #[error("Assertion failed: {0}")]
    Assertion(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn assertion(message: impl Into<String>) -> Self {
        Error::Assertion(message.into())
    }

    pub fn http(err: impl fmt::Display) -> Self {
        Error::Http(err.to_string())
    }

    pub fn parse(err: impl fmt::Display) -> Self {
        Error::Parse(err.to_string())
    }

    /// Failures a long-running load session logs and survives.
    /// Only misconfiguration is fatal.
    pub fn is_expected_during_load(&self) -> bool {
        !matches!(self, Error::Config(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err.to_string())
    }
}

/// Host and address of the last transport failure, for debugging partitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub host: String,
    pub ip: Option<IpAddr>,
}

#[derive(Debug, Clone)]
pub struct TimeoutError {
    pub target: String,
    pub giving_up_at: DateTime<Utc>,
    pub last_seen: Option<Diagnostic>,
    pub host: Option<HostInfo>,
}

impl TimeoutError {
    pub fn giving_up_on(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            giving_up_at: Utc::now(),
            last_seen: None,
            host: None,
        }
    }

    pub fn with_last_seen(mut self, last_seen: Option<Diagnostic>) -> Self {
        self.last_seen = last_seen;
        self
    }

    pub fn with_host(mut self, host: Option<HostInfo>) -> Self {
        self.host = host;
        self
    }
}

impl fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cannot find '{}", self.target)?;
        if let Some(last_seen) = &self.last_seen {
            write!(f, "\n{last_seen}")?;
        }
        if let Some(host) = &self.host {
            write!(f, "\nHost: {}", host.host)?;
            match host.ip {
                Some(ip) => write!(f, "\nIp: {ip}")?,
                None => write!(f, "\nIp: unresolved")?,
            }
        }
        write!(
            f,
            "'; Giving up at {}",
            self.giving_up_at.format("%Y-%m-%dT%H:%M:%S%.6f")
        )
    }
}

impl std::error::Error for TimeoutError {}

/// What the backend said when it gave up.
#[derive(Debug, Clone, PartialEq)]
pub enum Details {
    Response {
        url: Option<String>,
        status: u16,
        body: String,
    },
    Message(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnrecoverableError {
    pub details: Details,
}

impl UnrecoverableError {
    pub fn response(url: Option<String>, status: u16, body: impl Into<String>) -> Self {
        Self {
            details: Details::Response {
                url,
                status,
                body: body.into(),
            },
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            details: Details::Message(message.into()),
        }
    }

    /// HTTP status of the captured response, if there is one.
    pub fn status(&self) -> Option<u16> {
        match &self.details {
            Details::Response { status, .. } => Some(*status),
            Details::Message(_) => None,
        }
    }
}

impl fmt::Display for UnrecoverableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.details {
            Details::Response { url, status, body } => {
                if let Some(url) = url {
                    writeln!(f, "URL: {url}")?;
                }
                write!(f, "RESPONSE CODE: {status}\nRESPONSE BODY:\n{body}\n")
            }
            Details::Message(message) => write!(f, "DETAILS: {message}"),
        }
    }
}

impl std::error::Error for UnrecoverableError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_carries_diagnostic_and_host() {
        let err = TimeoutError::giving_up_on("article 06847 in lax")
            .with_last_seen(Some(Diagnostic::Text("Response code: 404".into())))
            .with_host(Some(HostInfo {
                host: "lax.example.org".into(),
                ip: Some("10.0.0.7".parse().unwrap()),
            }));
        let rendered = err.to_string();
        assert!(rendered.starts_with("Cannot find 'article 06847 in lax\nResponse code: 404"));
        assert!(rendered.contains("\nHost: lax.example.org\nIp: 10.0.0.7'; Giving up at "));
    }

    #[test]
    fn unrecoverable_response_shows_code_and_body() {
        let err = UnrecoverableError::response(None, 503, "upstream exploded");
        assert_eq!(
            err.to_string(),
            "RESPONSE CODE: 503\nRESPONSE BODY:\nupstream exploded\n"
        );
        assert_eq!(err.status(), Some(503));
    }

    #[test]
    fn only_config_errors_stop_a_load_session() {
        assert!(Error::assertion("no results").is_expected_during_load());
        assert!(Error::from(UnrecoverableError::message("boom")).is_expected_during_load());
        assert!(!Error::Config("missing journal_host".into()).is_expected_during_load());
    }
}
