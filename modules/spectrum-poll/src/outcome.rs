use std::fmt;

/// Evidence of what a check last observed, attached to timeout errors.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    Text(String),
    Json(serde_json::Value),
    Status { url: String, status: u16 },
    /// Connection-level failure reaching `url`. Timeouts resolve its host.
    Transport { url: String, message: String },
}

impl Diagnostic {
    pub fn transport(url: impl Into<String>, err: impl fmt::Display) -> Self {
        Diagnostic::Transport {
            url: url.into(),
            message: err.to_string(),
        }
    }

    pub fn status(url: impl Into<String>, status: u16) -> Self {
        Diagnostic::Status {
            url: url.into(),
            status,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Text(text) => f.write_str(text),
            Diagnostic::Json(value) => {
                let pretty = serde_json::to_string_pretty(value).map_err(|_| fmt::Error)?;
                f.write_str(&pretty)
            }
            Diagnostic::Status { url, status } => write!(f, "Response code: {status} from {url}"),
            Diagnostic::Transport { url, message } => {
                write!(f, "Connection error on {url}: {message}")
            }
        }
    }
}

impl From<String> for Diagnostic {
    fn from(text: String) -> Self {
        Diagnostic::Text(text)
    }
}

impl From<&str> for Diagnostic {
    fn from(text: &str) -> Self {
        Diagnostic::Text(text.to_string())
    }
}

impl From<serde_json::Value> for Diagnostic {
    fn from(value: serde_json::Value) -> Self {
        Diagnostic::Json(value)
    }
}

/// Result of one observation: done, or not yet (optionally with evidence).
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T> {
    Success(T),
    Pending(Option<Diagnostic>),
}

impl<T> PollOutcome<T> {
    pub fn pending() -> Self {
        PollOutcome::Pending(None)
    }

    pub fn pending_with(diagnostic: impl Into<Diagnostic>) -> Self {
        PollOutcome::Pending(Some(diagnostic.into()))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PollOutcome::Success(_))
    }

    pub fn success(self) -> Option<T> {
        match self {
            PollOutcome::Success(value) => Some(value),
            PollOutcome::Pending(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> PollOutcome<U> {
        match self {
            PollOutcome::Success(value) => PollOutcome::Success(f(value)),
            PollOutcome::Pending(diagnostic) => PollOutcome::Pending(diagnostic),
        }
    }
}

impl<T> From<Option<T>> for PollOutcome<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => PollOutcome::Success(value),
            None => PollOutcome::Pending(None),
        }
    }
}
