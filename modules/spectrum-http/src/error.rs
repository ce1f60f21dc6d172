use thiserror::Error;

pub type Result<T> = std::result::Result<T, HttpError>;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Client build error: {0}")]
    Build(String),
}

impl HttpError {
    /// Connection-level failures (refused, reset, DNS, timeouts).
    pub fn is_transport(&self) -> bool {
        matches!(self, HttpError::Network(_))
    }
}

impl From<reqwest::Error> for HttpError {
    fn from(err: reqwest::Error) -> Self {
        HttpError::Network(err.to_string())
    }
}
