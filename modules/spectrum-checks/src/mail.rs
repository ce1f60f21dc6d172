use async_trait::async_trait;
use serde::Deserialize;
use spectrum_http::{HeaderMap, RetryingClient};
use spectrum_poll::{Diagnostic, Error, PollOutcome, Poller, Result};
use tracing::info;

use crate::check::{transport_pending, wait_for, Check};

/// A message captured by mailcatcher.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MailMessage {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub recipients: Vec<String>,
    pub subject: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Emails sent by the bot, as seen by a mailcatcher instance.
#[derive(Debug, Clone)]
pub struct MailcatcherCheck {
    url: String,
    http: RetryingClient,
    poller: Poller,
}

impl MailcatcherCheck {
    pub fn new(url: impl Into<String>, http: RetryingClient) -> Self {
        Self {
            url: url.into(),
            http,
            poller: Poller::from_env(),
        }
    }

    pub fn with_poller(self, poller: Poller) -> Self {
        Self { poller, ..self }
    }

    /// Messages whose subject is exactly `subject`, once there is at least one.
    pub async fn wait_email(&self, subject: &str) -> Result<Vec<MailMessage>> {
        let matching = wait_for(self, &self.poller, &subject.to_string()).await?;
        info!(subject, count = matching.len(), "Found matching messages");
        Ok(matching)
    }
}

#[async_trait]
impl Check for MailcatcherCheck {
    type Query = String;
    type Found = Vec<MailMessage>;

    fn describe(&self, subject: &String) -> String {
        format!("email with subject {subject}")
    }

    async fn observe(&self, subject: &String) -> Result<PollOutcome<Vec<MailMessage>>> {
        let url = format!("{}/messages", self.url);
        let response = match self.http.get_once(&url, &HeaderMap::new()).await {
            Ok(response) => response,
            Err(e) => return Ok(transport_pending(&url, e)),
        };
        let status = response.status().as_u16();
        if status != 200 {
            return Ok(PollOutcome::pending_with(Diagnostic::status(url, status)));
        }
        let messages: Vec<MailMessage> = response.json().await.map_err(Error::parse)?;
        let matching: Vec<MailMessage> = messages
            .iter()
            .filter(|m| &m.subject == subject)
            .cloned()
            .collect();
        if matching.is_empty() {
            let subjects: Vec<&str> = messages.iter().map(|m| m.subject.as_str()).collect();
            return Ok(PollOutcome::pending_with(format!("Subjects seen: {subjects:?}")));
        }
        Ok(PollOutcome::Success(matching))
    }
}
