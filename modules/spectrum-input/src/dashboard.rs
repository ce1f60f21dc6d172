use serde::Serialize;
use spectrum_http::RetryingClient;
use spectrum_poll::{Error, Result};
use tracing::info;

#[derive(Debug, Serialize)]
struct PublicationRequest<'a> {
    articles: [QueuedArticle<'a>; 1],
}

#[derive(Debug, Serialize)]
struct QueuedArticle<'a> {
    id: &'a str,
    version: u32,
    run: &'a str,
}

/// The dashboard's write side.
#[derive(Debug, Clone)]
pub struct Dashboard {
    host: String,
    user: String,
    password: String,
    http: RetryingClient,
}

impl Dashboard {
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        http: RetryingClient,
    ) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            password: password.into(),
            http,
        }
    }

    /// Press Publish for one version and run.
    pub async fn publish(&self, id: &str, version: u32, run: &str) -> Result<()> {
        let url = format!("{}/api/queue_article_publication", self.host);
        let body = PublicationRequest {
            articles: [QueuedArticle { id, version, run }],
        };
        let response = self
            .http
            .client()
            .post(&url)
            .basic_auth(&self.user, Some(&self.password))
            .json(&body)
            .send()
            .await
            .map_err(Error::http)?;
        let status = response.status().as_u16();
        if status != 200 {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::assertion(format!("Response status was {status}: {text}")));
        }
        info!(id, url = %url, version, run, "Pressed Publish on dashboard");
        Ok(())
    }
}
