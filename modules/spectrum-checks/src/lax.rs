use async_trait::async_trait;
use serde_json::Value;
use spectrum_http::{HeaderMap, RetryingClient};
use spectrum_poll::{Diagnostic, Error, PollOutcome, Poller, Result, UnrecoverableError};
use tracing::info;

use crate::check::{transport_pending, wait_for, Check};

/// Article versions as stored by the article store (lax).
#[derive(Debug, Clone)]
pub struct LaxArticleCheck {
    host: String,
    http: RetryingClient,
    poller: Poller,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaxQuery {
    pub id: String,
    pub version: u32,
}

impl LaxArticleCheck {
    pub fn new(host: impl Into<String>, http: RetryingClient) -> Self {
        Self {
            host: host.into(),
            http,
            poller: Poller::from_env(),
        }
    }

    pub fn with_poller(self, poller: Poller) -> Self {
        Self { poller, ..self }
    }

    pub async fn published(&self, id: &str, version: u32) -> Result<Value> {
        let query = LaxQuery {
            id: id.to_string(),
            version,
        };
        wait_for(self, &self.poller, &query).await
    }

    fn version_url(&self, query: &LaxQuery) -> String {
        format!(
            "{}/api/v2/articles/{}/versions/{}",
            self.host, query.id, query.version
        )
    }
}

#[async_trait]
impl Check for LaxArticleCheck {
    type Query = LaxQuery;
    type Found = Value;

    fn describe(&self, query: &LaxQuery) -> String {
        format!(
            "article version {} in lax: {}",
            query.version,
            self.version_url(query)
        )
    }

    async fn observe(&self, query: &LaxQuery) -> Result<PollOutcome<Value>> {
        let url = self.version_url(query);
        let response = match self.http.get_once(&url, &HeaderMap::new()).await {
            Ok(response) => response,
            Err(e) => return Ok(transport_pending(&url, e)),
        };

        let status = response.status().as_u16();
        if status >= 500 {
            let body = response.text().await.unwrap_or_default();
            return Err(UnrecoverableError::response(Some(url), status, body).into());
        }
        if status != 200 {
            return Ok(PollOutcome::pending_with(Diagnostic::status(url, status)));
        }
        let body: Value = response.json().await.map_err(Error::parse)?;
        info!(id = %query.id, version = query.version, url = %url, "Found article version in lax");
        Ok(PollOutcome::Success(body))
    }
}
