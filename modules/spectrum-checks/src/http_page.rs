use async_trait::async_trait;
use spectrum_http::{HeaderMap, RetryingClient};
use spectrum_poll::{Diagnostic, PollOutcome, Poller, Result};
use tracing::{debug, info};

use crate::check::{fill_template, transport_pending, wait_for, Check, Fields};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentQuery {
    pub url: String,
    /// Substring the body must contain, when set.
    pub text_match: Option<String>,
}

/// Polls a templated URL until it answers 200, optionally with a given text.
#[derive(Debug, Clone)]
pub struct HttpCheck {
    url: String,
    http: RetryingClient,
    poller: Poller,
}

impl HttpCheck {
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

    pub async fn of(&self, fields: Fields, text_match: Option<&str>) -> Result<()> {
        let query = ContentQuery {
            url: fill_template(&self.url, &fields)?,
            text_match: text_match.map(str::to_string),
        };
        wait_for(self, &self.poller, &query).await
    }
}

#[async_trait]
impl Check for HttpCheck {
    type Query = ContentQuery;
    type Found = ();

    fn describe(&self, query: &ContentQuery) -> String {
        match &query.text_match {
            Some(text) => format!("URL {} with text matching `{text}`", query.url),
            None => format!("URL {}", query.url),
        }
    }

    async fn observe(&self, query: &ContentQuery) -> Result<PollOutcome<()>> {
        content_present(&self.http, &query.url, query.text_match.as_deref()).await
    }
}

/// Polls for an article XML file in a GitHub repository.
#[derive(Debug, Clone)]
pub struct GithubCheck {
    /// Must contain a `{path}` placeholder for the file path.
    repo_url: String,
    http: RetryingClient,
    poller: Poller,
}

impl GithubCheck {
    pub fn new(repo_url: impl Into<String>, http: RetryingClient) -> Self {
        Self {
            repo_url: repo_url.into(),
            http,
            poller: Poller::from_env(),
        }
    }

    pub fn with_poller(self, poller: Poller) -> Self {
        Self { poller, ..self }
    }

    pub async fn article(&self, id: &str, version: u32, text_match: Option<&str>) -> Result<()> {
        let path = format!("/articles/elife-{id}-v{version}.xml");
        let query = ContentQuery {
            url: fill_template(&self.repo_url, &Fields::new().with("path", path))?,
            text_match: text_match.map(str::to_string),
        };
        wait_for(self, &self.poller, &query).await
    }
}

#[async_trait]
impl Check for GithubCheck {
    type Query = ContentQuery;
    type Found = ();

    fn describe(&self, query: &ContentQuery) -> String {
        match &query.text_match {
            Some(text) => format!("article on github with URL {} existing and matching {text}", query.url),
            None => format!("article on github with URL {} existing", query.url),
        }
    }

    async fn observe(&self, query: &ContentQuery) -> Result<PollOutcome<()>> {
        content_present(&self.http, &query.url, query.text_match.as_deref()).await
    }
}

async fn content_present(
    http: &RetryingClient,
    url: &str,
    text_match: Option<&str>,
) -> Result<PollOutcome<()>> {
    let response = match http.get_once(url, &HeaderMap::new()).await {
        Ok(response) => response,
        Err(e) => return Ok(transport_pending(url, e)),
    };
    let status = response.status().as_u16();
    if status != 200 {
        debug!(url, status, "GET not ready yet");
        return Ok(PollOutcome::pending_with(Diagnostic::status(url, status)));
    }

    let Some(text) = text_match else {
        info!(url, "GET with status 200");
        return Ok(PollOutcome::Success(()));
    };
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => return Ok(transport_pending(url, e)),
    };
    if body.contains(text) {
        info!(url, text, "Body matches");
        Ok(PollOutcome::Success(()))
    } else {
        debug!(url, text, "Body does not match yet");
        Ok(PollOutcome::pending_with(format!("Body of {url} does not contain `{text}`")))
    }
}
