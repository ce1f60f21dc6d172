use std::fmt;

use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION};
use serde_json::Value;
use spectrum_http::{HeaderMap, RetryingClient};
use spectrum_poll::{Diagnostic, Error, PollOutcome, Poller, Result};
use tracing::{debug, info};

use crate::check::transport_pending;

/// Condition on a single API item, e.g. the first search result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemCheck {
    /// The item has an image; when a URI is given its thumbnail must point at it.
    Image(Option<String>),
    /// Some text block of the item's content contains this string.
    Content(String),
}

impl ItemCheck {
    pub fn matches(&self, item: &Value) -> bool {
        match self {
            ItemCheck::Image(uri) => {
                let Some(image) = item.get("image") else {
                    return false;
                };
                match uri {
                    None => true,
                    Some(uri) => image["thumbnail"]["source"]["uri"] == uri.as_str(),
                }
            }
            ItemCheck::Content(contained) => item["content"]
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|block| block["text"].as_str())
                .any(|text| text.contains(contained.as_str())),
        }
    }
}

impl fmt::Display for ItemCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemCheck::Image(uri) => write!(f, "ItemCheckImage({})", uri.as_deref().unwrap_or("None")),
            ItemCheck::Content(contained) => write!(f, "ItemCheckContent(contained={contained})"),
        }
    }
}

/// The public API gateway, one method per endpoint family.
#[derive(Debug, Clone)]
pub struct ApiCheck {
    host: String,
    authorization: Option<String>,
    http: RetryingClient,
    poller: Poller,
}

impl ApiCheck {
    pub fn new(host: impl Into<String>, authorization: Option<String>, http: RetryingClient) -> Self {
        Self {
            host: host.into(),
            authorization,
            http,
            poller: Poller::from_env(),
        }
    }

    pub fn with_poller(self, poller: Poller) -> Self {
        Self { poller, ..self }
    }

    pub async fn labs_posts(&self) -> Result<Value> {
        self.list_api("/labs-posts", "labs-post").await
    }

    pub async fn subjects(&self) -> Result<Value> {
        self.list_api("/subjects", "subject").await
    }

    pub async fn podcast_episodes(&self) -> Result<Value> {
        self.list_api("/podcast-episodes", "podcast-episode").await
    }

    pub async fn podcast_episode(&self, number: u32) -> Result<Value> {
        self.item_api(&format!("/podcast-episodes/{number}"), "podcast-episode").await
    }

    pub async fn people(&self) -> Result<Value> {
        self.list_api("/people", "person").await
    }

    pub async fn medium_articles(&self) -> Result<Value> {
        self.list_api("/medium-articles", "medium-article").await
    }

    pub async fn blog_articles(&self) -> Result<Value> {
        self.list_api("/blog-articles", "blog-article").await
    }

    pub async fn blog_article(&self, id: &str) -> Result<Value> {
        self.item_api(&format!("/blog-articles/{id}"), "blog-article").await
    }

    pub async fn events(&self) -> Result<Value> {
        self.list_api("/events", "event").await
    }

    pub async fn interviews(&self) -> Result<Value> {
        self.list_api("/interviews", "interview").await
    }

    pub async fn collections(&self) -> Result<Value> {
        self.list_api("/collections", "collection").await
    }

    pub async fn profiles(&self) -> Result<Value> {
        self.list_api("/profiles", "profile").await
    }

    pub async fn profile(&self, id: &str) -> Result<Value> {
        self.item_api(&format!("/profiles/{id}"), "profile").await
    }

    pub async fn annotations(&self, profile_id: &str, access: &str) -> Result<Value> {
        self.list_api(
            &format!("/annotations?by={profile_id}&access={access}"),
            "annotation",
        )
        .await
    }

    pub async fn digests(&self) -> Result<Value> {
        self.list_api("/digests", "digest").await
    }

    pub async fn digest(&self, id: &str) -> Result<Value> {
        self.item_api(&format!("/digests/{id}"), "digest").await
    }

    /// Version `version` must be served both at its versioned URL and as the latest.
    pub async fn article(&self, id: &str, version: u32) -> Result<Value> {
        let versioned_url = format!("{}/articles/{id}/versions/{version}", self.host);
        let body = self.get_sane(&versioned_url, self.headers(None)).await?;
        if body["version"] != version {
            return Err(Error::assertion(format!(
                "Version in body {} not consistent with requested version {version}",
                body["version"]
            )));
        }
        info!(id, version, url = %versioned_url, "Found article version on api");

        let latest_url = format!("{}/articles/{id}", self.host);
        let body = self.get_sane(&latest_url, self.headers(None)).await?;
        if body["version"] != version {
            return Err(Error::assertion(format!(
                "Expected {latest_url} to be at version {version} now, found {}",
                body["version"]
            )));
        }
        info!(id, version, url = %latest_url, "Found latest article version on api");
        Ok(body)
    }

    /// Poll the latest article until it satisfies `item_check` and every
    /// `(field, value)` constraint. 404 counts as not there yet.
    pub async fn wait_article(
        &self,
        id: &str,
        item_check: Option<&ItemCheck>,
        constraints: &[(&str, Value)],
    ) -> Result<Value> {
        let latest_url = format!("{}/articles/{id}", self.host);
        let described: Vec<String> = constraints.iter().map(|(f, v)| format!("{f}={v}")).collect();
        self.poller
            .poll(
                || async {
                    let Some(body) = self.get_unless_missing(&latest_url).await? else {
                        return Ok(PollOutcome::pending_with(Diagnostic::status(latest_url.as_str(), 404)));
                    };
                    if let Some(check) = item_check {
                        if !check.matches(&body) {
                            return Ok(PollOutcome::pending_with(format!("{check} not satisfied")));
                        }
                    }
                    for (field, value) in constraints {
                        if body[*field] != *value {
                            debug!(url = %latest_url, field, expected = %value, actual = %body[*field], "Constraint not met");
                            return Ok(PollOutcome::pending_with(body));
                        }
                    }
                    info!(url = %latest_url, item_check = ?item_check.map(ToString::to_string), constraints = ?described, "Article present");
                    Ok(PollOutcome::Success(body))
                },
                format!("{latest_url} to satisfy constraints {described:?}"),
            )
            .await
    }

    pub async fn wait_digest(&self, id: &str, item_check: Option<&ItemCheck>) -> Result<Value> {
        let latest_url = format!("{}/digests/{id}", self.host);
        self.poller
            .poll(
                || async {
                    let Some(body) = self.get_unless_missing(&latest_url).await? else {
                        return Ok(PollOutcome::pending_with(Diagnostic::status(latest_url.as_str(), 404)));
                    };
                    if let Some(check) = item_check {
                        if !check.matches(&body) {
                            return Ok(PollOutcome::pending_with(format!("{check} not satisfied")));
                        }
                    }
                    info!(url = %latest_url, "Digest present");
                    Ok(PollOutcome::Success(body))
                },
                latest_url.clone(),
            )
            .await
    }

    pub async fn related_articles(&self, id: &str) -> Result<Value> {
        let url = format!("{}/articles/{id}/related", self.host);
        let body = self.get_sane(&url, self.headers(None)).await?;
        info!(id, url = %url, "Found related articles on api");
        Ok(body)
    }

    pub async fn search(&self, for_input: &str) -> Result<Value> {
        let url = format!("{}/search?for={for_input}", self.host);
        self.get_sane(&url, self.headers(None)).await
    }

    /// Poll a search until it has a result; `item_check` applies to the first one.
    pub async fn wait_search(&self, word: &str, item_check: Option<&ItemCheck>) -> Result<Value> {
        let search_url = format!("{}/search?for={word}", self.host);
        self.poller
            .poll(
                || async {
                    let response = match self.http.get(&search_url, &self.headers(None)).await {
                        Ok(response) => response,
                        Err(e) => return Ok(transport_pending(&search_url, e)),
                    };
                    let body = sane_response(response, &search_url).await?;
                    let items = body["items"].as_array().map(Vec::len).unwrap_or_default();
                    if items == 0 {
                        return Ok(PollOutcome::pending_with(body));
                    }
                    if let Some(check) = item_check {
                        if !check.matches(&body["items"][0]) {
                            return Ok(PollOutcome::pending_with(body["items"][0].clone()));
                        }
                    }
                    info!(url = %search_url, results = items, "Search returning results");
                    Ok(PollOutcome::Success(body))
                },
                format!("{search_url} returning at least 1 result"),
            )
            .await
    }

    pub async fn wait_recommendations(&self, id: &str) -> Result<Value> {
        let url = format!("{}/recommendations/article/{id}", self.host);
        let accept = vendor_type("recommendations");
        self.poller
            .poll(
                || async {
                    let body = self.get_sane(&url, self.headers(Some(&accept))).await?;
                    let items = body["items"].as_array().map(Vec::len).unwrap_or_default();
                    if items == 0 {
                        return Ok(PollOutcome::pending_with(body));
                    }
                    info!(url = %url, results = items, "Recommendations returning results");
                    Ok(PollOutcome::Success(body))
                },
                format!("{url} returning at least 1 result"),
            )
            .await
    }

    async fn list_api(&self, path: &str, entity: &str) -> Result<Value> {
        let url = format!("{}{path}", self.host);
        let accept = vendor_type(&format!("{entity}-list"));
        self.get_sane(&url, self.headers(Some(&accept))).await
    }

    async fn item_api(&self, path: &str, entity: &str) -> Result<Value> {
        let url = format!("{}{path}", self.host);
        let accept = vendor_type(entity);
        self.get_sane(&url, self.headers(Some(&accept))).await
    }

    async fn get_sane(&self, url: &str, headers: HeaderMap) -> Result<Value> {
        let response = self.http.get_once(url, &headers).await.map_err(Error::http)?;
        info!(url, status = response.status().as_u16(), "Loaded api");
        sane_response(response, url).await
    }

    /// `None` for a 404, the JSON body for a 200, an error otherwise.
    async fn get_unless_missing(&self, url: &str) -> Result<Option<Value>> {
        let response = self
            .http
            .get_once(url, &self.headers(None))
            .await
            .map_err(Error::http)?;
        if response.status().as_u16() == 404 {
            debug!(url, "404");
            return Ok(None);
        }
        sane_response(response, url).await.map(Some)
    }

    fn headers(&self, accept: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = self
            .authorization
            .as_deref()
            .and_then(|a| HeaderValue::from_str(a).ok())
        {
            headers.insert(AUTHORIZATION, value);
        }
        if let Some(value) = accept.and_then(|a| HeaderValue::from_str(a).ok()) {
            headers.insert(ACCEPT, value);
        }
        headers
    }
}

fn vendor_type(entity: &str) -> String {
    format!("application/vnd.elife.{entity}+json; version=1")
}

async fn sane_response(response: reqwest::Response, url: &str) -> Result<Value> {
    let status = response.status().as_u16();
    let body = response.text().await.map_err(Error::http)?;
    if status != 200 {
        return Err(Error::assertion(format!(
            "Response from {url} had status {status}, body {body}"
        )));
    }
    serde_json::from_str(&body)
        .map_err(|_| Error::parse(format!("Response from {url} is not JSON: {body}")))
}
