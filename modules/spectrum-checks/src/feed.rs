use async_trait::async_trait;
use spectrum_http::{HeaderMap, RetryingClient};
use spectrum_poll::{Error, PollOutcome, Poller, Result, UnrecoverableError};
use tracing::{debug, info};

use crate::check::{transport_pending, wait_for, Check};

pub const DOI_PREFIX: &str = "https://dx.doi.org/10.7554/eLife.";

/// One entry of the latest-articles report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportItem {
    pub guid: String,
    pub title: Option<String>,
    pub link: Option<String>,
}

/// Walks the paginated latest-articles RSS report of the observer.
#[derive(Debug, Clone)]
pub struct ObserverCheck {
    host: String,
    http: RetryingClient,
    poller: Poller,
}

impl ObserverCheck {
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

    pub async fn latest_article(&self, id: &str) -> Result<ReportItem> {
        wait_for(self, &self.poller, &id.to_string()).await
    }

    fn page_url(&self, page: u32) -> String {
        format!("{}/report/latest-articles?per-page=100&page={page}", self.host)
    }
}

#[async_trait]
impl Check for ObserverCheck {
    type Query = String;
    type Found = ReportItem;

    fn describe(&self, id: &String) -> String {
        format!(
            "article with id {id} at {}",
            self.page_url(1).replace("page=1", "page=N")
        )
    }

    async fn observe(&self, id: &String) -> Result<PollOutcome<ReportItem>> {
        let target = format!("{DOI_PREFIX}{id}");
        let mut page = 1;
        loop {
            let url = self.page_url(page);
            let response = match self.http.get_once(&url, &HeaderMap::new()).await {
                Ok(response) => response,
                Err(e) => return Ok(transport_pending(&url, e)),
            };
            let status = response.status().as_u16();
            debug!(id = %id, url = %url, status, "Loaded report page");
            if status > 299 {
                let body = response.text().await.unwrap_or_default();
                return Err(UnrecoverableError::response(Some(url), status, body).into());
            }

            let bytes = response.bytes().await.map_err(Error::http)?;
            let items = report_items(&bytes)?;
            if items.is_empty() {
                return Ok(PollOutcome::pending_with(format!(
                    "{target} not found before empty page {page}"
                )));
            }
            if let Some(item) = items.iter().find(|item| item.guid == target) {
                info!(id = %id, url = %url, guid = %item.guid, "Found report item");
                return Ok(PollOutcome::Success(item.clone()));
            }
            debug!(id = %id, page, guids = ?items.iter().map(|i| &i.guid).collect::<Vec<_>>(), "Item not on page");
            page += 1;
        }
    }
}

/// Items of one RSS page, keyed by their guid.
pub fn report_items(rss: &[u8]) -> Result<Vec<ReportItem>> {
    let feed = feed_rs::parser::parse(rss).map_err(|e| Error::parse(format!("Report is not a feed: {e}")))?;
    Ok(feed
        .entries
        .into_iter()
        .map(|entry| ReportItem {
            guid: entry.id,
            title: entry.title.map(|t| t.content),
            link: entry.links.first().map(|l| l.href.clone()),
        })
        .collect())
}
