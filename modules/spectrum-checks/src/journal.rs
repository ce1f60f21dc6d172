use std::sync::Arc;

use reqwest::header::LOCATION;
use spectrum_http::{ClientOptions, HeaderMap, RetryPolicy, RetryingClient};
use spectrum_poll::{Error, Result};
use tracing::info;

use crate::resources::{
    build_url, page_resources, select_attr, select_href_with_text, ResourceCache, ResourceChecker,
    ResourceMethod,
};

pub const CSS_TEASER_LINK: &str = ".teaser__header_text_link";
pub const CSS_CAROUSEL_LINK: &str = ".carousel-item__title_link";
pub const CSS_BLOCK_LINK: &str = ".block-link .block-link__link";
/// Only present on pages rendered without JavaScript.
pub const CSS_ANNOTATION_LINK: &str = ".annotation-teaser";
pub const CSS_PAGER_LINK: &str = ".pager a";
pub const CSS_ASSET_VIEWER_DOWNLOAD_LINK: &str = ".asset-viewer-inline__download_all_link";
pub const CSS_DOWNLOAD_LINK: &str = "#downloads a";
pub const CSS_FIGURES_LINK: &str = "a.view-selector__link--figures";
pub const CSS_SUBJECT_LINK: &str = "a.content-header__subject_link";

const PDF_DOWNLOAD_TEXTS: [&str; 2] = ["Article PDF", "Figures PDF"];

/// A page after a successful load.
#[derive(Debug, Clone)]
pub struct LoadedPage {
    /// Final URL, after redirects.
    pub url: String,
    pub body: String,
}

/// Loads journal pages and asserts everything they embed loads too.
///
/// Configuration methods return new checkers; clones share one
/// [`ResourceCache`].
#[derive(Debug, Clone)]
pub struct JournalCheck {
    host: String,
    method: ResourceMethod,
    query_string: Option<String>,
    headers: HeaderMap,
    http: RetryingClient,
    no_redirects: RetryingClient,
    cache: Arc<ResourceCache>,
}

impl JournalCheck {
    pub fn new(host: impl Into<String>, policy: RetryPolicy, options: ClientOptions) -> Result<Self> {
        let http = RetryingClient::with_options(policy, options.clone()).map_err(Error::http)?;
        let no_redirects = RetryingClient::with_options(
            RetryPolicy::none(),
            ClientOptions {
                follow_redirects: false,
                ..options
            },
        )
        .map_err(Error::http)?;
        Ok(Self {
            host: host.into(),
            method: ResourceMethod::Head,
            query_string: None,
            headers: HeaderMap::new(),
            http,
            no_redirects,
            cache: Arc::new(ResourceCache::new()),
        })
    }

    pub fn with_resource_checking_method(&self, method: ResourceMethod) -> Self {
        Self {
            method,
            ..self.clone()
        }
    }

    pub fn with_query_string(&self, query_string: impl Into<String>) -> Self {
        Self {
            query_string: Some(query_string.into()),
            ..self.clone()
        }
    }

    pub fn with_headers(&self, headers: HeaderMap) -> Self {
        Self {
            headers,
            ..self.clone()
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    /// Load an article page, and its figures page when it should have one.
    pub async fn article(&self, id: &str, has_figures: bool, version: Option<u32>) -> Result<String> {
        let url = self.article_url(id, version)?;
        info!(id, url = %url, "Loading article");
        let body = self.generic(&url).await?;
        if has_figures {
            let figures_links = select_attr(&body, CSS_FIGURES_LINK, "href");
            let [figures_link] = figures_links.as_slice() else {
                return Err(Error::assertion(format!(
                    "Expected a single figures page link with selector {CSS_FIGURES_LINK}, found {figures_links:?}"
                )));
            };
            let figures_url = build_url(figures_link, &self.host)?;
            info!(id, url = %figures_url, "Loading figures page");
            self.generic(&figures_url).await?;
        }
        Ok(body)
    }

    /// Load an article page and assert it links exactly one subject.
    pub async fn article_only_subject(&self, id: &str, subject_id: &str, version: Option<u32>) -> Result<String> {
        let url = self.article_url(id, version)?;
        info!(id, url = %url, "Loading article");
        let body = self.generic(&url).await?;
        let subjects = select_attr(&body, CSS_SUBJECT_LINK, "href");
        let expected = vec![format!("/subjects/{subject_id}")];
        if subjects != expected {
            return Err(Error::assertion(format!(
                "Incorrect subjects {subjects:?} linked from article page {url} (expected subject id `{subject_id}`)"
            )));
        }
        Ok(body)
    }

    /// Teaser links of a search; `count` asserts how many there are.
    pub async fn search(&self, query: &str, count: Option<usize>) -> Result<Vec<String>> {
        let url = build_url(&format!("/search?for={query}"), &self.host)?;
        info!(url = %url, "Loading search");
        let body = self.generic(&url).await?;
        let teasers = select_attr(&body, CSS_TEASER_LINK, "href");
        if let Some(count) = count {
            if teasers.len() != count {
                return Err(Error::assertion(format!(
                    "There are {} search results instead of {count}",
                    teasers.len()
                )));
            }
        }
        Ok(teasers)
    }

    /// Carousel and teaser links of the homepage.
    pub async fn homepage(&self) -> Result<Vec<String>> {
        let body = self.generic("/").await?;
        let mut links = select_attr(&body, CSS_CAROUSEL_LINK, "href");
        links.extend(select_attr(&body, CSS_TEASER_LINK, "href"));
        Ok(links)
    }

    pub async fn magazine(&self) -> Result<String> {
        self.generic("/magazine").await
    }

    /// Teaser links and pager links of a listing page.
    pub async fn listing(&self, path: &str) -> Result<(Vec<String>, Vec<String>)> {
        let body = self.generic(path).await?;
        let teasers = select_attr(&body, CSS_TEASER_LINK, "href");
        let pages = select_attr(&body, CSS_PAGER_LINK, "href");
        info!(path, teasers = ?teasers, pages = ?pages, "Loaded listing");
        Ok((teasers, pages))
    }

    /// Links to the child listings of a listing of listings.
    pub async fn listing_of_listing(&self, path: &str) -> Result<Vec<String>> {
        let body = self.generic(path).await?;
        let links = select_attr(&body, CSS_BLOCK_LINK, "href");
        info!(path, links = ?links, "Loaded listing of listing");
        Ok(links)
    }

    /// Annotation links and pager links of a profile page.
    pub async fn profile(&self, path: &str) -> Result<(Vec<String>, Vec<String>)> {
        let body = self.generic(path).await?;
        let annotations = select_attr(&body, CSS_ANNOTATION_LINK, "data-in-context-uri");
        let pages = select_attr(&body, CSS_PAGER_LINK, "href");
        info!(path, annotations = ?annotations, pages = ?pages, "Loaded profile");
        Ok((annotations, pages))
    }

    pub async fn digest(&self, id: &str) -> Result<String> {
        let url = build_url(&format!("/digests/{id}"), &self.host)?;
        info!(id, url = %url, "Loading digest");
        self.generic(&url).await
    }

    /// Assert `path` answers `status` with a `Location` of `expected` on this host.
    pub async fn redirect(&self, path: &str, expected: &str, status: u16) -> Result<()> {
        let url = build_url(path, &self.host)?;
        info!(url = %url, "Loading redirect");
        let response = self
            .no_redirects
            .get_once(&url, &self.headers)
            .await
            .map_err(Error::http)?;
        assert_status(response.status().as_u16(), status, &url)?;

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        let expected_location = format!("{}{expected}", self.host);
        if location != expected_location {
            return Err(Error::assertion(format!(
                "{url} redirects to {location} instead of {expected_location}"
            )));
        }
        Ok(())
    }

    /// Load a page, and when it is served by the host under test assert
    /// all its resources and download links load.
    pub async fn generic(&self, path: &str) -> Result<String> {
        let page = self.just_load(path).await?;
        let checker = self.resource_checker();
        if page.url.starts_with(&self.host) {
            checker.assert_all_load(&page_resources(&page.body)).await?;
        }
        let downloads = download_links(&page.body);
        info!(downloads = ?downloads, "Found download links");
        checker.assert_all_load(&downloads).await?;
        Ok(page.body)
    }

    /// Load a page with the retrying client and assert it answers 200.
    pub async fn just_load(&self, path: &str) -> Result<LoadedPage> {
        let mut url = build_url(path, &self.host)?;
        if let Some(query_string) = &self.query_string {
            let separator = if url.contains('?') { '&' } else { '?' };
            url = format!("{url}{separator}{query_string}");
        }
        info!(url = %url, "Loading");
        let response = self.http.get(&url, &self.headers).await.map_err(Error::http)?;
        assert_status(response.status().as_u16(), 200, &url)?;
        let final_url = response.url().to_string();
        let body = response.text().await.map_err(Error::http)?;
        Ok(LoadedPage {
            url: final_url,
            body,
        })
    }

    fn article_url(&self, id: &str, version: Option<u32>) -> Result<String> {
        let url = build_url(&format!("/articles/{id}"), &self.host)?;
        Ok(match version {
            Some(version) => format!("{url}v{version}"),
            None => url,
        })
    }

    fn resource_checker(&self) -> ResourceChecker<'_> {
        ResourceChecker {
            http: &self.http,
            cache: &self.cache,
            host: &self.host,
            method: self.method,
        }
    }
}

/// Figure download-all links plus the article and figures PDF links.
pub fn download_links(html: &str) -> Vec<String> {
    let mut links = select_attr(html, CSS_ASSET_VIEWER_DOWNLOAD_LINK, "href");
    links.extend(select_href_with_text(html, CSS_DOWNLOAD_LINK, &PDF_DOWNLOAD_TEXTS));
    links
}

fn assert_status(actual: u16, expected: u16, url: &str) -> Result<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(Error::assertion(format!(
            "{url} responded with {actual} instead of {expected}"
        )))
    }
}
