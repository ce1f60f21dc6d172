//! Integrity of everything a page embeds: images, scripts, stylesheets, media.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{LazyLock, Mutex};

use futures::stream::{self, StreamExt};
use regex::Regex;
use scraper::{Html, Selector};
use spectrum_http::{RetryingClient, HTTP_TIMEOUT};
use spectrum_poll::{Error, Result};
use tracing::{debug, warn};

/// Parallel requests per page.
pub const RESOURCE_WORKERS: usize = 2;

const IGNORED_LINK_RELS: [&str; 4] = ["canonical", "next", "prev", "shortlink"];

static SRCSET_DESCRIPTOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" \d+(\.\d+)?[wx],?").expect("valid srcset descriptor regex"));

/// How embedded resources are requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResourceMethod {
    #[default]
    Head,
    Get,
}

impl fmt::Display for ResourceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceMethod::Head => f.write_str("HEAD"),
            ResourceMethod::Get => f.write_str("GET"),
        }
    }
}

/// URLs already seen loading successfully. Only consulted for HEAD checks.
#[derive(Debug, Default)]
pub struct ResourceCache {
    loaded: Mutex<HashMap<String, u16>>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.lock().contains_key(url)
    }

    pub fn record(&self, url: &str, status: u16) {
        self.lock().insert(url.to_string(), status);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, u16>> {
        // a poisoned cache only ever lost an insert
        self.loaded.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Candidate URLs of a `srcset` attribute, without width/density descriptors.
pub fn srcset_values(srcset: &str) -> Vec<String> {
    SRCSET_DESCRIPTOR
        .replace_all(srcset, " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Every resource a page embeds, deduplicated and sorted.
pub fn page_resources(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut resources = BTreeSet::new();

    for img in select(&document, "img") {
        if let Some(src) = img.attr("src") {
            resources.insert(src.to_string());
        }
        if let Some(srcset) = img.attr("srcset") {
            resources.extend(srcset_values(srcset));
        }
    }
    for script in select(&document, "script[src]") {
        if let Some(src) = script.attr("src") {
            resources.insert(src.to_string());
        }
    }
    for link in select(&document, "link") {
        let rel = link.attr("rel").unwrap_or_default().split_whitespace().collect::<Vec<_>>().join(" ");
        if IGNORED_LINK_RELS.contains(&rel.as_str()) {
            continue;
        }
        if let Some(href) = link.attr("href") {
            resources.insert(href.to_string());
        }
    }
    for video in select(&document, "video") {
        if let Some(poster) = video.attr("poster") {
            resources.insert(poster.to_string());
        }
    }
    for source in select(&document, "source") {
        if let Some(srcset) = source.attr("srcset") {
            resources.extend(srcset_values(srcset));
        }
    }

    resources.into_iter().collect()
}

fn select(document: &Html, css: &str) -> Vec<scraper::node::Element> {
    match Selector::parse(css) {
        Ok(selector) => document.select(&selector).map(|el| el.value().clone()).collect(),
        Err(_) => Vec::new(),
    }
}

/// Values of `attr` on every element matching `css`.
pub fn select_attr(html: &str, css: &str, attr: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse(css) else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter_map(|el| el.value().attr(attr).map(str::to_string))
        .collect()
}

/// `href` of every anchor matching `css` whose text is one of `texts`.
pub fn select_href_with_text(html: &str, css: &str, texts: &[&str]) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse(css) else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter(|el| {
            let text: String = el.text().collect();
            texts.contains(&text.trim())
        })
        .filter_map(|el| el.value().attr("href").map(str::to_string))
        .collect()
}

/// Absolute URL for a path found on a page of `host`.
pub fn build_url(path: &str, host: &str) -> Result<String> {
    if path.starts_with("http://") || path.starts_with("https://") {
        return Ok(path.to_string());
    }
    if let Some(rest) = path.strip_prefix("//") {
        let scheme = host.split("://").next().unwrap_or("https");
        return Ok(format!("{scheme}://{rest}"));
    }
    if path.starts_with('/') {
        return Ok(format!("{host}{path}"));
    }
    Err(Error::assertion(format!(
        "Found a non-absolute path {path} and cannot tell how to load it"
    )))
}

/// Loads resources on behalf of one host, remembering what already worked.
#[derive(Debug, Clone)]
pub struct ResourceChecker<'a> {
    pub http: &'a RetryingClient,
    pub cache: &'a ResourceCache,
    pub host: &'a str,
    pub method: ResourceMethod,
}

impl ResourceChecker<'_> {
    /// Request every resource and fail with all the broken ones at once.
    pub async fn assert_all_load(&self, resources: &[String]) -> Result<()> {
        let mut failures = Vec::new();
        let mut urls = Vec::new();

        for path in resources {
            if path.starts_with("data:") {
                debug!(path = %path.chars().take(40).collect::<String>(), "Skipping data: resource");
                continue;
            }
            let url = match build_url(path, self.host) {
                Ok(url) => url,
                Err(e) => {
                    failures.push(e.to_string());
                    continue;
                }
            };
            if self.method == ResourceMethod::Head && self.cache.contains(&url) {
                debug!(url = %url, "Cached resource");
                continue;
            }
            if !urls.contains(&url) {
                urls.push(url);
            }
        }

        let requests = stream::iter(urls)
            .map(|url| async move {
                let outcome = self.load(&url).await;
                (url, outcome)
            })
            .buffer_unordered(RESOURCE_WORKERS)
            .collect::<Vec<_>>();

        let results = match tokio::time::timeout(HTTP_TIMEOUT, requests).await {
            Ok(results) => results,
            Err(_) => {
                return Err(Error::assertion(format!(
                    "Resources of {} did not finish loading within {}s",
                    self.host,
                    HTTP_TIMEOUT.as_secs()
                )))
            }
        };

        for (url, outcome) in results {
            match outcome {
                Ok(200) => self.cache.record(&url, 200),
                Ok(status) => failures.push(format!("{url} responded with {status} instead of 200")),
                Err(e) => failures.push(format!("{url} could not be loaded: {e}")),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            failures.sort();
            Err(Error::assertion(format!(
                "{} resources of {} failed to load:\n{}",
                failures.len(),
                self.host,
                failures.join("\n")
            )))
        }
    }

    async fn load(&self, url: &str) -> std::result::Result<u16, reqwest::Error> {
        debug!(method = %self.method, url, "Loading resource");
        let request = match self.method {
            ResourceMethod::Head => self.http.client().head(url),
            ResourceMethod::Get => self.http.client().get(url),
        };
        let status = request.send().await?.status().as_u16();
        if status != 504 {
            return Ok(status);
        }
        warn!(method = %self.method, url, "Loading resource again due to 504 timeout");
        Ok(self.http.client().get(url).send().await?.status().as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srcset_descriptors_are_stripped() {
        assert_eq!(
            srcset_values("/a.jpg 1x, /b.jpg 2x"),
            vec!["/a.jpg".to_string(), "/b.jpg".to_string()]
        );
        assert_eq!(
            srcset_values("/small.jpg 480w,/large.jpg 1.5x"),
            vec!["/small.jpg".to_string(), "/large.jpg".to_string()]
        );
    }

    #[test]
    fn collects_embedded_resources_but_not_navigation_links() {
        let html = r#"<html><head>
            <link rel="stylesheet" href="/assets/app.css">
            <link rel="canonical" href="https://journal/articles/1">
            <link rel="next" href="/listing?page=2">
            <script src="/assets/app.js"></script>
            <script>inline()</script>
        </head><body>
            <img src="/img/a.jpg" srcset="/img/a.jpg 1x, /img/a@2x.jpg 2x">
            <img src="data:image/png;base64,AAAA">
            <video poster="/video/poster.jpg"></video>
            <picture><source srcset="/img/b.webp 800w"></picture>
        </body></html>"#;

        assert_eq!(
            page_resources(html),
            vec![
                "/assets/app.css",
                "/assets/app.js",
                "/img/a.jpg",
                "/img/a@2x.jpg",
                "/img/b.webp",
                "/video/poster.jpg",
                "data:image/png;base64,AAAA",
            ]
        );
    }

    #[test]
    fn builds_urls_for_absolute_and_scheme_relative_paths() {
        let host = "https://journal.example.org";
        assert_eq!(build_url("/about", host).unwrap(), "https://journal.example.org/about");
        assert_eq!(build_url("http://cdn.example.org/x.js", host).unwrap(), "http://cdn.example.org/x.js");
        assert_eq!(build_url("//cdn.example.org/x.js", host).unwrap(), "https://cdn.example.org/x.js");
        assert!(matches!(build_url("relative.js", host), Err(Error::Assertion(_))));
    }

    #[test]
    fn cache_remembers_successes() {
        let cache = ResourceCache::new();
        assert!(cache.is_empty());
        cache.record("https://journal/a.css", 200);
        assert!(cache.contains("https://journal/a.css"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn selects_anchors_by_text() {
        let html = r#"<div id="downloads"><a href="/a.pdf">Article PDF</a><a href="/b.ris">RIS</a></div>"#;
        assert_eq!(
            select_href_with_text(html, "#downloads a", &["Article PDF", "Figures PDF"]),
            vec!["/a.pdf".to_string()]
        );
    }
}
