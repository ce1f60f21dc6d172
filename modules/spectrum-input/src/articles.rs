//! Lifecycle actions for generated articles: ingest, wait, publish, correct.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use spectrum_checks::{Catalog, Fields, ObjectStoreListing, RunFilter};
use spectrum_common::Settings;
use spectrum_generator::ArticleZip;
use spectrum_http::{ClientOptions, RetryPolicy, RetryingClient};
use spectrum_poll::{Error, Result};
use tracing::info;

use crate::bucket::InputBucket;
use crate::dashboard::Dashboard;

/// Everything an end-to-end article test drives: where packages go in and
/// which checks prove they came out.
pub struct Articles {
    pub catalog: Catalog,
    pub production: InputBucket,
    pub silent_corrections: InputBucket,
    pub dashboard: Dashboard,
}

impl Articles {
    pub fn new(
        catalog: Catalog,
        production: InputBucket,
        silent_corrections: InputBucket,
        dashboard: Dashboard,
    ) -> Self {
        Self {
            catalog,
            production,
            silent_corrections,
            dashboard,
        }
    }

    /// Wire the catalog, input buckets and dashboard of one environment.
    /// `listing` must hold a store for every bucket the settings name.
    pub fn from_settings(settings: &Settings, listing: ObjectStoreListing) -> Result<Self> {
        let production = InputBucket::from_listing(&listing, &settings.bucket_input)?;
        let silent_corrections = InputBucket::from_listing(&listing, &settings.bucket_silent_corrections)?;
        let http = RetryingClient::with_options(
            RetryPolicy::none(),
            ClientOptions {
                accept_invalid_certs: settings.accept_invalid_certs,
                ..ClientOptions::default()
            },
        )
        .map_err(Error::http)?;
        let dashboard = Dashboard::new(
            &settings.dashboard_host,
            &settings.dashboard_user,
            &settings.dashboard_password,
            http,
        );
        let catalog = Catalog::from_settings(settings, Arc::new(listing))?;
        Ok(Self::new(catalog, production, silent_corrections, dashboard))
    }

    pub async fn ingest(&self, article: &ArticleZip) -> Result<()> {
        self.production
            .upload(article.filename(), None, Some(article.id()))
            .await
            .map(|_| ())
    }

    /// Wait for the run started after `run_after` to be ready to publish and
    /// for its assets to reach the CDN and the API. Returns the run id.
    pub async fn wait_for_publishable(&self, article: &ArticleZip, run_after: DateTime<Utc>) -> Result<String> {
        let id = article.id();
        let version = article.version();
        let on_dashboard = self
            .catalog
            .dashboard
            .ready_to_publish(id, version, RunFilter::StartedAfter(run_after))
            .await?;
        let run = last_run_id(&on_dashboard, version)?;

        let fields = || Fields::new().with("id", id).with("version", version);
        for figure_name in article.figure_names() {
            self.catalog
                .images_published_cdn_bucket
                .of(fields().with("figure_name", figure_name))
                .await?;
        }
        self.catalog.xml_published_cdn_bucket.of(fields()).await?;
        if article.has_pdf() {
            self.catalog.pdf_published_cdn_bucket.of(fields()).await?;
        }
        self.catalog.api_super_user.article(id, version).await?;
        info!(id, version, run = %run, "Article is publishable");
        Ok(run)
    }

    pub async fn publish(&self, article: &ArticleZip, run: &str) -> Result<()> {
        self.dashboard.publish(article.id(), article.version(), run).await
    }

    pub async fn feed_silent_correction(&self, article: &ArticleZip) -> Result<()> {
        self.silent_corrections
            .upload(article.filename(), None, Some(article.id()))
            .await
            .map(|_| ())
    }
}

/// `run-id` of the highest-numbered run of `version`.
pub fn last_run_id(article: &Value, version: u32) -> Result<String> {
    let runs = article["versions"][version.to_string()]["runs"]
        .as_object()
        .ok_or_else(|| Error::parse(format!("No runs for version {version} on dashboard")))?;
    let (_, run) = runs
        .iter()
        .filter_map(|(number, run)| number.parse::<u32>().ok().map(|n| (n, run)))
        .max_by_key(|(n, _)| *n)
        .ok_or_else(|| Error::parse(format!("No numbered runs for version {version} on dashboard")))?;
    run["run-id"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| Error::parse(format!("Run without run-id for version {version}: {run}")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn picks_the_highest_numbered_run() {
        let article = json!({"versions": {"1": {"runs": {
            "2": {"run-id": "second"},
            "10": {"run-id": "tenth"},
            "9": {"run-id": "ninth"}
        }}}});
        assert_eq!(last_run_id(&article, 1).unwrap(), "tenth");
        assert!(matches!(last_run_id(&article, 2), Err(Error::Parse(_))));
    }
}
