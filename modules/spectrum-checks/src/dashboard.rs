use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use spectrum_http::RetryingClient;
use spectrum_poll::{Diagnostic, Error, PollOutcome, Poller, Result, UnrecoverableError};
use tracing::info;

use crate::check::{transport_pending, wait_for, Check};

pub const READY_TO_PUBLISH: &str = "ready to publish";
pub const PUBLISHED: &str = "published";
pub const PUBLICATION_IN_PROGRESS: &str = "publication in progress";

/// Which run of a version the caller is interested in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RunFilter {
    /// The only run of the version.
    #[default]
    Any,
    RunId(String),
    /// The run whose first event happened at or after this instant.
    StartedAfter(DateTime<Utc>),
}

impl fmt::Display for RunFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunFilter::Any => f.write_str("any run"),
            RunFilter::RunId(run) => write!(f, "run {run}"),
            RunFilter::StartedAfter(after) => write!(f, "run started after {after}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardQuery {
    pub id: String,
    pub version: u32,
    pub status: String,
    pub run: RunFilter,
    /// Event types the selected run must already contain.
    pub required_events: Vec<String>,
}

/// Watches article versions and their workflow runs on the publishing dashboard.
#[derive(Debug, Clone)]
pub struct DashboardArticleCheck {
    host: String,
    user: String,
    password: String,
    http: RetryingClient,
    poller: Poller,
}

impl DashboardArticleCheck {
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
            poller: Poller::from_env(),
        }
    }

    pub fn with_poller(self, poller: Poller) -> Self {
        Self { poller, ..self }
    }

    /// Waits for the version to be ready to publish in the selected run.
    ///
    /// The dashboard keeps showing "ready to publish" from a previous run
    /// while a new run is ingested, so the run must also have reached the
    /// `Ready To Publish` event.
    pub async fn ready_to_publish(&self, id: &str, version: u32, run: RunFilter) -> Result<Value> {
        let article = self
            .wait_for_status(id, version, READY_TO_PUBLISH, run, vec!["Ready To Publish".to_string()])
            .await?;
        let current_version = &article["versions"][version.to_string()];
        let preview_link = current_version["details"]["preview-link"].as_str().unwrap_or_default();
        if preview_link.is_empty() {
            return Err(Error::assertion(format!(
                "Article {id} version {version} must have a preview-link:\n{current_version}"
            )));
        }
        info!(id, preview_link, "Found preview-link on dashboard");
        Ok(article)
    }

    pub async fn published(&self, id: &str, version: u32, run: RunFilter) -> Result<Value> {
        self.wait_for_status(id, version, PUBLISHED, run, Vec::new()).await
    }

    pub async fn publication_in_progress(&self, id: &str, version: u32, run: RunFilter) -> Result<Value> {
        self.wait_for_status(id, version, PUBLICATION_IN_PROGRESS, run, Vec::new())
            .await
    }

    /// Waits until the last event of run `run` (the runs map key) is an error.
    pub async fn error(&self, id: &str, version: u32, run: u32) -> Result<Value> {
        let url = self.article_api(id);
        self.poller
            .poll(
                || self.last_event_error(&url, id, version, run),
                format!(
                    "having the last event as an error on the article version {version} on dashboard: {url}"
                ),
            )
            .await
    }

    async fn wait_for_status(
        &self,
        id: &str,
        version: u32,
        status: &str,
        run: RunFilter,
        required_events: Vec<String>,
    ) -> Result<Value> {
        let query = DashboardQuery {
            id: id.to_string(),
            version,
            status: status.to_string(),
            run,
            required_events,
        };
        wait_for(self, &self.poller, &query).await
    }

    fn article_api(&self, id: &str) -> String {
        format!("{}/api/article/{id}", self.host)
    }

    /// One authenticated GET of the article document. `Ok(Err(_))` is a
    /// pending outcome the caller should return as-is.
    async fn fetch(&self, url: &str) -> Result<std::result::Result<Value, PollOutcome<Value>>> {
        let response = match self
            .http
            .client()
            .get(url)
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Ok(Err(transport_pending(url, e))),
        };

        let status = response.status().as_u16();
        if status >= 500 {
            let body = response.text().await.unwrap_or_default();
            return Err(UnrecoverableError::response(Some(url.to_string()), status, body).into());
        }
        if status != 200 {
            return Ok(Err(PollOutcome::pending_with(Diagnostic::status(url, status))));
        }
        match response.json::<Value>().await {
            Ok(article) => Ok(Ok(article)),
            Err(e) => Err(Error::parse(format!("Dashboard response from {url}: {e}"))),
        }
    }

    async fn last_event_error(
        &self,
        url: &str,
        id: &str,
        version: u32,
        run: u32,
    ) -> Result<PollOutcome<Value>> {
        let article = match self.fetch(url).await? {
            Ok(article) => article,
            Err(pending) => return Ok(pending),
        };
        let Some(last_event) = article["versions"][version.to_string()]["runs"][run.to_string()]
            ["events"]
            .as_array()
            .and_then(|events| events.last())
        else {
            return Ok(PollOutcome::pending_with(article.clone()));
        };
        info!(id, version, run, last_event = %last_event, "Found last event on dashboard");
        if last_event["event-status"] == "error" {
            Ok(PollOutcome::Success(last_event.clone()))
        } else {
            Ok(PollOutcome::pending_with(last_event.clone()))
        }
    }
}

#[async_trait]
impl Check for DashboardArticleCheck {
    type Query = DashboardQuery;
    type Found = Value;

    fn describe(&self, query: &DashboardQuery) -> String {
        format!(
            "article version {} in status {} on dashboard ({}): {}",
            query.version,
            query.status,
            query.run,
            self.article_api(&query.id)
        )
    }

    async fn observe(&self, query: &DashboardQuery) -> Result<PollOutcome<Value>> {
        let url = self.article_api(&query.id);
        let article = match self.fetch(&url).await? {
            Ok(article) => article,
            Err(pending) => return Ok(pending),
        };

        let run = match extract_run(&article, query)? {
            PollOutcome::Success(run) => run,
            PollOutcome::Pending(diagnostic) => return Ok(PollOutcome::Pending(diagnostic)),
        };
        info!(
            id = %query.id,
            version = query.version,
            status = %query.status,
            run = %run["run-id"],
            required_events = ?query.required_events,
            "Found article version on dashboard"
        );
        Ok(PollOutcome::Success(article))
    }
}

/// Navigate version → run and decide whether the article is where the query wants it.
///
/// Returns the selected run on success; on pending, the innermost document
/// that was inspected.
pub fn extract_run(article: &Value, query: &DashboardQuery) -> Result<PollOutcome<Value>> {
    let Some(version) = article
        .get("versions")
        .and_then(|versions| versions.get(query.version.to_string()))
    else {
        return Ok(PollOutcome::pending_with(article.clone()));
    };

    let details = &version["details"];
    if !is_truthy(&details["preview-link"]) {
        return Ok(PollOutcome::pending_with(version.clone()));
    }
    if details["publication-status"] != query.status.as_str() {
        return Ok(PollOutcome::pending_with(version.clone()));
    }

    let Some(run) = select_run(version, &query.run)? else {
        return Ok(PollOutcome::pending_with(version.clone()));
    };

    // A run that failed never reaches its required events.
    let errors: Vec<&Value> = events(run)
        .iter()
        .filter(|event| event["event-status"] == "error")
        .collect();
    if !errors.is_empty() {
        let errors = serde_json::to_string_pretty(&errors)?;
        return Err(UnrecoverableError::message(format!(
            "At least one error event was reported for the run.\n{errors}"
        ))
        .into());
    }

    let event_types: Vec<&str> = events(run)
        .iter()
        .filter_map(|event| event["event-type"].as_str())
        .collect();
    if !query
        .required_events
        .iter()
        .all(|required| event_types.contains(&required.as_str()))
    {
        return Ok(PollOutcome::pending_with(run.clone()));
    }

    Ok(PollOutcome::Success(run.clone()))
}

fn select_run<'a>(version: &'a Value, filter: &RunFilter) -> Result<Option<&'a Value>> {
    let runs: Vec<&Value> = version["runs"]
        .as_object()
        .map(|runs| runs.values().collect())
        .unwrap_or_default();

    let matching: Vec<&Value> = match filter {
        RunFilter::Any => runs,
        RunFilter::RunId(run_id) => runs
            .into_iter()
            .filter(|run| run["run-id"] == run_id.as_str())
            .collect(),
        RunFilter::StartedAfter(after) => runs
            .into_iter()
            .filter(|run| {
                run["first-event-timestamp"]
                    .as_f64()
                    .is_some_and(|ts| ts.floor() as i64 >= after.timestamp())
            })
            .collect(),
    };

    match matching.as_slice() {
        [] => Ok(None),
        [run] => Ok(Some(*run)),
        candidates => Err(Error::AmbiguousMatch {
            what: format!("{filter}"),
            candidates: serde_json::to_string_pretty(candidates)?,
        }),
    }
}

fn events(run: &Value) -> &[Value] {
    run["events"].as_array().map(Vec::as_slice).unwrap_or_default()
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}
