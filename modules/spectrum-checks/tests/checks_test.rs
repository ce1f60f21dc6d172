//! Checks against a local axum server standing in for the services under test.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, head};
use axum::{Json, Router};
use serde_json::json;
use spectrum_checks::{
    ApiCheck, DashboardArticleCheck, Fields, HttpCheck, JournalCheck, LaxArticleCheck,
    MailcatcherCheck, ObserverCheck, RunFilter,
};
use spectrum_http::{ClientOptions, RetryPolicy, RetryingClient};
use spectrum_poll::{Error, Poller};

#[derive(Default)]
struct Hits {
    dashboard: AtomicUsize,
    lax: AtomicUsize,
    search: AtomicUsize,
    broken: AtomicUsize,
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn http() -> RetryingClient {
    RetryingClient::new(RetryPolicy::new([502, 504]).with_base(Duration::from_millis(5))).unwrap()
}

fn quick() -> Poller {
    Poller::new(Duration::from_millis(10), Duration::from_millis(300))
}

async fn dashboard_down(State(hits): State<Arc<Hits>>) -> impl IntoResponse {
    hits.dashboard.fetch_add(1, Ordering::SeqCst);
    (StatusCode::INTERNAL_SERVER_ERROR, "database is gone")
}

#[tokio::test]
async fn dashboard_5xx_is_unrecoverable_on_first_call() {
    let hits = Arc::new(Hits::default());
    let host = serve(
        Router::new()
            .route("/api/article/{id}", get(dashboard_down))
            .with_state(hits.clone()),
    )
    .await;
    let dashboard = DashboardArticleCheck::new(host, "user", "pass", http()).with_poller(quick());

    let err = dashboard.published("06847", 1, RunFilter::Any).await.unwrap_err();

    match err {
        Error::Unrecoverable(err) => {
            assert_eq!(err.status(), Some(500));
            assert!(err.to_string().contains("database is gone"));
        }
        other => panic!("expected unrecoverable, got {other:?}"),
    }
    assert_eq!(hits.dashboard.load(Ordering::SeqCst), 1);
}

async fn dashboard_article(State(hits): State<Arc<Hits>>) -> impl IntoResponse {
    let n = hits.dashboard.fetch_add(1, Ordering::SeqCst);
    let status = if n == 0 { "ready to publish" } else { "published" };
    Json(json!({
        "versions": {
            "1": {
                "details": {"preview-link": "https://preview/06847", "publication-status": status},
                "runs": {"1": {"run-id": "abc", "first-event-timestamp": 1500000000, "events": []}}
            }
        }
    }))
}

#[tokio::test]
async fn dashboard_waits_for_status() {
    let hits = Arc::new(Hits::default());
    let host = serve(
        Router::new()
            .route("/api/article/{id}", get(dashboard_article))
            .with_state(hits.clone()),
    )
    .await;
    let dashboard = DashboardArticleCheck::new(host, "user", "pass", http()).with_poller(quick());

    let article = dashboard
        .published("06847", 1, RunFilter::RunId("abc".into()))
        .await
        .unwrap();

    assert_eq!(article["versions"]["1"]["details"]["publication-status"], "published");
    assert_eq!(hits.dashboard.load(Ordering::SeqCst), 2);
}

async fn dashboard_failed_run(State(hits): State<Arc<Hits>>) -> impl IntoResponse {
    hits.dashboard.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "versions": {
            "1": {
                "details": {"preview-link": "https://preview/06847", "publication-status": "ready to publish"},
                "runs": {"2": {"run-id": "def", "first-event-timestamp": 1500000000, "events": [
                    {"event-type": "Convert JATS", "event-status": "error", "event-message": "bad xml"}
                ]}}
            }
        }
    }))
}

#[tokio::test]
async fn dashboard_error_event_stops_ready_to_publish_wait() {
    let hits = Arc::new(Hits::default());
    let host = serve(
        Router::new()
            .route("/api/article/{id}", get(dashboard_failed_run))
            .with_state(hits.clone()),
    )
    .await;
    let dashboard = DashboardArticleCheck::new(host, "user", "pass", http()).with_poller(quick());

    let err = dashboard
        .ready_to_publish("06847", 1, RunFilter::RunId("def".into()))
        .await
        .unwrap_err();

    match err {
        Error::Unrecoverable(err) => assert!(err.to_string().contains("Convert JATS")),
        other => panic!("expected unrecoverable, got {other:?}"),
    }
    assert_eq!(hits.dashboard.load(Ordering::SeqCst), 1);
}

async fn lax_version(State(hits): State<Arc<Hits>>) -> impl IntoResponse {
    if hits.lax.fetch_add(1, Ordering::SeqCst) < 2 {
        (StatusCode::NOT_FOUND, Json(json!({"title": "not found"})))
    } else {
        (StatusCode::OK, Json(json!({"id": "06847", "version": 1})))
    }
}

#[tokio::test]
async fn lax_404_is_pending_until_present() {
    let hits = Arc::new(Hits::default());
    let host = serve(
        Router::new()
            .route("/api/v2/articles/{id}/versions/{version}", get(lax_version))
            .with_state(hits.clone()),
    )
    .await;
    let lax = LaxArticleCheck::new(host, http()).with_poller(quick());

    let body = lax.published("06847", 1).await.unwrap();

    assert_eq!(body["version"], 1);
    assert_eq!(hits.lax.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn http_check_times_out_with_last_status() {
    let host = serve(Router::new().route("/missing", get(|| async { StatusCode::NOT_FOUND }))).await;
    let check = HttpCheck::new(format!("{host}/{{name}}"), http()).with_poller(quick());

    let err = check
        .of(Fields::new().with("name", "missing"), None)
        .await
        .unwrap_err();

    match err {
        Error::Timeout(timeout) => {
            assert!(timeout.target.starts_with("URL http://"));
            assert!(timeout.to_string().contains("Response code: 404"));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn http_check_matches_body_text() {
    let host = serve(Router::new().route(
        "/articles/{file}",
        get(|| async { "<article><title>Cell biology</title></article>" }),
    ))
    .await;
    let check = HttpCheck::new(format!("{host}/articles/elife-{{id}}-v{{version}}.xml"), http())
        .with_poller(quick());

    check
        .of(Fields::new().with("id", "06847").with("version", 1), Some("Cell biology"))
        .await
        .unwrap();
}

const ARTICLE_PAGE: &str = r#"<html><head>
<link rel="stylesheet" href="/assets/app.css">
<link rel="canonical" href="/articles/06847">
<script src="/assets/app.js"></script>
</head><body>
<img src="/img/ok.jpg" srcset="/img/ok.jpg 1x, /img/broken.jpg 2x">
<a class="view-selector__link--figures" href="/articles/06847/figures">Figures</a>
<div id="downloads"><a href="/download/06847.pdf">Article PDF</a></div>
</body></html>"#;

async fn broken(State(hits): State<Arc<Hits>>) -> StatusCode {
    hits.broken.fetch_add(1, Ordering::SeqCst);
    StatusCode::NOT_FOUND
}

async fn moved(headers: axum::http::HeaderMap) -> impl IntoResponse {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string();
    (
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, format!("http://{host}/new"))],
    )
}

fn journal_app(hits: Arc<Hits>) -> Router {
    Router::new()
        .route("/articles/{id}", get(|| async { axum::response::Html(ARTICLE_PAGE) }))
        .route("/assets/app.css", get(|| async { "body {}" }))
        .route("/assets/app.js", get(|| async { "run()" }))
        .route("/img/ok.jpg", get(|| async { "jpg" }))
        .route("/img/broken.jpg", head(broken).get(broken))
        .route("/download/06847.pdf", get(|| async { "pdf" }))
        .route("/old", get(moved))
        .with_state(hits)
}

#[tokio::test]
async fn journal_aggregates_broken_resources() {
    let hits = Arc::new(Hits::default());
    let host = serve(journal_app(hits.clone())).await;
    let journal = JournalCheck::new(host, RetryPolicy::none(), ClientOptions::default()).unwrap();

    let err = journal.article("06847", false, None).await.unwrap_err();

    match err {
        Error::Assertion(message) => {
            assert!(message.starts_with("1 resources of"), "{message}");
            assert!(message.contains("/img/broken.jpg responded with 404"));
        }
        other => panic!("expected assertion, got {other:?}"),
    }
    // working resources are remembered, the broken one is not
    assert!(journal.cache().contains(&format!("{}/assets/app.css", journal.host())));
    assert!(!journal.cache().contains(&format!("{}/img/broken.jpg", journal.host())));
    assert_eq!(hits.broken.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn journal_checks_redirect_location() {
    let host = serve(journal_app(Arc::new(Hits::default()))).await;
    let journal = JournalCheck::new(host, RetryPolicy::none(), ClientOptions::default()).unwrap();

    journal.redirect("/old", "/new", 301).await.unwrap();
    let err = journal.redirect("/old", "/elsewhere", 301).await.unwrap_err();
    assert!(matches!(err, Error::Assertion(_)));
}

#[derive(serde::Deserialize)]
struct Page {
    page: u32,
}

async fn report(Query(Page { page }): Query<Page>) -> impl IntoResponse {
    let items = match page {
        1 => "<item><title>Other</title><guid>https://dx.doi.org/10.7554/eLife.00001</guid></item>",
        2 => "<item><title>Target</title><guid>https://dx.doi.org/10.7554/eLife.06847</guid></item>",
        _ => "",
    };
    (
        [(header::CONTENT_TYPE, "application/rss+xml")],
        format!(
            r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Latest</title><link>http://observer</link><description>d</description>{items}</channel></rss>"#
        ),
    )
}

#[tokio::test]
async fn observer_walks_pages_until_the_guid() {
    let host = serve(Router::new().route("/report/latest-articles", get(report))).await;
    let observer = ObserverCheck::new(host, http()).with_poller(quick());

    let item = observer.latest_article("06847").await.unwrap();
    assert_eq!(item.title.as_deref(), Some("Target"));

    let err = observer.latest_article("99999").await.unwrap_err();
    match err {
        Error::Timeout(timeout) => assert!(timeout.to_string().contains("empty page 3")),
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn mailcatcher_finds_subject() {
    let host = serve(Router::new().route(
        "/messages",
        get(|| async {
            Json(json!([
                {"id": 1, "sender": "<bot@example.org>", "recipients": ["<features@example.org>"],
                 "subject": "Digest: Anonymous_1", "size": "51975", "created_at": "2018-07-31T13:52:22+00:00"},
                {"id": 2, "sender": "<bot@example.org>", "recipients": [],
                 "subject": "Digest: Anonymous_2", "size": "100"}
            ]))
        }),
    ))
    .await;
    let mail = MailcatcherCheck::new(host, http()).with_poller(quick());

    let found = mail.wait_email("Digest: Anonymous_2").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, 2);

    assert!(matches!(
        mail.wait_email("Digest: nobody").await,
        Err(Error::Timeout(_))
    ));
}

async fn search(State(hits): State<Arc<Hits>>) -> impl IntoResponse {
    let n = hits.search.fetch_add(1, Ordering::SeqCst);
    if n == 0 {
        return (StatusCode::GATEWAY_TIMEOUT, Json(json!({})));
    }
    let items = if n < 3 { json!([]) } else { json!([{"id": "06847", "image": {}}]) };
    (StatusCode::OK, Json(json!({"total": 1, "items": items})))
}

#[tokio::test]
async fn api_wait_search_retries_gateway_and_polls_until_results() {
    let hits = Arc::new(Hits::default());
    let host = serve(Router::new().route("/search", get(search)).with_state(hits.clone())).await;
    let api = ApiCheck::new(host, Some("super-user".into()), http()).with_poller(quick());

    let body = api
        .wait_search("Anonymous_1234", Some(&spectrum_checks::ItemCheck::Image(None)))
        .await
        .unwrap();

    assert_eq!(body["items"][0]["id"], "06847");
    assert_eq!(hits.search.load(Ordering::SeqCst), 4);
}
