//! The article lifecycle against in-memory buckets and a local dashboard and API.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{TimeZone, Utc};
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use serde_json::{json, Value};
use spectrum_checks::ObjectStoreListing;
use spectrum_common::{Common, Settings};
use spectrum_generator::{ArticleZip, Generator, TemplateVariables};
use spectrum_input::{Articles, Dashboard};
use spectrum_http::{RetryPolicy, RetryingClient};
use spectrum_poll::{Error, Poller};
use tempfile::TempDir;

const ARTICLE_ID: &str = "9009560";

#[derive(Default)]
struct Published {
    requests: Mutex<Vec<Value>>,
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn dashboard_article() -> Json<Value> {
    Json(json!({
        "versions": {
            "1": {
                "details": {"preview-link": "https://preview/9009560", "publication-status": "ready to publish"},
                "runs": {
                    "1": {"run-id": "old-run", "first-event-timestamp": 1000,
                          "events": [{"event-type": "Ready To Publish", "event-status": "end"}]},
                    "2": {"run-id": "new-run", "first-event-timestamp": 1600000000.5,
                          "events": [{"event-type": "Ready To Publish", "event-status": "end"}]}
                }
            }
        }
    }))
}

async fn queue_publication(State(published): State<Arc<Published>>, Json(body): Json<Value>) -> StatusCode {
    published.requests.lock().unwrap().push(body);
    StatusCode::OK
}

fn services(published: Arc<Published>) -> Router {
    Router::new()
        .route("/api/article/{id}", get(dashboard_article))
        .route("/api/queue_article_publication", post(queue_publication))
        .route("/articles/{id}", get(|| async { Json(json!({"version": 1})) }))
        .route("/articles/{id}/versions/{version}", get(|| async { Json(json!({"version": 1})) }))
        .with_state(published)
}

fn generate(root: &TempDir) -> ArticleZip {
    let template = root.path().join("templates/elife-09560-vor-r1");
    std::fs::create_dir_all(&template).unwrap();
    std::fs::write(template.join("elife-09560.xml.jinja"), "<article-id>{{ article.id }}</article-id>").unwrap();
    std::fs::write(template.join("elife-09560-fig1.tif"), [1u8]).unwrap();
    std::fs::write(template.join("elife-09560.pdf"), "%PDF").unwrap();

    let generator = Generator::new(&Common {
        tmp: root.path().join("tmp"),
        templates: root.path().join("templates"),
    });
    generator
        .article_zip("09560", Some(ARTICLE_ID), &TemplateVariables::new())
        .unwrap()
}

struct Harness {
    articles: Articles,
    input: Arc<InMemory>,
    silent: Arc<InMemory>,
    published: Arc<Published>,
}

async fn harness() -> Harness {
    let published = Arc::new(Published::default());
    let host = serve(services(published.clone())).await;

    let input = Arc::new(InMemory::new());
    let silent = Arc::new(InMemory::new());
    let cdn = Arc::new(InMemory::new());
    for key in [
        "articles/9009560/elife-9009560-fig1-v1.jpg",
        "articles/9009560/elife-9009560-v1.xml",
        "articles/9009560/elife-9009560-v1.pdf",
    ] {
        cdn.put(&Path::from(key), PutPayload::from(b"x".to_vec())).await.unwrap();
    }

    let settings = Settings {
        bucket_input: "input".into(),
        bucket_silent_corrections: "silent".into(),
        bucket_published: "published".into(),
        dashboard_host: host.clone(),
        api_gateway_host: host,
        ..Settings::default()
    };
    let listing = ObjectStoreListing::new()
        .with_bucket("input", input.clone())
        .with_bucket("silent", silent.clone())
        .with_bucket("published", cdn);

    let mut articles = Articles::from_settings(&settings, listing).unwrap();
    let quick = Poller::new(Duration::from_millis(10), Duration::from_millis(500));
    let catalog = &mut articles.catalog;
    catalog.dashboard = catalog.dashboard.clone().with_poller(quick);
    catalog.images_published_cdn_bucket = catalog.images_published_cdn_bucket.clone().with_poller(quick);
    catalog.xml_published_cdn_bucket = catalog.xml_published_cdn_bucket.clone().with_poller(quick);
    catalog.pdf_published_cdn_bucket = catalog.pdf_published_cdn_bucket.clone().with_poller(quick);

    Harness {
        articles,
        input,
        silent,
        published,
    }
}

#[tokio::test]
async fn ingest_wait_and_publish() {
    let root = tempfile::tempdir().unwrap();
    let article = generate(&root);
    let h = harness().await;

    h.articles.ingest(&article).await.unwrap();
    let ingested = h.input.get(&Path::from("elife-9009560-vor-r1.zip")).await;
    assert!(ingested.is_ok());

    let run_after = Utc.timestamp_opt(1_500_000_000, 0).unwrap();
    let run = h.articles.wait_for_publishable(&article, run_after).await.unwrap();
    assert_eq!(run, "new-run");

    h.articles.publish(&article, &run).await.unwrap();
    let requests = h.published.requests.lock().unwrap().clone();
    assert_eq!(
        requests,
        vec![json!({"articles": [{"id": ARTICLE_ID, "version": 1, "run": "new-run"}]})]
    );
}

#[tokio::test]
async fn silent_corrections_go_to_their_own_bucket() {
    let root = tempfile::tempdir().unwrap();
    let article = generate(&root);
    let h = harness().await;

    h.articles.feed_silent_correction(&article).await.unwrap();

    assert!(h.silent.get(&Path::from("elife-9009560-vor-r1.zip")).await.is_ok());
    assert!(h.input.get(&Path::from("elife-9009560-vor-r1.zip")).await.is_err());
}

#[tokio::test]
async fn rejected_publication_is_an_assertion() {
    let host = serve(Router::new().route(
        "/api/queue_article_publication",
        post(|| async { (StatusCode::BAD_REQUEST, "unknown run") }),
    ))
    .await;
    let dashboard = Dashboard::new(host, "user", "pass", RetryingClient::new(RetryPolicy::none()).unwrap());

    match dashboard.publish(ARTICLE_ID, 1, "missing-run").await {
        Err(Error::Assertion(message)) => assert!(message.contains("400: unknown run"), "{message}"),
        other => panic!("expected assertion, got {other:?}"),
    }
}
