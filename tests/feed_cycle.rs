// tests/feed_cycle.rs
// A full scheduler cycle against local servers: the healthy feed's items
// flow through normalize -> dedup -> sink, the broken feed only bumps its
// own error counter, and a repeat cycle rides the 304 path without
// re-admitting anything.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};

use statuswatch::config::FeedConfig;
use statuswatch::dedup::Deduplicator;
use statuswatch::ingest::scheduler::{FeedScheduler, SchedulerCfg};
use statuswatch::ingest::types::FeedStatus;
use statuswatch::normalize::Registry;
use statuswatch::pipeline::Pipeline;
use statuswatch::sink::{MemorySink, SinkMux};

const FEED_XML: &str = include_str!("fixtures/status_feed.xml");
const ETAG: &str = "\"cycle-v1\"";

async fn feed_endpoint(headers: HeaderMap) -> impl IntoResponse {
    if headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        == Some(ETAG)
    {
        return (StatusCode::NOT_MODIFIED, HeaderMap::new(), String::new());
    }
    let mut out = HeaderMap::new();
    out.insert(header::ETAG, ETAG.parse().unwrap());
    (StatusCode::OK, out, FEED_XML.to_string())
}

async fn spawn_feed_server() -> String {
    let app = Router::new()
        .route("/feed.rss", get(feed_endpoint))
        .route("/broken", get(|| async { StatusCode::SERVICE_UNAVAILABLE }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn cycle_processes_good_feeds_and_isolates_broken_ones() {
    let base = spawn_feed_server().await;

    let sink = Arc::new(MemorySink::new());
    let mut sinks = SinkMux::new();
    sinks.push(sink.clone());
    let pipeline = Arc::new(Pipeline::new(
        Registry::with_defaults(),
        Deduplicator::default(),
        sinks,
    ));

    let feeds = vec![
        FeedConfig {
            name: "OpenAI".into(),
            url: format!("{base}/feed.rss"),
        },
        FeedConfig {
            name: "Flaky".into(),
            url: format!("{base}/broken"),
        },
    ];
    let mut scheduler = FeedScheduler::new(
        SchedulerCfg {
            interval: Duration::from_secs(180),
            fetch_timeout: Duration::from_secs(5),
        },
        &feeds,
        Arc::clone(&pipeline),
    );

    scheduler.run_cycle().await;

    // fixture: two content states of inc-100 plus one unparseable item
    let emitted = sink.snapshot();
    assert_eq!(emitted.len(), 3);
    assert!(emitted.iter().all(|e| e.provider == "OpenAI"));
    assert_eq!(emitted[0].status_label, "Investigating");
    assert_eq!(emitted[1].status_label, "Resolved");
    assert_eq!(emitted[2].status_label, "Unknown", "unparseable item still surfaces");

    let states = scheduler.feeds();
    assert_eq!(states[0].last_status, Some(FeedStatus::Success));
    assert_eq!(states[0].etag.as_deref(), Some(ETAG));
    assert_eq!(states[0].consecutive_error_count, 0);
    assert_eq!(states[1].last_status, Some(FeedStatus::Error));
    assert_eq!(states[1].consecutive_error_count, 1);

    // second cycle: the good feed answers 304, nothing new is admitted,
    // and the broken feed keeps counting errors without affecting it
    scheduler.run_cycle().await;
    assert_eq!(sink.snapshot().len(), 3);
    let states = scheduler.feeds();
    assert_eq!(states[0].last_status, Some(FeedStatus::NotModified));
    assert_eq!(states[1].consecutive_error_count, 2);
}
