// tests/dedup_gate.rs
// The pipeline-level dedup properties: idempotence, update passthrough,
// and cross-channel suppression with the sink as the observable output.

use std::sync::Arc;

use serde_json::json;

use statuswatch::dedup::Deduplicator;
use statuswatch::ingest::rss::FeedItem;
use statuswatch::normalize::Registry;
use statuswatch::pipeline::Pipeline;
use statuswatch::sink::{MemorySink, SinkMux};
use statuswatch::SourceChannel;

fn pipeline_with_sink() -> (Arc<Pipeline>, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let mut sinks = SinkMux::new();
    sinks.push(sink.clone());
    let pipeline = Arc::new(Pipeline::new(
        Registry::with_defaults(),
        Deduplicator::default(),
        sinks,
    ));
    (pipeline, sink)
}

fn incident_io_payload(id: &str, status: &str) -> serde_json::Value {
    json!({
        "event_type": "public_incident.incident_updated_v2",
        "data": { "incident": {
            "id": id,
            "name": "Elevated error rates",
            "status": { "label": status }
        }}
    })
}

#[tokio::test]
async fn same_webhook_three_times_reaches_sink_once() {
    let (pipeline, sink) = pipeline_with_sink();
    let payload = incident_io_payload("INC-1", "Investigating");

    assert!(pipeline.ingest_webhook("incident.io", &payload).await);
    assert!(!pipeline.ingest_webhook("incident.io", &payload).await);
    assert!(!pipeline.ingest_webhook("incident.io", &payload).await);

    let emitted = sink.snapshot();
    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0].incident_id, "INC-1");

    let stats = pipeline.stats();
    assert_eq!(stats.admitted_total, 1);
    assert_eq!(stats.suppressed_total, 2);
}

#[tokio::test]
async fn status_update_passes_through_in_order() {
    let (pipeline, sink) = pipeline_with_sink();

    assert!(
        pipeline
            .ingest_webhook("incident.io", &incident_io_payload("INC-1", "Investigating"))
            .await
    );
    assert!(
        pipeline
            .ingest_webhook("incident.io", &incident_io_payload("INC-1", "Resolved"))
            .await
    );

    let emitted = sink.snapshot();
    assert_eq!(emitted.len(), 2);
    assert_eq!(emitted[0].status_label, "Investigating");
    assert_eq!(emitted[1].status_label, "Resolved");
    // one incident, two content states
    assert_eq!(pipeline.seen_incidents(), 1);
}

#[tokio::test]
async fn webhook_then_rss_with_identical_content_admits_once() {
    let (pipeline, sink) = pipeline_with_sink();

    // webhook push arrives first
    let payload = json!({
        "event_type": "public_incident.incident_created_v2",
        "data": { "incident": {
            "id": "INC-7",
            "name": "Elevated error rates",
            "status": { "label": "Investigating" }
        }}
    });
    assert!(pipeline.ingest_webhook("incident.io", &payload).await);

    // the poller later sees the same incident in the provider's feed
    let item = FeedItem {
        title: Some("Investigating: Elevated error rates".into()),
        guid: Some("INC-7".into()),
        ..Default::default()
    };
    assert!(!pipeline.ingest_rss("incident.io", &item).await);

    let emitted = sink.snapshot();
    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0].source_channel, SourceChannel::Webhook);

    // but a feed-side status change is a genuine update and passes
    let resolved = FeedItem {
        title: Some("Resolved: Elevated error rates".into()),
        guid: Some("INC-7".into()),
        ..Default::default()
    };
    assert!(pipeline.ingest_rss("incident.io", &resolved).await);
    assert_eq!(sink.snapshot().len(), 2);
}

#[tokio::test]
async fn providers_never_collide_on_incident_ids() {
    let (pipeline, _sink) = pipeline_with_sink();

    let item = FeedItem {
        title: Some("Investigating: Elevated error rates".into()),
        guid: Some("INC-1".into()),
        ..Default::default()
    };
    assert!(pipeline.ingest_rss("OpenAI", &item).await);
    // same id and content under a different provider is a different incident
    assert!(pipeline.ingest_rss("Anthropic", &item).await);
    assert_eq!(pipeline.seen_incidents(), 2);
}
