// tests/feed_normalize.rs
use statuswatch::ingest::rss::parse_feed;
use statuswatch::normalize::normalize_rss;
use statuswatch::SourceChannel;

// Use a 'static fixture via include_str! the same way the poller would see
// a fetched body.
const FEED_XML: &str = include_str!("fixtures/status_feed.xml");

#[test]
fn fixture_parses_and_normalizes_every_item() {
    let items = parse_feed(FEED_XML).expect("fixture should parse");
    assert_eq!(items.len(), 3);

    let events: Vec<_> = items
        .iter()
        .map(|it| normalize_rss("OpenAI", it))
        .collect();

    assert!(
        events.iter().all(|e| !e.incident_id.is_empty()),
        "every event must carry a non-empty incident id"
    );
    assert!(events.iter().all(|e| e.source_channel == SourceChannel::Rss));

    // the two inc-100 states share a dedup key but not a fingerprint
    assert_eq!(events[0].incident_id, "inc-100");
    assert_eq!(events[1].incident_id, "inc-100");
    assert_ne!(events[0].raw_fingerprint, events[1].raw_fingerprint);

    assert_eq!(events[0].status_label, "Investigating");
    assert_eq!(events[0].summary, "Elevated error rates");
    assert_eq!(events[0].product.as_deref(), Some("API"));
    assert_eq!(
        events[0].link.as_deref(),
        Some("https://status.openai.com/incidents/inc-100")
    );

    // no guid, no link, no status phrase: synthesized id, Unknown label
    assert_eq!(events[2].status_label, "Unknown");
    assert_eq!(events[2].summary, "Weekly platform newsletter");

    // re-normalizing the same item keeps the synthesized id stable
    let again = normalize_rss("OpenAI", &items[2]);
    assert_eq!(again.incident_id, events[2].incident_id);
}
