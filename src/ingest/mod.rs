// src/ingest/mod.rs
pub mod fetcher;
pub mod rss;
pub mod scheduler;
pub mod types;

use metrics::{describe_counter, describe_gauge};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_cycles_total", "Feed fetch cycles run.");
        describe_counter!(
            "ingest_items_total",
            "Feed items parsed out of fetched bodies."
        );
        describe_counter!(
            "feed_not_modified_total",
            "Conditional fetches answered with HTTP 304."
        );
        describe_counter!("feed_fetch_errors_total", "Feed fetch failures.");
        describe_counter!(
            "feed_parse_errors_total",
            "Fetched bodies that were not parseable RSS."
        );
        describe_counter!(
            "events_admitted_total",
            "Events passed through the dedup gate."
        );
        describe_counter!(
            "events_suppressed_total",
            "Events suppressed as duplicates."
        );
        describe_counter!("webhook_received_total", "Inbound webhook requests.");
        describe_counter!(
            "webhook_rejected_total",
            "Webhook requests rejected by verification."
        );
        describe_gauge!(
            "ingest_last_cycle_ts",
            "Unix ts when the last feed cycle finished."
        );
    });
}
