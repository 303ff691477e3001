// src/pipeline.rs
//! The convergence point of both ingress paths: normalize, run the dedup
//! gate, emit to sinks. Webhook handlers and the feed scheduler share one
//! `Pipeline` behind an `Arc`; the gate's seen-set is the only state the
//! two paths contend on.

use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;
use serde::Serialize;
use serde_json::Value;

use crate::dedup::Deduplicator;
use crate::event::Event;
use crate::ingest::rss::FeedItem;
use crate::normalize::{self, Registry};
use crate::sink::SinkMux;

pub struct Pipeline {
    registry: Registry,
    dedup: Deduplicator,
    sinks: SinkMux,
    admitted: AtomicU64,
    suppressed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PipelineStats {
    pub seen_incidents_count: usize,
    pub admitted_total: u64,
    pub suppressed_total: u64,
}

impl Pipeline {
    pub fn new(registry: Registry, dedup: Deduplicator, sinks: SinkMux) -> Self {
        crate::ingest::ensure_metrics_described();
        Self {
            registry,
            dedup,
            sinks,
            admitted: AtomicU64::new(0),
            suppressed: AtomicU64::new(0),
        }
    }

    /// Push one verified webhook payload through the pipeline. Returns
    /// whether the event was admitted (new content) or suppressed.
    pub async fn ingest_webhook(&self, provider: &str, payload: &Value) -> bool {
        let event = self.registry.normalize_webhook(provider, payload);
        self.dispatch(event).await
    }

    /// Push one RSS feed item through the pipeline.
    pub async fn ingest_rss(&self, feed_name: &str, item: &FeedItem) -> bool {
        let event = normalize::normalize_rss(feed_name, item);
        self.dispatch(event).await
    }

    async fn dispatch(&self, event: Event) -> bool {
        if self.dedup.admit(&event) {
            self.admitted.fetch_add(1, Ordering::Relaxed);
            counter!("events_admitted_total").increment(1);
            self.sinks.emit(&event).await;
            true
        } else {
            self.suppressed.fetch_add(1, Ordering::Relaxed);
            counter!("events_suppressed_total").increment(1);
            tracing::debug!(
                provider = %event.provider,
                incident = %event.incident_id,
                channel = event.source_channel.as_str(),
                "duplicate suppressed"
            );
            false
        }
    }

    pub fn seen_incidents(&self) -> usize {
        self.dedup.len()
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            seen_incidents_count: self.dedup.len(),
            admitted_total: self.admitted.load(Ordering::Relaxed),
            suppressed_total: self.suppressed.load(Ordering::Relaxed),
        }
    }
}
