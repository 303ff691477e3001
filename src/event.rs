// src/event.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Which ingress path produced an event. Diagnostics only — the dedup gate
/// never looks at this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceChannel {
    Webhook,
    Rss,
}

impl SourceChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceChannel::Webhook => "webhook",
            SourceChannel::Rss => "rss",
        }
    }
}

/// Canonical incident event, immutable once constructed.
///
/// `incident_id` is never empty: sources without a usable identifier get one
/// synthesized from stable fields so retries of the same incident keep
/// colliding on the same dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub provider: String,
    pub product: Option<String>,
    pub incident_id: String,
    pub status_label: String,
    pub summary: String,
    /// Source event type string, empty when the channel has none (RSS).
    pub event_type: String,
    pub link: Option<String>,
    pub source_channel: SourceChannel,
    pub observed_at: DateTime<Utc>,
    /// Content hash over (provider, incident_id, status_label, summary).
    pub raw_fingerprint: String,
}

impl Event {
    pub fn new(
        channel: SourceChannel,
        provider: impl Into<String>,
        incident_id: impl Into<String>,
        status_label: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        let provider = provider.into();
        let incident_id = incident_id.into();
        let status_label = status_label.into();
        let summary = summary.into();
        let raw_fingerprint = fingerprint(&provider, &incident_id, &status_label, &summary);
        Self {
            provider,
            product: None,
            incident_id,
            status_label,
            summary,
            event_type: String::new(),
            link: None,
            source_channel: channel,
            observed_at: Utc::now(),
            raw_fingerprint,
        }
    }

    // Fields below do not participate in the fingerprint, so the builders
    // cannot invalidate it.

    pub fn with_product(mut self, product: Option<String>) -> Self {
        self.product = product;
        self
    }

    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    pub fn with_link(mut self, link: Option<String>) -> Self {
        self.link = link;
        self
    }
}

/// Stable content hash over the semantic fields of an event. Distinguishes
/// "same delivery again" from "genuine update to the same incident".
pub fn fingerprint(provider: &str, incident_id: &str, status_label: &str, summary: &str) -> String {
    let mut hasher = Sha256::new();
    for part in [provider, incident_id, status_label, summary] {
        hasher.update(part.as_bytes());
        // field separator so ("ab","c") never hashes like ("a","bc")
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

/// Deterministic identifier for payloads that carry none of their own.
///
/// `time_bucket` is an hour-granularity bucket of the item's published time
/// (or of first sight when the source has no timestamp), so re-deliveries of
/// the same underlying update land on the same id.
pub fn synthesize_incident_id(provider: &str, title: &str, time_bucket: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(provider.as_bytes());
    hasher.update([0u8]);
    hasher.update(title.as_bytes());
    hasher.update([0u8]);
    hasher.update(time_bucket.to_be_bytes());
    let digest = hasher.finalize();
    // 16 bytes of hex is plenty for a provider-scoped key
    hex::encode(&digest[..16])
}

/// Bucket a unix timestamp to the hour for id synthesis.
pub fn hour_bucket(unix_secs: u64) -> u64 {
    unix_secs / 3600
}
