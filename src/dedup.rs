// src/dedup.rs
//! The single convergence point of both ingress channels: an in-memory
//! seen-set that decides whether a canonical event has already been
//! surfaced. Check-then-record happens under one lock so two
//! near-simultaneous deliveries of the same content cannot both pass.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use crate::event::Event;

pub const DEFAULT_RETENTION_HOURS: u64 = 48;

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct DedupKey {
    provider: String,
    incident_id: String,
}

#[derive(Debug, Clone)]
struct SeenEntry {
    fingerprint: String,
    last_admitted: DateTime<Utc>,
}

/// Bounded seen-set over `(provider, incident_id)` keys.
///
/// Entries older than the retention window are purged lazily on insert; a
/// re-delivery of a long-resolved incident after purge may re-admit, which
/// is the accepted tradeoff for capping memory on a process watching 100+
/// feeds.
#[derive(Debug)]
pub struct Deduplicator {
    inner: Mutex<HashMap<DedupKey, SeenEntry>>,
    retention: Duration,
}

impl Deduplicator {
    pub fn new(retention_hours: u64) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            retention: Duration::hours(retention_hours as i64),
        }
    }

    /// Atomic admit decision: true means new content, pass downstream.
    ///
    /// Unseen key → admit. Seen key with a different fingerprint → a genuine
    /// update (e.g. Investigating → Resolved), admit and re-record. Seen key
    /// with the identical fingerprint → retry/re-delivery, suppress.
    pub fn admit(&self, event: &Event) -> bool {
        let now = Utc::now();
        let key = DedupKey {
            provider: event.provider.clone(),
            incident_id: event.incident_id.clone(),
        };

        let mut seen = self.inner.lock().expect("dedup mutex poisoned");

        let cutoff = now - self.retention;
        seen.retain(|_, entry| entry.last_admitted >= cutoff);

        match seen.get_mut(&key) {
            None => {
                seen.insert(
                    key,
                    SeenEntry {
                        fingerprint: event.raw_fingerprint.clone(),
                        last_admitted: now,
                    },
                );
                true
            }
            Some(entry) if entry.fingerprint != event.raw_fingerprint => {
                entry.fingerprint = event.raw_fingerprint.clone();
                entry.last_admitted = now;
                true
            }
            Some(_) => false,
        }
    }

    /// Number of incidents currently tracked (for /health and /stats).
    pub fn len(&self) -> usize {
        self.inner.lock().expect("dedup mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION_HOURS)
    }
}
