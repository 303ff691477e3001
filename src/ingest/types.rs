// src/ingest/types.rs
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::fetcher::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedStatus {
    Success,
    NotModified,
    Error,
}

/// Per-feed bookkeeping, owned and mutated only by the scheduler.
///
/// `etag` / `last_modified` are opaque validators from the most recent
/// successful fetch, replayed on the next request so unchanged feeds cost a
/// 304 and nothing else.
#[derive(Debug, Clone)]
pub struct FeedState {
    pub name: String,
    pub url: String,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub last_fetch_at: Option<DateTime<Utc>>,
    pub last_status: Option<FeedStatus>,
    pub consecutive_error_count: u32,
}

impl FeedState {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            etag: None,
            last_modified: None,
            last_fetch_at: None,
            last_status: None,
            consecutive_error_count: 0,
        }
    }

    pub fn apply_success(&mut self, etag: Option<String>, last_modified: Option<String>) {
        // only a completed 200 may replace the validators
        if etag.is_some() {
            self.etag = etag;
        }
        if last_modified.is_some() {
            self.last_modified = last_modified;
        }
        self.last_fetch_at = Some(Utc::now());
        self.last_status = Some(FeedStatus::Success);
        self.consecutive_error_count = 0;
    }

    pub fn apply_not_modified(&mut self) {
        self.last_fetch_at = Some(Utc::now());
        self.last_status = Some(FeedStatus::NotModified);
        self.consecutive_error_count = 0;
    }

    pub fn apply_error(&mut self) {
        self.last_fetch_at = Some(Utc::now());
        self.last_status = Some(FeedStatus::Error);
        self.consecutive_error_count += 1;
    }
}

/// Result of one conditional GET against a feed.
#[derive(Debug)]
pub enum FetchOutcome {
    /// HTTP 304 — nothing to parse, nothing to normalize.
    NotModified,
    /// HTTP 200 with fresh validators for the caller to persist.
    Content {
        body: String,
        etag: Option<String>,
        last_modified: Option<String>,
    },
    /// Transport/timeout/status failure; backoff policy belongs to the
    /// scheduler, not the fetcher.
    Failed(FetchError),
}
