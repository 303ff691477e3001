// src/ingest/fetcher.rs
//! One conditional GET against one feed URL. The fetcher reports what
//! happened; persisting validators and deciding about retries is the
//! scheduler's job.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use super::types::{FeedState, FetchOutcome};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected HTTP status {0}")]
    Http(StatusCode),
}

#[derive(Clone)]
pub struct FeedFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl FeedFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    /// Issue one conditional GET, replaying the feed's stored validators.
    /// The whole request (connect, headers, body) shares one deadline so a
    /// single slow feed cannot stall a fetch cycle.
    pub async fn fetch(&self, feed: &FeedState) -> FetchOutcome {
        match tokio::time::timeout(self.timeout, self.fetch_inner(feed)).await {
            Ok(outcome) => outcome,
            Err(_) => FetchOutcome::Failed(FetchError::Timeout(self.timeout)),
        }
    }

    async fn fetch_inner(&self, feed: &FeedState) -> FetchOutcome {
        let mut request = self.client.get(&feed.url);
        if let Some(etag) = &feed.etag {
            request = request.header("If-None-Match", etag);
        }
        if let Some(last_modified) = &feed.last_modified {
            request = request.header("If-Modified-Since", last_modified);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => return FetchOutcome::Failed(FetchError::Transport(e)),
        };

        if response.status() == StatusCode::NOT_MODIFIED {
            return FetchOutcome::NotModified;
        }
        if !response.status().is_success() {
            return FetchOutcome::Failed(FetchError::Http(response.status()));
        }

        let etag = header_string(&response, "ETag");
        let last_modified = header_string(&response, "Last-Modified");

        match response.text().await {
            Ok(body) => FetchOutcome::Content {
                body,
                etag,
                last_modified,
            },
            Err(e) => FetchOutcome::Failed(FetchError::Transport(e)),
        }
    }
}

impl Default for FeedFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_TIMEOUT)
    }
}

fn header_string(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}
