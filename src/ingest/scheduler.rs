// src/ingest/scheduler.rs
//! The recurring fetch cycle: every interval, fan all configured feeds out
//! concurrently, feed fetched items into the pipeline, and record per-feed
//! state. One broken or slow feed never blocks the others — fetches are
//! bounded by their own timeout and errors stay local to the feed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::{counter, gauge};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::FeedConfig;
use crate::pipeline::Pipeline;

use super::fetcher::FeedFetcher;
use super::rss;
use super::types::{FeedState, FetchOutcome};

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    pub interval: Duration,
    pub fetch_timeout: Duration,
}

impl Default for SchedulerCfg {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(180),
            fetch_timeout: super::fetcher::DEFAULT_FETCH_TIMEOUT,
        }
    }
}

pub struct FeedScheduler {
    feeds: Vec<FeedState>,
    fetcher: FeedFetcher,
    pipeline: Arc<Pipeline>,
    interval: Duration,
}

impl FeedScheduler {
    pub fn new(cfg: SchedulerCfg, feeds: &[FeedConfig], pipeline: Arc<Pipeline>) -> Self {
        super::ensure_metrics_described();
        Self {
            feeds: feeds
                .iter()
                .map(|f| FeedState::new(&f.name, &f.url))
                .collect(),
            fetcher: FeedFetcher::new(cfg.fetch_timeout),
            pipeline,
            interval: cfg.interval,
        }
    }

    /// Current per-feed state (validators, last status, error counters).
    pub fn feeds(&self) -> &[FeedState] {
        &self.feeds
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        // a delayed cycle pushes the next one out by a full interval rather
        // than bursting to catch up
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            // first tick fires immediately, so startup polls right away
            ticker.tick().await;
            self.run_cycle().await;
        }
    }

    /// One fetch cycle over every configured feed, all fetches in flight
    /// concurrently.
    pub async fn run_cycle(&mut self) {
        counter!("ingest_cycles_total").increment(1);

        let mut handles = Vec::with_capacity(self.feeds.len());
        for (idx, feed) in self.feeds.iter().enumerate() {
            let fetcher = self.fetcher.clone();
            let snapshot = feed.clone();
            handles.push((idx, tokio::spawn(async move { fetcher.fetch(&snapshot).await })));
        }

        for (idx, handle) in handles {
            match handle.await {
                Ok(outcome) => self.apply_outcome(idx, outcome).await,
                Err(e) => {
                    tracing::warn!(feed = %self.feeds[idx].name, error = ?e, "fetch task aborted");
                }
            }
        }

        gauge!("ingest_last_cycle_ts").set(Utc::now().timestamp() as f64);
    }

    async fn apply_outcome(&mut self, idx: usize, outcome: FetchOutcome) {
        let pipeline = Arc::clone(&self.pipeline);
        let feed = &mut self.feeds[idx];

        match outcome {
            FetchOutcome::NotModified => {
                feed.apply_not_modified();
                counter!("feed_not_modified_total").increment(1);
                tracing::debug!(feed = %feed.name, "feed unchanged (304)");
            }
            FetchOutcome::Content {
                body,
                etag,
                last_modified,
            } => {
                feed.apply_success(etag, last_modified);
                match rss::parse_feed(&body) {
                    Ok(items) => {
                        counter!("ingest_items_total").increment(items.len() as u64);
                        let mut admitted = 0usize;
                        for item in &items {
                            if pipeline.ingest_rss(&feed.name, item).await {
                                admitted += 1;
                            }
                        }
                        tracing::info!(
                            feed = %feed.name,
                            items = items.len(),
                            admitted,
                            "feed cycle processed"
                        );
                    }
                    Err(e) => {
                        counter!("feed_parse_errors_total").increment(1);
                        tracing::warn!(feed = %feed.name, error = ?e, "feed body failed to parse");
                    }
                }
            }
            FetchOutcome::Failed(err) => {
                feed.apply_error();
                counter!("feed_fetch_errors_total").increment(1);
                tracing::warn!(
                    feed = %feed.name,
                    error = %err,
                    consecutive_errors = feed.consecutive_error_count,
                    "feed fetch failed"
                );
            }
        }
    }
}
