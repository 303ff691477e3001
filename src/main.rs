//! Statuswatch — Binary Entrypoint
//! Boots the webhook receiver and the RSS poller side by side: one Axum
//! server for pushed events, one background scheduler for pulled feeds,
//! both converging on the shared dedup pipeline.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use statuswatch::api::{self, AppState};
use statuswatch::config;
use statuswatch::dedup::Deduplicator;
use statuswatch::ingest::scheduler::{FeedScheduler, SchedulerCfg};
use statuswatch::metrics::Metrics;
use statuswatch::normalize::Registry;
use statuswatch::pipeline::Pipeline;
use statuswatch::sink::{ConsoleSink, SinkMux};
use statuswatch::verify::WebhookVerifier;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("statuswatch=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = config::load()?;
    let metrics = Metrics::init(cfg.dedup_retention_hours);

    let mut sinks = SinkMux::new();
    sinks.push(Arc::new(ConsoleSink));

    let pipeline = Arc::new(Pipeline::new(
        Registry::with_defaults(),
        Deduplicator::new(cfg.dedup_retention_hours),
        sinks,
    ));
    let verifier = Arc::new(WebhookVerifier::new(
        cfg.secrets_map(),
        cfg.webhook_tolerance_secs,
    ));

    let scheduler = FeedScheduler::new(
        SchedulerCfg {
            interval: Duration::from_secs(cfg.poll_interval_secs),
            fetch_timeout: Duration::from_secs(cfg.fetch_timeout_secs),
        },
        &cfg.feeds,
        Arc::clone(&pipeline),
    );
    tracing::info!(
        feeds = cfg.feeds.len(),
        interval_secs = cfg.poll_interval_secs,
        "starting feed scheduler"
    );
    let poller = scheduler.spawn();

    let router = api::create_router(AppState { pipeline, verifier }).merge(metrics.router());
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("binding {}", cfg.bind_addr))?;
    tracing::info!(addr = %cfg.bind_addr, "webhook receiver listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // abandon any in-flight fetch; feed validators only ever change after a
    // fetch completes, so aborting here cannot corrupt feed state
    poller.abort();
    tracing::info!("statuswatch stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
