// src/sink.rs
//! Downstream consumers of admitted events. Sinks only ever see events that
//! passed the dedup gate.

use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::event::Event;

#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: &Event) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Fan-out over all configured sinks. One failing sink never blocks the
/// others; failures are logged and dropped.
pub struct SinkMux {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl SinkMux {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn push(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub async fn emit(&self, event: &Event) {
        for sink in &self.sinks {
            if let Err(e) = sink.emit(event).await {
                tracing::warn!(sink = sink.name(), error = ?e, "sink emit failed");
            }
        }
    }
}

impl Default for SinkMux {
    fn default() -> Self {
        Self::new()
    }
}

/// Render one event as the multi-line console block.
pub fn render(event: &Event) -> String {
    let mut out = format!(
        "[{}] Provider: {} | Product: {}\nStatus: {} - {}",
        event.observed_at.format("%Y-%m-%d %H:%M:%S"),
        event.provider,
        event.product.as_deref().unwrap_or("General"),
        event.status_label,
        event.summary,
    );
    if !event.event_type.is_empty() {
        out.push_str(&format!("\nEvent: {}", event.event_type));
    }
    if let Some(link) = &event.link {
        out.push_str(&format!("\nLink: {link}"));
    }
    out
}

/// Default sink: renders admitted events into the log stream.
pub struct ConsoleSink;

#[async_trait::async_trait]
impl EventSink for ConsoleSink {
    async fn emit(&self, event: &Event) -> Result<()> {
        tracing::info!(
            target: "statuswatch::events",
            channel = event.source_channel.as_str(),
            "{}",
            render(event)
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

// --- Test helper ---
/// Collects emitted events in memory; integration tests assert on the
/// snapshot.
pub struct MemorySink {
    pub events: Mutex<Vec<Event>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn snapshot(&self) -> Vec<Event> {
        self.events.lock().expect("memory sink mutex poisoned").clone()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl EventSink for MemorySink {
    async fn emit(&self, event: &Event) -> Result<()> {
        self.events
            .lock()
            .expect("memory sink mutex poisoned")
            .push(event.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
