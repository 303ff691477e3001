// src/normalize.rs
//! Converts provider-specific webhook payloads and RSS feed items into the
//! canonical [`Event`] shape. Normalization never fails: an unrecognized
//! payload degrades to a minimal event instead of being dropped, because a
//! missed incident costs more than a noisy one.

use std::collections::HashMap;

use chrono::Utc;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::Value;

use crate::event::{hour_bucket, synthesize_incident_id, Event, SourceChannel};
use crate::ingest::rss::FeedItem;

/// Maps one provider scheme's webhook JSON to a canonical event. Adding a
/// provider means registering another strategy, not growing a conditional.
pub trait WebhookMapper: Send + Sync {
    fn map(&self, provider: &str, payload: &Value) -> Event;
}

/// Webhook mapping strategies keyed by provider name, with a tolerant
/// generic fallback for everything unregistered.
pub struct Registry {
    mappers: HashMap<String, Box<dyn WebhookMapper>>,
    fallback: Box<dyn WebhookMapper>,
}

impl Registry {
    pub fn with_defaults() -> Self {
        let mut mappers: HashMap<String, Box<dyn WebhookMapper>> = HashMap::new();
        mappers.insert("incident.io".to_string(), Box::new(IncidentIoMapper));
        Self {
            mappers,
            fallback: Box::new(GenericMapper),
        }
    }

    pub fn register(&mut self, provider: impl Into<String>, mapper: Box<dyn WebhookMapper>) {
        self.mappers.insert(provider.into(), mapper);
    }

    pub fn normalize_webhook(&self, provider: &str, payload: &Value) -> Event {
        self.mappers
            .get(provider)
            .unwrap_or(&self.fallback)
            .map(provider, payload)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// incident.io-class payloads: `public_incident.*` event types nesting the
/// incident under `data.incident` with object-valued `status`.
pub struct IncidentIoMapper;

impl WebhookMapper for IncidentIoMapper {
    fn map(&self, provider: &str, payload: &Value) -> Event {
        map_incident_payload(provider, payload)
    }
}

/// Generic `{event_type, data: {...}}` payloads; also swallows flat shapes
/// where the incident fields sit at the top level.
pub struct GenericMapper;

impl WebhookMapper for GenericMapper {
    fn map(&self, provider: &str, payload: &Value) -> Event {
        map_incident_payload(provider, payload)
    }
}

// Both current schemes resolve through the same tolerant field chain, which
// is exactly what makes unknown event types land on a usable minimal event.
// Scheme-specific divergence belongs in the mapper that needs it.
fn map_incident_payload(provider: &str, payload: &Value) -> Event {
    let event_type = payload
        .get("event_type")
        .and_then(Value::as_str)
        .unwrap_or("");

    let data = payload.get("data").unwrap_or(payload);
    let incident = data.get("incident").unwrap_or(data);

    let title = first_str(incident, &["name", "title"]).unwrap_or("Unknown Incident");
    let title = scrub_text(title);

    // status may be an object with a label (incident.io) or a bare string
    let status = incident
        .get("status")
        .map(label_of)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Unknown".to_string());

    let incident_id = match first_str(incident, &["id"]) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => {
            let created = first_str(incident, &["created_at"])
                .or_else(|| first_str(payload, &["created_at"]));
            synthesize_incident_id(provider, &title, rfc3339_bucket(created))
        }
    };

    let product = components_of(incident);
    let link = first_str(incident, &["permalink", "url"]).map(str::to_string);

    Event::new(SourceChannel::Webhook, provider, incident_id, status, title)
        .with_event_type(event_type)
        .with_product(product)
        .with_link(link)
}

/// RSS items: provider comes from feed config; status is parsed out of
/// title conventions ("Resolved: Elevated error rates") or, failing that,
/// out of status phrases in the description. Unparseable items still
/// produce an event with `status_label = "Unknown"`.
pub fn normalize_rss(provider: &str, item: &FeedItem) -> Event {
    let title_raw = item.title.as_deref().unwrap_or("Unknown Incident");
    let title = scrub_text(title_raw);

    let (mut status, summary) = match title.split_once(':') {
        Some((prefix, rest)) if !rest.trim().is_empty() => match status_word(prefix.trim()) {
            Some(status) => (status, rest.trim().to_string()),
            None => (String::new(), title.clone()),
        },
        _ => (String::new(), title.clone()),
    };

    let description = item.description.as_deref().unwrap_or("");
    if status.is_empty() {
        status = status_from_text(&scrub_text(description)).unwrap_or_default();
    }
    if status.is_empty() {
        status = "Unknown".to_string();
    }

    let incident_id = match item.guid().or(item.link.as_deref()) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => {
            let bucket = item
                .published_unix()
                .map(hour_bucket)
                .unwrap_or_else(|| hour_bucket(Utc::now().timestamp().max(0) as u64));
            synthesize_incident_id(provider, &summary, bucket)
        }
    };

    Event::new(SourceChannel::Rss, provider, incident_id, status, summary)
        .with_product(components_from_html(description))
        .with_link(item.link.clone())
}

/// Normalize text pulled out of feeds/payloads: decode HTML entities, strip
/// tags, straighten quotes, collapse whitespace.
pub fn scrub_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // length cap keeps pathological feeds from bloating events
    if out.chars().count() > 500 {
        out = out.chars().take(500).collect();
    }
    out
}

/// Match a lone status word ("Resolved", "investigating", ...).
fn status_word(s: &str) -> Option<String> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(operational|degraded|partial|major|maintenance|outage|incident|investigating|monitoring|resolved)$",
        )
        .unwrap()
    });
    re.is_match(s).then(|| title_case(s))
}

/// Pull the first status phrase out of free text, the way status-page feed
/// descriptions usually embed one.
fn status_from_text(text: &str) -> Option<String> {
    static RE_PHRASE: OnceCell<Regex> = OnceCell::new();
    let re_phrase = RE_PHRASE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(operational|degraded|partial|major|maintenance|outage|incident|investigating|monitoring|resolved)\b",
        )
        .unwrap()
    });
    if let Some(m) = re_phrase.captures(text).and_then(|c| c.get(1)) {
        return Some(title_case(m.as_str()));
    }

    static RE_KV: OnceCell<Regex> = OnceCell::new();
    let re_kv = RE_KV.get_or_init(|| Regex::new(r"(?i)status:\s*(\w+)").unwrap());
    re_kv
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| title_case(m.as_str()))
}

/// Affected components from a webhook incident object.
fn components_of(incident: &Value) -> Option<String> {
    let comps = incident.get("affected_components")?.as_array()?;
    let names: Vec<&str> = comps
        .iter()
        .filter_map(|c| c.get("name").and_then(Value::as_str))
        .collect();
    (!names.is_empty()).then(|| names.join(", "))
}

/// Component names conventionally appear as bold tags in RSS descriptions.
fn components_from_html(html: &str) -> Option<String> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| Regex::new(r"(?is)<(?:strong|b)>(.*?)</(?:strong|b)>").unwrap());
    let names: Vec<String> = re
        .captures_iter(html)
        .filter_map(|c| c.get(1))
        .map(|m| scrub_text(m.as_str()))
        .filter(|t| !t.is_empty() && !t.to_ascii_lowercase().starts_with("status"))
        .collect();
    (!names.is_empty()).then(|| names.join(", "))
}

fn first_str<'a>(v: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| v.get(k).and_then(Value::as_str))
}

/// `status` is `{"label": "..."}` on incident.io and a plain string on most
/// generic providers.
fn label_of(status: &Value) -> String {
    match status {
        Value::Object(_) => status
            .get("label")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        Value::String(s) => s.clone(),
        _ => String::new(),
    }
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

fn rfc3339_bucket(created_at: Option<&str>) -> u64 {
    created_at
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| hour_bucket(dt.timestamp().max(0) as u64))
        .unwrap_or_else(|| hour_bucket(Utc::now().timestamp().max(0) as u64))
}
