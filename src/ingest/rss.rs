// src/ingest/rss.rs
//! Feed body parsing: `rss > channel > item` via quick-xml's serde support.

use anyhow::{Context, Result};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime, UtcOffset};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<Guid>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

// <guid isPermaLink="false">...</guid> — attributes are irrelevant here,
// only the text content identifies the entry.
#[derive(Debug, Deserialize)]
struct Guid {
    #[serde(rename = "$text")]
    value: Option<String>,
}

/// One feed entry, as handed to the normalizer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub guid: Option<String>,
    pub pub_date: Option<String>,
    pub description: Option<String>,
}

impl FeedItem {
    pub fn guid(&self) -> Option<&str> {
        self.guid.as_deref().filter(|g| !g.is_empty())
    }

    /// Published time as unix seconds, when the feed carries a parseable
    /// RFC 2822 `pubDate`.
    pub fn published_unix(&self) -> Option<u64> {
        let ts = self.pub_date.as_deref()?;
        parse_rfc2822_to_unix(ts)
    }
}

/// Parse a fetched feed body into items. A body that is not an RSS document
/// at all is an error for the caller to log; individual items are never
/// rejected here.
pub fn parse_feed(body: &str) -> Result<Vec<FeedItem>> {
    let xml_clean = scrub_html_entities_for_xml(body);
    let rss: Rss = from_str(&xml_clean).context("parsing rss feed xml")?;

    Ok(rss
        .channel
        .items
        .into_iter()
        .map(|it| FeedItem {
            title: it.title,
            link: it.link,
            guid: it.guid.and_then(|g| g.value),
            pub_date: it.pub_date,
            description: it.description,
        })
        .collect())
}

fn parse_rfc2822_to_unix(ts: &str) -> Option<u64> {
    OffsetDateTime::parse(ts, &Rfc2822)
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC).unix_timestamp())
        .and_then(|x| u64::try_from(x).ok())
}

// Feed descriptions routinely embed HTML entities the XML parser rejects.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
