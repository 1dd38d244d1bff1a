use std::collections::HashSet;

use serde::Deserialize;
use tracing::warn;

use crate::platform::{IncomingMessage, SpanKind};

/// A place in a message where URLs can be found
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorSource {
    /// Url and text-link spans of the message text
    Entities,
    /// The link preview attached to the message
    LinkPreview,
}

impl ExtractorSource {
    fn extract(self, msg: &IncomingMessage) -> Vec<String> {
        match self {
            ExtractorSource::Entities => urls_from_entities(msg),
            ExtractorSource::LinkPreview => urls_from_link_preview(msg),
        }
    }
}

/// Default precedence: what the user wrote beats what the client previewed.
pub fn default_order() -> Vec<ExtractorSource> {
    vec![ExtractorSource::Entities, ExtractorSource::LinkPreview]
}

/// Runs the configured sources in order and merges their URLs.
#[derive(Debug, Clone)]
pub struct UrlExtractor {
    order: Vec<ExtractorSource>,
}

impl UrlExtractor {
    pub fn new(order: Vec<ExtractorSource>) -> Self {
        Self { order }
    }

    /// Ordered, deduplicated URLs found in the message
    pub fn extract(&self, msg: &IncomingMessage) -> Vec<String> {
        let urls = self
            .order
            .iter()
            .flat_map(|source| source.extract(msg))
            .collect();
        distinct(urls)
    }
}

impl Default for UrlExtractor {
    fn default() -> Self {
        Self::new(default_order())
    }
}

pub fn urls_from_entities(msg: &IncomingMessage) -> Vec<String> {
    msg.spans
        .iter()
        .filter(|span| matches!(span.kind, SpanKind::Url | SpanKind::TextLink))
        .filter_map(|span| match span.url.as_deref() {
            Some(url) if !url.is_empty() => Some(url.to_string()),
            _ => {
                let sliced = slice_utf16(&msg.text, span.offset, span.length);
                if sliced.is_none() {
                    warn!(
                        "Span {}+{} does not fit message text of {} UTF-16 units",
                        span.offset,
                        span.length,
                        msg.text.encode_utf16().count()
                    );
                }
                sliced
            }
        })
        .collect()
}

pub fn urls_from_link_preview(msg: &IncomingMessage) -> Vec<String> {
    match &msg.link_preview {
        Some(preview) if !preview.is_disabled => preview
            .url
            .iter()
            .filter(|url| !url.is_empty())
            .cloned()
            .collect(),
        _ => Vec::new(),
    }
}

/// Slice `text` by a UTF-16 offset/length pair.
///
/// Returns `None` when the range is out of bounds or cuts a surrogate pair.
pub fn slice_utf16(text: &str, offset: usize, length: usize) -> Option<String> {
    let units: Vec<u16> = text.encode_utf16().collect();
    let end = offset.checked_add(length)?;
    let slice = units.get(offset..end)?;
    String::from_utf16(slice).ok()
}

fn distinct(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|url| seen.insert(url.clone()))
        .collect()
}
