use std::collections::HashSet;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::error::LinkServiceError;
use crate::extractor::UrlExtractor;
use crate::link_service::{LinkService, SavedLink};
use crate::platform::IncomingMessage;

pub const REPLY_NOT_ALLOWED: &str = "You are not allowed to use this bot";
pub const REPLY_NO_URLS: &str = "No URLs found in the message";
pub const REPLY_ERROR: &str = "Error";
pub const REPLY_SAVED: &str = "Saved!";

/// Usernames permitted to save links
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    usernames: HashSet<String>,
}

impl AllowList {
    /// Build from configured names; `@alice` and `alice` are the same entry.
    pub fn new<I, S>(usernames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let usernames = usernames
            .into_iter()
            .map(|name| normalize_username(name.as_ref()))
            .filter(|name| !name.is_empty())
            .collect();
        Self { usernames }
    }

    pub fn allows(&self, username: Option<&str>) -> bool {
        username.is_some_and(|name| self.usernames.contains(normalize_username(name).as_str()))
    }
}

pub fn normalize_username(name: &str) -> String {
    let trimmed = name.trim();
    trimmed.strip_prefix('@').unwrap_or(trimmed).to_string()
}

/// What happened to one message
#[derive(Debug)]
pub enum HandleOutcome {
    NotAllowed,
    NoUrls,
    Saved(SavedLink),
    Failed { url: String, error: LinkServiceError },
}

impl HandleOutcome {
    pub fn reply(&self) -> &'static str {
        match self {
            HandleOutcome::NotAllowed => REPLY_NOT_ALLOWED,
            HandleOutcome::NoUrls => REPLY_NO_URLS,
            HandleOutcome::Saved(_) => REPLY_SAVED,
            HandleOutcome::Failed { .. } => REPLY_ERROR,
        }
    }
}

/// Turns one incoming message into one reply.
/// Platform-agnostic and stateless between messages.
pub struct MessageHandler {
    allow_list: AllowList,
    extractor: UrlExtractor,
    links: Arc<dyn LinkService>,
}

impl MessageHandler {
    pub fn new(allow_list: AllowList, extractor: UrlExtractor, links: Arc<dyn LinkService>) -> Self {
        Self {
            allow_list,
            extractor,
            links,
        }
    }

    /// Reply text for the message. Never fails.
    pub async fn handle(&self, msg: &IncomingMessage) -> String {
        let outcome = self.process(msg).await;
        match &outcome {
            HandleOutcome::Saved(saved) => {
                let timings = saved
                    .timings
                    .iter()
                    .map(|t| format!("{}={}ms", t.step, t.duration().num_milliseconds()))
                    .collect::<Vec<_>>()
                    .join(" ");
                info!(
                    "Saved {} [{}] (title: {:?}, description: {:?})",
                    saved.url, timings, saved.title, saved.description
                );
            }
            HandleOutcome::Failed { url, error: e } => {
                if let LinkServiceError::Persistence(inner) = e {
                    if let Some(status) = inner.status() {
                        error!("linkding rejected {} with status {}", url, status);
                    }
                }
                error!("Couldn't save {}: {}", url, e.chain());
            }
            HandleOutcome::NotAllowed | HandleOutcome::NoUrls => {}
        }
        outcome.reply().to_string()
    }

    pub async fn process(&self, msg: &IncomingMessage) -> HandleOutcome {
        if !self.allow_list.allows(msg.username.as_deref()) {
            warn!(
                "Rejected message from {:?} in chat {}",
                msg.username, msg.chat_id
            );
            return HandleOutcome::NotAllowed;
        }

        info!(
            "Message from {:?} in chat {}: {}",
            msg.username, msg.chat_id, msg.text
        );

        let urls = self.extractor.extract(msg);
        let Some(first) = urls.first() else {
            return HandleOutcome::NoUrls;
        };
        if urls.len() > 1 {
            info!("Found {} URLs, saving only {}", urls.len(), first);
        }

        match self.links.save(first).await {
            Ok(saved) => HandleOutcome::Saved(saved),
            Err(error) => HandleOutcome::Failed {
                url: first.clone(),
                error,
            },
        }
    }
}
