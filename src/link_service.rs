use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::LinkServiceError;
use crate::linkding::{BookmarkRepository, CreateBookmarkPayload};
use crate::normalize::normalize;
use crate::page_info::PageInfoFetcher;

/// Stage of a save, used to label timings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStep {
    Normalize,
    FetchMetadata,
    Persist,
}

impl std::fmt::Display for SaveStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveStep::Normalize => write!(f, "normalize"),
            SaveStep::FetchMetadata => write!(f, "fetch_metadata"),
            SaveStep::Persist => write!(f, "persist"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StepTiming {
    pub step: SaveStep,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl StepTiming {
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// A bookmark that was created
#[derive(Debug, Clone)]
pub struct SavedLink {
    pub url: String,
    pub title: String,
    pub description: String,
    pub timings: Vec<StepTiming>,
}

#[async_trait]
pub trait LinkService: Send + Sync {
    async fn save(&self, url: &str) -> Result<SavedLink, LinkServiceError>;
}

/// Saves links into linkding, enriched with the page's title and description
pub struct LinkdingLinkService {
    repository: Arc<dyn BookmarkRepository>,
    page_info: Arc<dyn PageInfoFetcher>,
}

impl LinkdingLinkService {
    pub fn new(repository: Arc<dyn BookmarkRepository>, page_info: Arc<dyn PageInfoFetcher>) -> Self {
        Self {
            repository,
            page_info,
        }
    }
}

fn finish(timings: &mut Vec<StepTiming>, step: SaveStep, started_at: DateTime<Utc>) {
    let timing = StepTiming {
        step,
        started_at,
        finished_at: Utc::now(),
    };
    debug!(
        "Step {} took {} ms",
        step,
        timing.duration().num_milliseconds()
    );
    timings.push(timing);
}

#[async_trait]
impl LinkService for LinkdingLinkService {
    async fn save(&self, url: &str) -> Result<SavedLink, LinkServiceError> {
        let mut timings = Vec::with_capacity(3);

        let started = Utc::now();
        let normalized = normalize(url);
        finish(&mut timings, SaveStep::Normalize, started);
        let normalized = normalized?;

        let started = Utc::now();
        let page_info = self.page_info.fetch(&normalized).await;
        finish(&mut timings, SaveStep::FetchMetadata, started);
        let page_info = page_info?;
        debug!(
            "Metadata for {}: title {:?}, description {:?}",
            page_info.url, page_info.title, page_info.description
        );

        let payload = CreateBookmarkPayload::new(
            normalized,
            page_info.title,
            page_info.description,
        );

        let started = Utc::now();
        let created = self.repository.create_bookmark(&payload).await;
        finish(&mut timings, SaveStep::Persist, started);
        created?;

        Ok(SavedLink {
            url: payload.url,
            title: payload.title,
            description: payload.description,
            timings,
        })
    }
}
