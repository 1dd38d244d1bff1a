use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::RepositoryError;

const BOOKMARKS_PATH: &str = "api/bookmarks/";

/// Body of `POST /api/bookmarks/`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CreateBookmarkPayload {
    pub url: String,
    pub title: String,
    pub description: String,
    pub notes: String,
    pub is_archived: bool,
    pub unread: bool,
    pub shared: bool,
    pub tag_names: Vec<String>,
}

impl CreateBookmarkPayload {
    /// A new unread, private, untagged bookmark
    pub fn new(url: String, title: String, description: String) -> Self {
        Self {
            url,
            title,
            description,
            notes: String::new(),
            is_archived: false,
            unread: true,
            shared: false,
            tag_names: Vec::new(),
        }
    }
}

#[async_trait]
pub trait BookmarkRepository: Send + Sync {
    async fn create_bookmark(&self, payload: &CreateBookmarkPayload) -> Result<(), RepositoryError>;
}

/// Client for the linkding REST API
pub struct LinkdingRepository {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl LinkdingRepository {
    pub fn new(client: reqwest::Client, base_url: &str, api_token: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            api_token: api_token.to_string(),
        }
    }

    fn bookmarks_endpoint(&self) -> Result<Url, RepositoryError> {
        let invalid = |source| RepositoryError::InvalidEndpoint {
            base_url: self.base_url.clone(),
            source,
        };
        let mut base = self.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        Url::parse(&base)
            .and_then(|b| b.join(BOOKMARKS_PATH))
            .map_err(invalid)
    }
}

#[async_trait]
impl BookmarkRepository for LinkdingRepository {
    async fn create_bookmark(&self, payload: &CreateBookmarkPayload) -> Result<(), RepositoryError> {
        let body = serde_json::to_vec(payload).map_err(RepositoryError::Serialize)?;
        let endpoint = self.bookmarks_endpoint()?;

        debug!("Creating bookmark for {} at {}", payload.url, endpoint);

        let request = self
            .client
            .post(endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Token {}", self.api_token),
            )
            .body(body)
            .build()
            .map_err(RepositoryError::BuildRequest)?;

        let response = self
            .client
            .execute(request)
            .await
            .map_err(RepositoryError::Transport)?;

        let status = response.status();
        let response_body = response.text().await.map_err(RepositoryError::ReadBody)?;

        if status != StatusCode::CREATED {
            warn!("linkding answered {}: {}", status, response_body);
            return Err(RepositoryError::UnexpectedStatus {
                status: status.as_u16(),
                body: response_body,
            });
        }

        Ok(())
    }
}
