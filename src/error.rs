use thiserror::Error;

/// A raw URL string that cannot be turned into a canonical http(s) URL
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("URL is empty")]
    Empty,

    #[error("invalid URL {url:?}")]
    Parse {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported URL scheme {0:?}")]
    UnsupportedScheme(String),

    #[error("URL {0:?} has no host")]
    MissingHost(String),
}

/// Failure reaching the page whose metadata is being fetched
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to fetch {url}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to read response body from {url}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Failure creating a bookmark in linkding
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("failed to serialize bookmark payload")]
    Serialize(#[source] serde_json::Error),

    #[error("invalid bookmarks endpoint for base URL {base_url:?}")]
    InvalidEndpoint {
        base_url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to build bookmark request")]
    BuildRequest(#[source] reqwest::Error),

    #[error("failed to send bookmark request")]
    Transport(#[source] reqwest::Error),

    #[error("failed to read bookmark response body")]
    ReadBody(#[source] reqwest::Error),

    #[error("unexpected status code {status}")]
    UnexpectedStatus { status: u16, body: String },
}

impl RepositoryError {
    /// HTTP status returned by linkding, when one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            RepositoryError::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failure of one `LinkService::save` call, tagged by pipeline stage
#[derive(Debug, Error)]
pub enum LinkServiceError {
    #[error("normalization failed")]
    Normalization(#[from] NormalizeError),

    #[error("page metadata fetch failed")]
    MetadataFetch(#[from] FetchError),

    #[error("bookmark persistence failed")]
    Persistence(#[from] RepositoryError),
}

impl LinkServiceError {
    /// Render the error with every `source()` in the chain, separated by ": "
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            out.push_str(": ");
            out.push_str(&err.to_string());
            source = std::error::Error::source(err);
        }
        out
    }
}
