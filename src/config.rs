use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::extractor::{default_order, ExtractorSource};

/// Prefix of the environment variables that override the config file
pub const ENV_PREFIX: &str = "LTR_";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub linkding: LinkdingConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub allowed_usernames: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LinkdingConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_token: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    /// Timeout for page fetches and linkding requests
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl HttpConfig {
    /// Build the client shared by the page fetcher and the linkding repository
    pub fn build_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .user_agent(&self.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("Failed to build HTTP client")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    /// Which URL sources are consulted first
    #[serde(default = "default_order")]
    pub order: Vec<ExtractorSource>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            order: default_order(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("linkding-bot/{}", env!("CARGO_PKG_VERSION"))
}

impl Config {
    /// Load the config file (if present), apply `LTR_*` overrides and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Config::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Override file values with environment variables looked up through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}")).filter(|value| !value.trim().is_empty())
        };

        if let Some(token) = var("TOKEN") {
            self.telegram.bot_token = token;
        }
        if let Some(usernames) = var("ALLOWED_USERNAMES") {
            self.telegram.allowed_usernames = usernames
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(base_url) = var("LINKDING_BASE_URL") {
            self.linkding.base_url = base_url;
        }
        if let Some(api_token) = var("LINKDING_API_TOKEN") {
            self.linkding.api_token = api_token;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            bail!("Token is required");
        }
        if self
            .telegram
            .allowed_usernames
            .iter()
            .all(|name| name.trim().trim_start_matches('@').is_empty())
        {
            bail!("At least one allowed username is required");
        }
        if self.linkding.api_token.trim().is_empty() {
            bail!("linkding API token is required");
        }
        let base_url = url::Url::parse(&self.linkding.base_url)
            .with_context(|| format!("Invalid linkding base URL: {:?}", self.linkding.base_url))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            bail!(
                "linkding base URL must use http or https, got {}",
                base_url.scheme()
            );
        }
        if self.extraction.order.is_empty() {
            bail!("extraction.order must name at least one source");
        }
        Ok(())
    }
}
