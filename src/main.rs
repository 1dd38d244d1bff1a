mod config;
mod error;
mod extractor;
mod handler;
mod link_service;
mod linkding;
mod normalize;
mod page_info;
mod platform;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::extractor::UrlExtractor;
use crate::handler::{AllowList, MessageHandler};
use crate::link_service::LinkdingLinkService;
use crate::linkding::LinkdingRepository;
use crate::page_info::HttpPageInfoFetcher;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,linkding_bot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Allowed usernames: {:?}", config.telegram.allowed_usernames);
    info!("  linkding: {}", config.linkding.base_url);
    info!("  URL sources: {:?}", config.extraction.order);
    info!("  HTTP timeout: {}s", config.http.timeout_secs);

    let client = config.http.build_client()?;

    let repository = Arc::new(LinkdingRepository::new(
        client.clone(),
        &config.linkding.base_url,
        &config.linkding.api_token,
    ));
    let page_info = Arc::new(HttpPageInfoFetcher::new(client));
    let links = Arc::new(LinkdingLinkService::new(repository, page_info));

    let handler = Arc::new(MessageHandler::new(
        AllowList::new(&config.telegram.allowed_usernames),
        UrlExtractor::new(config.extraction.order.clone()),
        links,
    ));

    let bot = teloxide::Bot::new(&config.telegram.bot_token);

    info!("Bot is starting...");
    platform::telegram::run(handler, bot).await?;

    Ok(())
}
