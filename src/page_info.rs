use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::FetchError;

/// Largest page body that is parsed for metadata
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Metadata of a fetched page. Missing values are empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageInfo {
    pub url: String,
    pub title: String,
    pub description: String,
}

#[async_trait]
pub trait PageInfoFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<PageInfo, FetchError>;
}

/// Fetches pages over HTTP and reads HTML meta tags and oEmbed descriptors
pub struct HttpPageInfoFetcher {
    client: reqwest::Client,
}

#[derive(Debug, Default, Deserialize)]
struct OEmbed {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Title/description pair found in an HTML document, plus any oEmbed link
#[derive(Debug, Default, PartialEq, Eq)]
struct HtmlMetadata {
    title: Option<String>,
    description: Option<String>,
    oembed_url: Option<String>,
}

impl HttpPageInfoFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch_oembed(&self, url: &str) -> Result<OEmbed, reqwest::Error> {
        self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

#[async_trait]
impl PageInfoFetcher for HttpPageInfoFetcher {
    async fn fetch(&self, url: &str) -> Result<PageInfo, FetchError> {
        debug!("Fetching page metadata: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            debug!("Page {} answered with status {}", url, status);
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase);

        let mut info = PageInfo {
            url: url.to_string(),
            ..PageInfo::default()
        };

        if content_type.as_deref().is_some_and(|ct| !ct.contains("html")) {
            debug!("Skipping metadata for non-HTML content: {:?}", content_type);
            return Ok(info);
        }

        let body = read_capped(response, MAX_BODY_BYTES)
            .await
            .map_err(|source| FetchError::Body {
                url: url.to_string(),
                source,
            })?;

        let html = parse_html(url, &body);

        let oembed = match html.oembed_url.as_deref() {
            Some(oembed_url) => match self.fetch_oembed(oembed_url).await {
                Ok(oembed) => oembed,
                Err(e) => {
                    warn!("oEmbed fetch from {} failed: {}", oembed_url, e);
                    OEmbed::default()
                }
            },
            None => OEmbed::default(),
        };

        info.title = non_empty(oembed.title)
            .or(html.title)
            .unwrap_or_default();
        info.description = non_empty(oembed.description)
            .or(html.description)
            .unwrap_or_default();

        Ok(info)
    }
}

fn parse_html(page_url: &str, body: &str) -> HtmlMetadata {
    let document = Html::parse_document(body);

    let title = meta_content(&document, "meta[property=\"og:title\"]")
        .or_else(|| element_text(&document, "title"));
    let description = meta_content(&document, "meta[property=\"og:description\"]")
        .or_else(|| meta_content(&document, "meta[name=\"description\"]"));

    let oembed_url = Selector::parse("link[type=\"application/json+oembed\"]")
        .ok()
        .and_then(|sel| {
            document
                .select(&sel)
                .find_map(|el| el.value().attr("href"))
                .map(|href| href.trim().to_string())
        })
        .filter(|href| !href.is_empty())
        .and_then(|href| resolve(page_url, &href));

    HtmlMetadata {
        title,
        description,
        oembed_url,
    }
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    document
        .select(&sel)
        .filter_map(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
}

fn element_text(document: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    let element = document.select(&sel).next()?;
    let text = element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    non_empty(Some(text))
}

fn resolve(base: &str, href: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(href).ok().map(|u| u.to_string())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Read at most `max_bytes` of the body; the rest is never downloaded.
async fn read_capped(
    mut response: reqwest::Response,
    max_bytes: usize,
) -> Result<String, reqwest::Error> {
    let mut body: Vec<u8> = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let remaining = max_bytes - body.len();
        if chunk.len() >= remaining {
            body.extend_from_slice(&chunk[..remaining]);
            break;
        }
        body.extend_from_slice(&chunk);
    }
    // A multi-byte character cut at the cap becomes U+FFFD
    Ok(String::from_utf8_lossy(&body).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn html_response(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html; charset=utf-8")
    }

    #[test]
    fn test_parse_title_and_meta_description() {
        let html = r#"<html><head>
            <title>  Plain   Title </title>
            <meta name="description" content="Plain description">
        </head><body></body></html>"#;
        let meta = parse_html("https://example.com", html);
        assert_eq!(meta.title.as_deref(), Some("Plain Title"));
        assert_eq!(meta.description.as_deref(), Some("Plain description"));
        assert_eq!(meta.oembed_url, None);
    }

    #[test]
    fn test_open_graph_preferred_over_plain_tags() {
        let html = r#"<html><head>
            <title>Plain</title>
            <meta name="description" content="plain">
            <meta property="og:title" content="OG Title">
            <meta property="og:description" content="OG description">
        </head></html>"#;
        let meta = parse_html("https://example.com", html);
        assert_eq!(meta.title.as_deref(), Some("OG Title"));
        assert_eq!(meta.description.as_deref(), Some("OG description"));
    }

    #[test]
    fn test_missing_metadata_is_none() {
        let meta = parse_html("https://example.com", "<html><body>hi</body></html>");
        assert_eq!(meta, HtmlMetadata::default());
    }

    #[test]
    fn test_relative_oembed_link_resolved() {
        let html = r#"<head><link rel="alternate" type="application/json+oembed"
            href="/oembed?url=x"></head>"#;
        let meta = parse_html("https://example.com/videos/1", html);
        assert_eq!(
            meta.oembed_url.as_deref(),
            Some("https://example.com/oembed?url=x")
        );
    }

    #[tokio::test]
    async fn test_body_read_stops_at_cap() {
        let server = MockServer::start().await;
        let body = format!("<title>Big</title>{}", "x".repeat(64 * 1024));
        Mock::given(method("GET"))
            .respond_with(html_response(&body))
            .mount(&server)
            .await;

        let response = reqwest::get(server.uri()).await.unwrap();
        let read = read_capped(response, 1024).await.unwrap();
        assert_eq!(read.len(), 1024);
        assert!(read.starts_with("<title>Big</title>"));
    }

    #[tokio::test]
    async fn test_body_under_cap_read_whole() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(html_response("<title>Small</title>"))
            .mount(&server)
            .await;

        let response = reqwest::get(server.uri()).await.unwrap();
        let read = read_capped(response, 1024).await.unwrap();
        assert_eq!(read, "<title>Small</title>");
    }

    #[tokio::test]
    async fn test_invalid_oembed_json_falls_back_to_html() {
        let server = MockServer::start().await;
        let page = format!(
            r#"<meta property="og:title" content="OG title"><link type="application/json+oembed" href="{}/oembed">"#,
            server.uri()
        );
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(html_response(&page))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/oembed"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpPageInfoFetcher::new(reqwest::Client::new());
        let info = fetcher
            .fetch(&format!("{}/page", server.uri()))
            .await
            .unwrap();
        assert_eq!(info.title, "OG title");
    }

    #[tokio::test]
    async fn test_fetch_reads_html_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(html_response(
                "<title>Example</title><meta name=\"description\" content=\"An example\">",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/article", server.uri());
        let fetcher = HttpPageInfoFetcher::new(reqwest::Client::new());
        let info = fetcher.fetch(&url).await.unwrap();

        assert_eq!(info.url, url);
        assert_eq!(info.title, "Example");
        assert_eq!(info.description, "An example");
    }

    #[tokio::test]
    async fn test_fetch_prefers_oembed() {
        let server = MockServer::start().await;
        let page = format!(
            r#"<title>HTML title</title>
            <meta name="description" content="HTML description">
            <link type="application/json+oembed" href="{}/oembed">"#,
            server.uri()
        );
        Mock::given(method("GET"))
            .and(path("/video"))
            .respond_with(html_response(&page))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/oembed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "version": "1.0",
                "type": "video",
                "title": "oEmbed title"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpPageInfoFetcher::new(reqwest::Client::new());
        let info = fetcher
            .fetch(&format!("{}/video", server.uri()))
            .await
            .unwrap();

        assert_eq!(info.title, "oEmbed title");
        // oEmbed carried no description, so the page's own is kept
        assert_eq!(info.description, "HTML description");
    }

    #[tokio::test]
    async fn test_failed_oembed_falls_back_to_html() {
        let server = MockServer::start().await;
        let page = format!(
            r#"<title>HTML title</title><link type="application/json+oembed" href="{}/oembed">"#,
            server.uri()
        );
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(html_response(&page))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/oembed"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpPageInfoFetcher::new(reqwest::Client::new());
        let info = fetcher
            .fetch(&format!("{}/page", server.uri()))
            .await
            .unwrap();
        assert_eq!(info.title, "HTML title");
        assert_eq!(info.description, "");
    }

    #[tokio::test]
    async fn test_non_html_yields_empty_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/file.pdf"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("<title>nope</title>", "application/pdf"),
            )
            .mount(&server)
            .await;

        let fetcher = HttpPageInfoFetcher::new(reqwest::Client::new());
        let info = fetcher
            .fetch(&format!("{}/file.pdf", server.uri()))
            .await
            .unwrap();
        assert_eq!(info.title, "");
        assert_eq!(info.description, "");
    }

    #[tokio::test]
    async fn test_error_status_still_parsed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(404).set_body_raw("<title>Not Found</title>", "text/html"),
            )
            .mount(&server)
            .await;

        let fetcher = HttpPageInfoFetcher::new(reqwest::Client::new());
        let info = fetcher.fetch(&server.uri()).await.unwrap();
        assert_eq!(info.title, "Not Found");
    }

    #[tokio::test]
    async fn test_connection_refused_is_fetch_error() {
        let fetcher = HttpPageInfoFetcher::new(reqwest::Client::new());
        let err = fetcher.fetch("http://127.0.0.1:1/").await.unwrap_err();
        assert!(matches!(err, FetchError::Request { .. }));
    }
}
