//! Google News RSS search adapter.
//!
//! Queries the [Google News](https://news.google.com) RSS search endpoint,
//! which needs no credentials and returns up to ~100 items per language.
//!
//! # URL Pattern
//!
//! ```text
//! https://news.google.com/rss/search?q=<kw>+after:YYYY-MM-DD+before:YYYY-MM-DD&hl=en-US&gl=US&ceid=US:en
//! ```
//!
//! Item links usually point at a `news.google.com` redirector rather than the
//! publisher. When the redirector carries the target in a `url=` parameter it
//! is unwrapped here; otherwise the redirector link is kept and the render
//! fallback follows it.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use reqwest::Client;
use serde::Deserialize;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use super::NewsSource;
use crate::config::HttpSettings;
use crate::models::{ArticleCandidate, Language};
use crate::query::{day_after, day_before};
use crate::utils::{collapse_whitespace, parse_published, strip_html, truncate_for_log};

pub const GOOGLE_NEWS_RSS_BASE: &str = "https://news.google.com/rss/search";

/// Host of the redirector links the feed hands out.
const REDIRECTOR_HOST: &str = "news.google.com";

/// Locale parameters for one language: `(hl, gl, ceid)`.
fn locale(language: Language) -> (&'static str, &'static str, &'static str) {
    match language {
        Language::ZhTw => ("zh-TW", "TW", "TW:zh-Hant"),
        Language::EnUs => ("en-US", "US", "US:en"),
    }
}

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
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    source: Option<ItemSource>,
}

#[derive(Debug, Deserialize)]
struct ItemSource {
    #[serde(rename = "$text")]
    name: Option<String>,
}

/// The Google News RSS adapter.
pub struct GoogleNewsRss {
    client: Client,
    base_url: String,
}

impl GoogleNewsRss {
    pub fn new(http: &HttpSettings) -> Self {
        Self::with_base_url(http, GOOGLE_NEWS_RSS_BASE)
    }

    /// Point the adapter at a different endpoint (used by tests).
    pub fn with_base_url(http: &HttpSettings, base_url: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(http.feed_timeout())
                .user_agent(http.user_agent.as_str())
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: base_url.to_string(),
        }
    }

    /// Build the search URL, including the coarse `after:`/`before:` window.
    fn search_url(
        &self,
        keyword: &str,
        language: Language,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> String {
        let (hl, gl, ceid) = locale(language);
        let query = format!(
            "{} after:{} before:{}",
            keyword,
            day_before(start.date_naive()).format("%Y-%m-%d"),
            day_after(end.date_naive()).format("%Y-%m-%d"),
        );
        format!(
            "{}?q={}&hl={}&gl={}&ceid={}",
            self.base_url,
            urlencoding::encode(&query),
            hl,
            gl,
            urlencoding::encode(ceid)
        )
    }

    async fn fetch_feed(&self, url: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("feed returned HTTP {status}").into());
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl NewsSource for GoogleNewsRss {
    #[instrument(level = "info", skip_all, fields(%keyword, %language, max_count = max_count))]
    async fn fetch(
        &self,
        keyword: &str,
        language: Language,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
        max_count: usize,
    ) -> Vec<ArticleCandidate> {
        let url = self.search_url(keyword, language, start, end);
        debug!(%url, "Fetching Google News RSS");

        let body = match self.fetch_feed(&url).await {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, %url, "Google News RSS fetch failed");
                return Vec::new();
            }
        };

        let candidates = match parse_feed(&body, language) {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(
                    error = %e,
                    body_preview = %truncate_for_log(&body, 300),
                    "Google News RSS did not parse"
                );
                return Vec::new();
            }
        };

        let candidates: Vec<ArticleCandidate> = candidates.into_iter().take(max_count).collect();
        info!(count = candidates.len(), "Parsed Google News RSS items");
        candidates
    }

    fn name(&self) -> &'static str {
        "Google News RSS"
    }
}

/// Parse an RSS document into candidates, skipping unusable items.
fn parse_feed(body: &str, language: Language) -> Result<Vec<ArticleCandidate>, quick_xml::DeError> {
    let rss: Rss = quick_xml::de::from_str(body)?;
    Ok(rss
        .channel
        .items
        .into_iter()
        .filter_map(|item| parse_item(item, language))
        .collect())
}

fn parse_item(item: Item, language: Language) -> Option<ArticleCandidate> {
    let raw_title = collapse_whitespace(item.title.as_deref().unwrap_or_default());
    let link = item.link.as_deref().unwrap_or_default().trim().to_string();
    if raw_title.is_empty() || link.is_empty() {
        return None;
    }

    // Titles arrive as "Headline - Publisher".
    let (title, mut source) = match raw_title.rsplit_once(" - ") {
        Some((head, publisher)) if !head.trim().is_empty() => {
            (head.trim().to_string(), publisher.trim().to_string())
        }
        _ => (raw_title.clone(), String::new()),
    };
    if source.is_empty() {
        source = item
            .source
            .and_then(|s| s.name)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
    }

    let published_at = item.pub_date.as_deref().and_then(|raw| {
        let parsed = parse_published(raw);
        if parsed.is_none() {
            debug!(raw, "Unparseable pubDate");
        }
        parsed
    });

    Some(ArticleCandidate {
        title,
        url: unwrap_redirect(&link).unwrap_or_else(|| link.clone()),
        listing_url: link,
        source,
        published_at,
        summary_seed: item.description.as_deref().map(strip_html).unwrap_or_default(),
        language,
    })
}

/// Resolve a redirector link to its target when the target is in the query.
///
/// Returns the link itself for non-redirector hosts and `None` when the
/// redirector hides the target.
pub fn unwrap_redirect(link: &str) -> Option<String> {
    let parsed = Url::parse(link).ok()?;
    if parsed.host_str() != Some(REDIRECTOR_HOST) {
        return Some(link.to_string());
    }
    parsed
        .query_pairs()
        .find(|(k, _)| k == "url")
        .map(|(_, v)| v.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SAMPLE_FEED: &str = r##"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <generator>NFE/5.0</generator>
    <title>"chips" - Google News</title>
    <link>https://news.google.com/search?q=chips</link>
    <language>en-US</language>
    <item>
      <title>Chipmakers expand capacity - Reuters</title>
      <link>https://news.google.com/rss/articles/CBMiabc?oc=5</link>
      <guid isPermaLink="false">CBMiabc</guid>
      <pubDate>Tue, 06 May 2025 03:00:00 GMT</pubDate>
      <description>&lt;a href="https://news.google.com/rss/articles/CBMiabc"&gt;Chipmakers expand capacity&lt;/a&gt;&amp;nbsp;&amp;nbsp;&lt;font color="#6f6f6f"&gt;Reuters&lt;/font&gt;</description>
      <source url="https://www.reuters.com">Reuters</source>
    </item>
    <item>
      <title>Fab output data</title>
      <link>https://news.google.com/articles/xyz?url=https%3A%2F%2Fexample.com%2Ffab&amp;hl=en</link>
      <source url="https://example.com">Example Daily</source>
    </item>
    <item>
      <title></title>
      <link>https://example.com/untitled</link>
    </item>
    <item>
      <title>Direct link story</title>
      <link>https://example.org/story</link>
      <pubDate>2025-05-06 01:00:00</pubDate>
    </item>
  </channel>
</rss>"##;

    fn window() -> (DateTime<FixedOffset>, DateTime<FixedOffset>) {
        (
            DateTime::parse_from_rfc3339("2025-05-06T00:00:00+08:00").unwrap(),
            DateTime::parse_from_rfc3339("2025-05-06T23:59:59+08:00").unwrap(),
        )
    }

    #[test]
    fn test_parse_feed_items() {
        let items = parse_feed(SAMPLE_FEED, Language::EnUs).unwrap();
        assert_eq!(items.len(), 3);

        let first = &items[0];
        assert_eq!(first.title, "Chipmakers expand capacity");
        assert_eq!(first.source, "Reuters");
        assert_eq!(first.url, "https://news.google.com/rss/articles/CBMiabc?oc=5");
        assert_eq!(first.listing_url, first.url);
        assert_eq!(first.published_at.unwrap().hour(), 3);
        assert_eq!(first.summary_seed, "Chipmakers expand capacity Reuters");
        assert_eq!(first.language, Language::EnUs);

        let second = &items[1];
        assert_eq!(second.title, "Fab output data");
        assert_eq!(second.source, "Example Daily");
        assert_eq!(second.url, "https://example.com/fab");
        assert!(second.published_at.is_none());

        let third = &items[2];
        assert_eq!(third.url, "https://example.org/story");
        assert_eq!(third.published_at.unwrap().offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_parse_feed_rejects_non_rss() {
        assert!(parse_feed("<html><body>blocked</body></html>", Language::EnUs).is_err());
    }

    #[test]
    fn test_unwrap_redirect() {
        assert_eq!(
            unwrap_redirect("https://example.com/a").as_deref(),
            Some("https://example.com/a")
        );
        assert_eq!(
            unwrap_redirect("https://news.google.com/articles/x?url=https%3A%2F%2Fa.com%2Fb")
                .as_deref(),
            Some("https://a.com/b")
        );
        assert_eq!(unwrap_redirect("https://news.google.com/rss/articles/x"), None);
    }

    #[test]
    fn test_search_url_carries_locale_and_window() {
        let adapter = GoogleNewsRss::new(&HttpSettings::default());
        let (start, end) = window();
        let url = adapter.search_url("台積電", Language::ZhTw, start, end);
        let parsed = Url::parse(&url).unwrap();
        let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
        assert!(pairs.contains(&(
            "q".to_string(),
            "台積電 after:2025-05-05 before:2025-05-07".to_string()
        )));
        assert!(pairs.contains(&("hl".to_string(), "zh-TW".to_string())));
        assert!(pairs.contains(&("gl".to_string(), "TW".to_string())));
        assert!(pairs.contains(&("ceid".to_string(), "TW:zh-Hant".to_string())));
    }

    #[tokio::test]
    async fn test_fetch_parses_feed_and_caps_count() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rss/search"))
            .and(query_param("hl", "en-US"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SAMPLE_FEED))
            .mount(&server)
            .await;

        let adapter = GoogleNewsRss::with_base_url(
            &HttpSettings::default(),
            &format!("{}/rss/search", server.uri()),
        );
        let (start, end) = window();
        let items = adapter.fetch("chips", Language::EnUs, start, end, 2).await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].source, "Reuters");
    }

    #[tokio::test]
    async fn test_fetch_returns_empty_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let adapter = GoogleNewsRss::with_base_url(&HttpSettings::default(), &server.uri());
        let (start, end) = window();
        assert!(adapter.fetch("chips", Language::EnUs, start, end, 10).await.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_returns_empty_on_malformed_feed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not xml at all"))
            .mount(&server)
            .await;

        let adapter = GoogleNewsRss::with_base_url(&HttpSettings::default(), &server.uri());
        let (start, end) = window();
        assert!(adapter.fetch("chips", Language::ZhTw, start, end, 10).await.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_returns_empty_when_unreachable() {
        let adapter = GoogleNewsRss::with_base_url(&HttpSettings::default(), "http://127.0.0.1:9");
        let (start, end) = window();
        assert!(adapter.fetch("chips", Language::EnUs, start, end, 10).await.is_empty());
    }
}
