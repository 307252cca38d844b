//! Google Custom Search JSON API adapter.
//!
//! Needs an API key and a Programmable Search Engine id (`cx`). The free tier
//! allows 100 queries per day and at most 10 results per call, so this adapter
//! returns at most 10 candidates per language regardless of `max_count`.
//!
//! Publish dates are not part of the result schema; they are read from the
//! page's `pagemap.metatags` when the engine indexed them.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use super::NewsSource;
use crate::config::{GoogleSearchSettings, HttpSettings};
use crate::models::{ArticleCandidate, Language};
use crate::utils::{collapse_whitespace, now_in, parse_published, truncate_for_log};

pub const CUSTOM_SEARCH_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

/// Hard per-call result limit of the API.
const MAX_RESULTS_PER_CALL: usize = 10;

/// Metadata keys that may carry the publish time, in preference order.
const DATE_META_KEYS: [&str; 4] = ["article:published_time", "og:updated_time", "date", "pubdate"];

#[derive(Debug, Error)]
enum SearchApiError {
    #[error("quota exhausted or API key rejected")]
    Forbidden,
    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    pagemap: Value,
}

/// The Custom Search adapter.
pub struct GoogleCustomSearch {
    client: Client,
    credentials: GoogleSearchSettings,
    endpoint: String,
}

impl GoogleCustomSearch {
    pub fn new(http: &HttpSettings, credentials: GoogleSearchSettings) -> Self {
        Self::with_endpoint(http, credentials, CUSTOM_SEARCH_ENDPOINT)
    }

    /// Point the adapter at a different endpoint (used by tests).
    pub fn with_endpoint(
        http: &HttpSettings,
        credentials: GoogleSearchSettings,
        endpoint: &str,
    ) -> Self {
        if !credentials.is_configured() {
            warn!("Google Custom Search credentials are not set; adapter disabled");
        }
        Self {
            client: Client::builder()
                .timeout(http.feed_timeout())
                .user_agent(http.user_agent.as_str())
                .build()
                .unwrap_or_else(|_| Client::new()),
            credentials,
            endpoint: endpoint.to_string(),
        }
    }

    async fn search(
        &self,
        keyword: &str,
        language: Language,
        start: DateTime<FixedOffset>,
        max_count: usize,
    ) -> Result<SearchResponse, SearchApiError> {
        let (lr, gl, hl, suffix) = match language {
            Language::ZhTw => ("lang_zh-TW", "tw", "zh-TW", "新聞"),
            Language::EnUs => ("lang_en", "us", "en", "news"),
        };
        let query = format!("{keyword} {suffix}");
        let num = max_count.min(MAX_RESULTS_PER_CALL).to_string();
        let restrict = date_restrict(start, now_in(*start.offset()));

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("key", self.credentials.api_key.as_str()),
                ("cx", self.credentials.engine_id.as_str()),
                ("q", query.as_str()),
                ("num", num.as_str()),
                ("lr", lr),
                ("gl", gl),
                ("hl", hl),
                ("sort", "date"),
                ("dateRestrict", restrict.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            return Err(SearchApiError::Forbidden);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchApiError::Status {
                status,
                body: truncate_for_log(&body, 300),
            });
        }
        Ok(response.json::<SearchResponse>().await?)
    }
}

#[async_trait]
impl NewsSource for GoogleCustomSearch {
    #[instrument(level = "info", skip_all, fields(%keyword, %language, max_count = max_count))]
    async fn fetch(
        &self,
        keyword: &str,
        language: Language,
        start: DateTime<FixedOffset>,
        _end: DateTime<FixedOffset>,
        max_count: usize,
    ) -> Vec<ArticleCandidate> {
        if !self.is_configured() {
            error!("Google Custom Search called without credentials");
            return Vec::new();
        }

        let response = match self.search(keyword, language, start, max_count).await {
            Ok(response) => response,
            Err(SearchApiError::Forbidden) => {
                error!("Google Custom Search quota exhausted or API key invalid");
                return Vec::new();
            }
            Err(e) => {
                error!(error = %e, "Google Custom Search request failed");
                return Vec::new();
            }
        };

        let candidates: Vec<ArticleCandidate> = response
            .items
            .into_iter()
            .filter_map(|item| parse_item(item, language))
            .take(max_count)
            .collect();
        info!(count = candidates.len(), "Parsed Google Custom Search results");
        candidates
    }

    fn name(&self) -> &'static str {
        "Google Custom Search"
    }

    fn is_configured(&self) -> bool {
        self.credentials.is_configured()
    }
}

/// `dateRestrict` value covering `start` through today: `d<N>`, N >= 1.
fn date_restrict(start: DateTime<FixedOffset>, now: DateTime<FixedOffset>) -> String {
    let start_day = start.with_timezone(now.offset()).date_naive();
    let days = (now.date_naive() - start_day).num_days() + 1;
    format!("d{}", days.max(1))
}

fn parse_item(item: SearchItem, language: Language) -> Option<ArticleCandidate> {
    let title = collapse_whitespace(&item.title);
    let link = item.link.trim().to_string();
    if title.is_empty() || link.is_empty() {
        return None;
    }

    let published_at = first_object(&item.pagemap, "metatags").and_then(|meta| {
        DATE_META_KEYS
            .iter()
            .find_map(|key| meta.get(*key).and_then(Value::as_str))
            .and_then(|raw| {
                let parsed = parse_published(raw);
                if parsed.is_none() {
                    debug!(raw, "Unparseable metatag date");
                }
                parsed
            })
    });

    let source = first_object(&item.pagemap, "newsarticle")
        .and_then(|article| article.get("source").and_then(Value::as_str))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| host_label(&link))
        .unwrap_or_default();

    Some(ArticleCandidate {
        title,
        url: link.clone(),
        listing_url: link,
        source,
        published_at,
        summary_seed: collapse_whitespace(&item.snippet),
        language,
    })
}

/// `pagemap[key][0]`, when present.
fn first_object<'a>(pagemap: &'a Value, key: &str) -> Option<&'a Value> {
    pagemap.get(key)?.as_array()?.first()
}

/// The link's host without a leading `www.`.
fn host_label(link: &str) -> Option<String> {
    let parsed = Url::parse(link).ok()?;
    let host = parsed.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_string())
}
