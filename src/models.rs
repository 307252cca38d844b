//! Data models for article listings and their resolved representations.
//!
//! This module defines the core data structures used throughout the application:
//! - [`ArticleCandidate`]: An unresolved article reference produced by a source adapter
//! - [`ResolvedArticle`]: A candidate plus extracted content, summary, and provenance
//! - [`Digest`]: The ordered result of one run, handed to the delivery layer
//! - Enumerations: [`Language`], [`LanguageSelection`], [`SearchMode`], [`ExtractionMethod`]
//!
//! The serialized models use camelCase field names to match the JSON consumed
//! by the delivery layer.

use chrono::{DateTime, FixedOffset};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single listing language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "zh-TW")]
    ZhTw,
    #[serde(rename = "en-US")]
    EnUs,
}

impl Language {
    /// The BCP 47 tag used on the wire and in output files.
    pub fn tag(self) -> &'static str {
        match self {
            Language::ZhTw => "zh-TW",
            Language::EnUs => "en-US",
        }
    }

    /// Placeholder content used when every extraction stage came up empty.
    pub fn unavailable_content(self) -> &'static str {
        match self {
            Language::ZhTw => "此新聞來源暫時無法取得內容，請點擊標題連結查看原文。",
            Language::EnUs => {
                "The content of this article is temporarily unavailable. Please open the original link to read it."
            }
        }
    }

    /// Placeholder summary used when there is no text to summarize.
    pub fn unavailable_summary(self) -> &'static str {
        match self {
            Language::ZhTw => "無法取得內容摘要，請點擊標題查看原文。",
            Language::EnUs => "No summary is available. Please open the original link to read the article.",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// The language choice of a query: one language, or both fetched concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum LanguageSelection {
    #[serde(rename = "zh-TW")]
    #[value(name = "zh-TW")]
    ZhTw,
    #[serde(rename = "en-US")]
    #[value(name = "en-US")]
    EnUs,
    #[serde(rename = "both")]
    #[value(name = "both")]
    Both,
}

impl LanguageSelection {
    /// Expand into the single-language fetches this selection requires.
    pub fn languages(self) -> Vec<Language> {
        match self {
            LanguageSelection::ZhTw => vec![Language::ZhTw],
            LanguageSelection::EnUs => vec![Language::EnUs],
            LanguageSelection::Both => vec![Language::ZhTw, Language::EnUs],
        }
    }
}

impl fmt::Display for LanguageSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LanguageSelection::ZhTw => f.write_str("zh-TW"),
            LanguageSelection::EnUs => f.write_str("en-US"),
            LanguageSelection::Both => f.write_str("both"),
        }
    }
}

/// Which source adapter a query asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Google News RSS search feed.
    Rss,
    /// Google Custom Search JSON API.
    Google,
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchMode::Rss => f.write_str("rss"),
            SearchMode::Google => f.write_str("google"),
        }
    }
}

/// An unresolved article reference produced by a source adapter.
///
/// Candidates are immutable once built; the aggregator only reorders and
/// filters them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleCandidate {
    /// Headline, never empty.
    pub title: String,
    /// Absolute article URL. May still be a redirector or tracking URL.
    pub url: String,
    /// The link exactly as the listing provided it.
    pub listing_url: String,
    /// Free-text publisher label, may be empty.
    pub source: String,
    /// Publish time. `None` is a valid state, not an error.
    pub published_at: Option<DateTime<FixedOffset>>,
    /// Short adapter-provided text, used only as a last-resort fallback.
    pub summary_seed: String,
    pub language: Language,
}

/// Which fallback stage supplied an article's final content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExtractionMethod {
    /// Static fetch plus boilerplate removal.
    Primary,
    /// Headless render plus recall-oriented extraction.
    Rendered,
    /// Best available text below the full-content threshold.
    Partial,
    /// The adapter's own summary text.
    SourceSummary,
    /// Nothing usable; content is a placeholder.
    Failed,
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExtractionMethod::Primary => "primary",
            ExtractionMethod::Rendered => "rendered",
            ExtractionMethod::Partial => "partial",
            ExtractionMethod::SourceSummary => "sourceSummary",
            ExtractionMethod::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// The output of the full pipeline for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedArticle {
    pub title: String,
    pub url: String,
    pub listing_url: String,
    pub source: String,
    pub published_at: Option<DateTime<FixedOffset>>,
    pub summary_seed: String,
    pub language: Language,
    /// Resolved body text, never empty.
    pub content: String,
    pub has_full_content: bool,
    pub extraction_method: ExtractionMethod,
    /// Bounded excerpt derived from `content`.
    pub summary: String,
}

impl ResolvedArticle {
    /// Combine a candidate with its resolved content and summary.
    pub fn from_candidate(
        candidate: ArticleCandidate,
        content: String,
        has_full_content: bool,
        extraction_method: ExtractionMethod,
        summary: String,
    ) -> Self {
        Self {
            title: candidate.title,
            url: candidate.url,
            listing_url: candidate.listing_url,
            source: candidate.source,
            published_at: candidate.published_at,
            summary_seed: candidate.summary_seed,
            language: candidate.language,
            content,
            has_full_content,
            extraction_method,
            summary,
        }
    }

    /// Extract the domain name (before .com/.org/etc) from the article URL.
    /// For example: "https://www.cna.com.tw/news/1" -> "cna"
    pub fn source_tag(&self) -> Option<String> {
        let parsed = url::Url::parse(&self.url).ok()?;
        let host = parsed.host_str()?;
        let parts: Vec<&str> = host
            .split('.')
            .filter(|p| !matches!(*p, "www" | "com" | "org" | "net" | "co" | "tw" | "uk"))
            .collect();
        parts.last().map(|p| p.to_string())
    }
}

/// Echo of the parameters a digest was produced for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub keyword: String,
    pub language: LanguageSelection,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub requested_count: usize,
    /// The adapter that actually served the listing.
    pub search_mode: SearchMode,
}

/// An ordered set of resolved articles plus a note describing any degradation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Digest {
    pub search_params: SearchParams,
    pub articles: Vec<ResolvedArticle>,
    pub note: Option<String>,
}
