//! Source adapters that turn a keyword query into article candidates.
//!
//! Each adapter implements [`NewsSource`] and is interchangeable with the
//! others. Adapters never fail: any network, parse or quota problem is logged
//! and reported as an empty listing.
//!
//! # Supported Sources
//!
//! | Source | Module | Method | Notes |
//! |--------|--------|--------|-------|
//! | Google News | [`google_news`] | RSS search feed | No credentials; links may be redirectors |
//! | Google Custom Search | [`custom_search`] | JSON API | Requires API key and engine id; 10 results per call |
//!
//! # Date windows
//!
//! Adapters narrow the upstream query with a coarse window (search operators
//! or `dateRestrict`). That is only an optimization; the aggregator applies the
//! exact window afterwards.

pub mod custom_search;
pub mod google_news;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::models::{ArticleCandidate, Language, LanguageSelection, SearchMode};

/// A listing provider for one language at a time.
#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Fetch at most `max_count` candidates for `keyword` in `language`.
    ///
    /// Never fails; an empty vector means "no results from this source".
    async fn fetch(
        &self,
        keyword: &str,
        language: Language,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
        max_count: usize,
    ) -> Vec<ArticleCandidate>;

    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Whether the adapter has everything it needs (credentials etc.).
    fn is_configured(&self) -> bool {
        true
    }
}

/// Fetch one listing per language in `selection`.
///
/// With [`LanguageSelection::Both`] the two fetches run concurrently and this
/// returns only after both completed. Listings come back in language order
/// (zh-TW first) so they can be merged deterministically.
#[instrument(level = "info", skip_all, fields(source = source.name(), %selection, max_count = max_count))]
pub async fn fetch_listings(
    source: &dyn NewsSource,
    keyword: &str,
    selection: LanguageSelection,
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
    max_count: usize,
) -> Vec<Vec<ArticleCandidate>> {
    let fetches = selection
        .languages()
        .into_iter()
        .map(|language| source.fetch(keyword, language, start, end, max_count));
    let listings = join_all(fetches).await;
    info!(
        sizes = ?listings.iter().map(Vec::len).collect::<Vec<_>>(),
        "Fetched listings"
    );
    listings
}

/// The two interchangeable adapters, selected per query.
#[derive(Clone)]
pub struct SourceSet {
    pub feed: Arc<dyn NewsSource>,
    pub search: Arc<dyn NewsSource>,
}

/// The adapter picked for a query and the mode it actually serves.
pub struct SelectedSource {
    pub source: Arc<dyn NewsSource>,
    pub mode: SearchMode,
    /// Set when the requested adapter was unconfigured and the other was used.
    pub fallback_note: Option<String>,
}

impl SourceSet {
    pub fn new(feed: Arc<dyn NewsSource>, search: Arc<dyn NewsSource>) -> Self {
        Self { feed, search }
    }

    fn get(&self, mode: SearchMode) -> &Arc<dyn NewsSource> {
        match mode {
            SearchMode::Rss => &self.feed,
            SearchMode::Google => &self.search,
        }
    }

    /// Pick the adapter for `requested`, substituting the other one when the
    /// requested adapter is not configured.
    pub fn select(&self, requested: SearchMode) -> SelectedSource {
        let preferred = self.get(requested);
        if preferred.is_configured() {
            return SelectedSource {
                source: Arc::clone(preferred),
                mode: requested,
                fallback_note: None,
            };
        }

        let other_mode = match requested {
            SearchMode::Rss => SearchMode::Google,
            SearchMode::Google => SearchMode::Rss,
        };
        let other = self.get(other_mode);
        warn!(
            requested = preferred.name(),
            substitute = other.name(),
            "Requested source is not configured; substituting"
        );
        SelectedSource {
            source: Arc::clone(other),
            mode: other_mode,
            fallback_note: Some(format!(
                "{} is not configured; results come from {} instead",
                preferred.name(),
                other.name()
            )),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{StaticSource, candidate};
    use super::*;

    fn window() -> (DateTime<FixedOffset>, DateTime<FixedOffset>) {
        (
            DateTime::parse_from_rfc3339("2025-05-06T00:00:00+08:00").unwrap(),
            DateTime::parse_from_rfc3339("2025-05-06T23:59:59+08:00").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_both_languages_fetch_each_once_in_order() {
        let source = StaticSource::new(
            "static",
            vec![
                (Language::EnUs, vec![candidate("https://en.example/1", Language::EnUs)]),
                (Language::ZhTw, vec![candidate("https://zh.example/1", Language::ZhTw)]),
            ],
        );
        let (start, end) = window();
        let listings =
            fetch_listings(&source, "AI", LanguageSelection::Both, start, end, 15).await;

        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0][0].language, Language::ZhTw);
        assert_eq!(listings[1][0].language, Language::EnUs);
        let mut calls = source.calls.lock().unwrap().clone();
        calls.sort_by_key(|(l, _)| l.tag());
        assert_eq!(calls, vec![(Language::EnUs, 15), (Language::ZhTw, 15)]);
    }

    #[tokio::test]
    async fn test_single_language_fetch() {
        let source = StaticSource::new("static", vec![]);
        let (start, end) = window();
        let listings =
            fetch_listings(&source, "AI", LanguageSelection::EnUs, start, end, 5).await;
        assert_eq!(listings, vec![Vec::<ArticleCandidate>::new()]);
        assert_eq!(*source.calls.lock().unwrap(), vec![(Language::EnUs, 5)]);
    }

    #[test]
    fn test_select_configured_source() {
        let set = SourceSet::new(
            Arc::new(StaticSource::new("feed", vec![])),
            Arc::new(StaticSource::new("search", vec![])),
        );
        let selected = set.select(SearchMode::Google);
        assert_eq!(selected.mode, SearchMode::Google);
        assert_eq!(selected.source.name(), "search");
        assert!(selected.fallback_note.is_none());
    }

    #[test]
    fn test_select_substitutes_unconfigured_source() {
        let set = SourceSet::new(
            Arc::new(StaticSource::new("feed", vec![])),
            Arc::new(StaticSource::unconfigured("search")),
        );
        let selected = set.select(SearchMode::Google);
        assert_eq!(selected.mode, SearchMode::Rss);
        assert_eq!(selected.source.name(), "feed");
        let note = selected.fallback_note.unwrap();
        assert!(note.contains("search"));
        assert!(note.contains("feed"));
    }
}
