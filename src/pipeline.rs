//! One digest run, from query to resolved articles.
//!
//! ```text
//! select source ─▶ fetch (count × 3 per language) ─▶ merge ─▶ window ─▶ sort
//!     ─▶ dedupe ─▶ top N ─▶ resolve + summarize (one article at a time)
//! ```
//!
//! Listings are oversampled because the window filter and de-duplication
//! usually discard part of them. Articles are resolved sequentially so a run
//! never hits many origin sites at once.
//!
//! A run always yields a [`Digest`]. Zero results, fewer results than asked
//! for and a substituted source are reported in [`Digest::note`].

use tracing::{info, instrument};

use crate::aggregator::{dedupe, filter_by_window, merge, select_top, sort_by_recency};
use crate::models::{Digest, ResolvedArticle, SearchParams};
use crate::query::NewsQuery;
use crate::resolver::ContentResolver;
use crate::sources::{SourceSet, fetch_listings};
use crate::summarizer::Summarizer;
use crate::utils::truncate_for_log;

/// Candidates requested per language for each article asked for.
pub const OVERSAMPLE_FACTOR: usize = 3;

pub struct Pipeline {
    sources: SourceSet,
    resolver: ContentResolver,
    summarizer: Summarizer,
}

impl Pipeline {
    pub fn new(sources: SourceSet, resolver: ContentResolver, summarizer: Summarizer) -> Self {
        Self {
            sources,
            resolver,
            summarizer,
        }
    }

    #[instrument(
        level = "info",
        skip_all,
        fields(keyword = %query.keyword, language = %query.language, count = query.count)
    )]
    pub async fn run(&self, query: &NewsQuery) -> Digest {
        let selected = self.sources.select(query.search_mode);
        info!(source = selected.source.name(), mode = %selected.mode, "Selected source");

        let listings = fetch_listings(
            selected.source.as_ref(),
            &query.keyword,
            query.language,
            query.start,
            query.end,
            query.count * OVERSAMPLE_FACTOR,
        )
        .await;

        let candidates = merge(listings);
        let candidates = filter_by_window(candidates, query.start, query.end);
        let candidates = sort_by_recency(candidates);
        let candidates = dedupe(candidates);
        let top = select_top(candidates, query.count);

        let total = top.len();
        let mut articles = Vec::with_capacity(total);
        for (i, candidate) in top.into_iter().enumerate() {
            info!(
                n = i + 1,
                total,
                title = %truncate_for_log(&candidate.title, 60),
                "Resolving article"
            );
            let resolution = self.resolver.resolve(&candidate).await;
            let summary = self
                .summarizer
                .summarize(&resolution.content, candidate.language)
                .await;
            articles.push(ResolvedArticle::from_candidate(
                candidate,
                resolution.content,
                resolution.has_full_content,
                resolution.method,
                summary,
            ));
        }

        let note = compose_note(
            &query.keyword,
            articles.len(),
            query.count,
            selected.fallback_note.as_deref(),
        );
        info!(
            articles = articles.len(),
            full_content = articles.iter().filter(|a| a.has_full_content).count(),
            note = note.as_deref().unwrap_or(""),
            "Digest complete"
        );

        Digest {
            search_params: SearchParams {
                keyword: query.keyword.clone(),
                language: query.language,
                start: query.start,
                end: query.end,
                requested_count: query.count,
                search_mode: selected.mode,
            },
            articles,
            note,
        }
    }
}

/// Describe every way the result falls short of the request, if any.
fn compose_note(
    keyword: &str,
    found: usize,
    requested: usize,
    fallback: Option<&str>,
) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    if let Some(fallback) = fallback {
        parts.push(format!("{fallback}."));
    }
    if found == 0 {
        parts.push(format!(
            "No articles matched \"{keyword}\" in the selected date range; try another keyword or a wider range."
        ));
    } else if found < requested {
        parts.push(format!(
            "Only {found} matching articles were found, fewer than the {requested} requested."
        ));
    }
    (!parts.is_empty()).then(|| parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::DateMode;
    use crate::config::{ExtractorKind, HttpSettings};
    use crate::models::{ArticleCandidate, ExtractionMethod, Language, LanguageSelection, SearchMode};
    use crate::resolver::fetch::HtmlFetcher;
    use crate::sources::testing::{StaticSource, candidate};
    use chrono::{DateTime, FixedOffset};
    use std::sync::Arc;

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2025-05-06T20:00:00+08:00").unwrap()
    }

    fn query(count: usize, language: LanguageSelection, mode: SearchMode) -> NewsQuery {
        NewsQuery::build("chips", language, count, DateMode::Today, None, None, mode, now()).unwrap()
    }

    fn dated(url: &str, language: Language, published: &str) -> ArticleCandidate {
        ArticleCandidate {
            published_at: Some(DateTime::parse_from_rfc3339(published).unwrap()),
            summary_seed: "A listing summary that is long enough to use.".to_string(),
            ..candidate(url, language)
        }
    }

    fn pipeline(feed: StaticSource, search: StaticSource) -> Pipeline {
        Pipeline::new(
            SourceSet::new(Arc::new(feed), Arc::new(search)),
            ContentResolver::new(
                HtmlFetcher::new(&HttpSettings::default()),
                ExtractorKind::Boilerplate,
                None,
            ),
            Summarizer::truncating(),
        )
    }

    #[tokio::test]
    async fn test_fewer_results_than_requested_adds_note() {
        let feed = StaticSource::new(
            "feed",
            vec![(
                Language::ZhTw,
                vec![
                    dated("http://127.0.0.1:9/a?utm_source=x", Language::ZhTw, "2025-05-06T09:00:00+08:00"),
                    dated("http://127.0.0.1:9/a", Language::ZhTw, "2025-05-06T08:00:00+08:00"),
                    dated("http://127.0.0.1:9/b", Language::ZhTw, "2025-05-06T10:00:00+08:00"),
                    dated("http://127.0.0.1:9/old", Language::ZhTw, "2025-05-01T10:00:00+08:00"),
                    candidate("http://127.0.0.1:9/undated", Language::ZhTw),
                ],
            )],
        );
        let pipeline = pipeline(feed, StaticSource::new("search", vec![]));
        let digest = pipeline
            .run(&query(5, LanguageSelection::ZhTw, SearchMode::Rss))
            .await;

        let urls: Vec<&str> = digest.articles.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "http://127.0.0.1:9/b",
                "http://127.0.0.1:9/a?utm_source=x",
                "http://127.0.0.1:9/undated"
            ]
        );
        let note = digest.note.unwrap();
        assert!(note.contains("Only 3"));
        assert!(note.contains("5 requested"));
        assert_eq!(digest.search_params.search_mode, SearchMode::Rss);
    }

    #[tokio::test]
    async fn test_articles_are_resolved_and_summarized() {
        let feed = StaticSource::new(
            "feed",
            vec![(
                Language::EnUs,
                vec![
                    dated("http://127.0.0.1:9/a", Language::EnUs, "2025-05-06T09:00:00+08:00"),
                    candidate("http://127.0.0.1:9/b", Language::EnUs),
                ],
            )],
        );
        let digest = pipeline(feed, StaticSource::new("search", vec![]))
            .run(&query(2, LanguageSelection::EnUs, SearchMode::Rss))
            .await;

        assert_eq!(digest.articles.len(), 2);
        assert!(digest.note.is_none());

        let seeded = &digest.articles[0];
        assert_eq!(seeded.extraction_method, ExtractionMethod::SourceSummary);
        assert_eq!(seeded.summary, seeded.content);

        let failed = &digest.articles[1];
        assert_eq!(failed.extraction_method, ExtractionMethod::Failed);
        assert!(!failed.content.is_empty());
        assert!(!failed.summary.is_empty());
    }

    #[tokio::test]
    async fn test_oversamples_each_language() {
        let feed = Arc::new(StaticSource::new("feed", vec![]));
        let pipeline = Pipeline::new(
            SourceSet::new(feed.clone(), Arc::new(StaticSource::new("search", vec![]))),
            ContentResolver::new(
                HtmlFetcher::new(&HttpSettings::default()),
                ExtractorKind::Boilerplate,
                None,
            ),
            Summarizer::truncating(),
        );
        pipeline
            .run(&query(4, LanguageSelection::Both, SearchMode::Rss))
            .await;

        let mut calls = feed.calls.lock().unwrap().clone();
        calls.sort_by_key(|(l, _)| l.tag());
        assert_eq!(calls, vec![(Language::EnUs, 12), (Language::ZhTw, 12)]);
    }

    #[tokio::test]
    async fn test_zero_results_is_a_note_not_an_error() {
        let digest = pipeline(
            StaticSource::new("feed", vec![]),
            StaticSource::new("search", vec![]),
        )
        .run(&query(5, LanguageSelection::Both, SearchMode::Rss))
        .await;

        assert!(digest.articles.is_empty());
        assert!(digest.note.unwrap().contains("No articles matched \"chips\""));
    }

    #[tokio::test]
    async fn test_unconfigured_source_substitution_is_noted() {
        let feed = StaticSource::new(
            "feed",
            vec![(
                Language::ZhTw,
                vec![candidate("http://127.0.0.1:9/a", Language::ZhTw)],
            )],
        );
        let digest = pipeline(feed, StaticSource::unconfigured("search"))
            .run(&query(1, LanguageSelection::ZhTw, SearchMode::Google))
            .await;

        assert_eq!(digest.articles.len(), 1);
        assert_eq!(digest.search_params.search_mode, SearchMode::Rss);
        let note = digest.note.unwrap();
        assert!(note.contains("search is not configured"));
    }

    #[test]
    fn test_compose_note() {
        assert_eq!(compose_note("k", 5, 5, None), None);
        assert!(compose_note("k", 2, 5, Some("fallback used")).unwrap().starts_with("fallback used."));
    }
}
