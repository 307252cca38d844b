//! Merging, windowing, ordering and de-duplication of article listings.
//!
//! The steps are small pure functions so the pipeline can apply them in the
//! order it needs and tests can check each one alone:
//!
//! 1. [`merge`]: concatenate listings, preserving each listing's order
//! 2. [`filter_by_window`]: keep undated candidates and in-window dated ones
//! 3. [`sort_by_recency`]: newest first, undated last
//! 4. [`dedupe`]: first occurrence of each [`dedup_key`] wins
//! 5. [`select_top`]: truncate to the requested count

use chrono::{DateTime, FixedOffset};
use itertools::Itertools;
use std::cmp::Reverse;
use tracing::{debug, info};
use url::Url;

use crate::models::ArticleCandidate;

/// Query parameters that only track the click and never identify the article.
pub const TRACKING_PARAMS: [&str; 12] = [
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "msclkid",
    "ref",
    "source",
    "mc_cid",
    "mc_eid",
];

/// Concatenate listings. Each listing keeps its internal order.
pub fn merge(listings: Vec<Vec<ArticleCandidate>>) -> Vec<ArticleCandidate> {
    listings.into_iter().flatten().collect()
}

/// Keep candidates published inside `[start, end]`.
///
/// Candidates without a timestamp are always kept. Comparison happens on
/// absolute instants, so the three timestamps may carry different offsets.
pub fn filter_by_window(
    candidates: Vec<ArticleCandidate>,
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
) -> Vec<ArticleCandidate> {
    let before = candidates.len();
    let kept: Vec<ArticleCandidate> = candidates
        .into_iter()
        .filter(|c| match c.published_at {
            None => true,
            Some(published) => start <= published && published <= end,
        })
        .collect();
    info!(before, after = kept.len(), "Filtered candidates by date window");
    kept
}

/// Sort newest first. Undated candidates sink below every dated one.
///
/// The sort is stable, so equal timestamps keep their merged order.
pub fn sort_by_recency(mut candidates: Vec<ArticleCandidate>) -> Vec<ArticleCandidate> {
    // `None < Some(_)`, so reversing puts every undated candidate last.
    // Offsets do not matter: `DateTime` orders by instant.
    candidates.sort_by_key(|c| Reverse(c.published_at));
    candidates
}

/// Drop candidates whose [`dedup_key`] has already been seen. First wins.
pub fn dedupe(candidates: Vec<ArticleCandidate>) -> Vec<ArticleCandidate> {
    let before = candidates.len();
    let unique: Vec<ArticleCandidate> = candidates
        .into_iter()
        .unique_by(|c| dedup_key(&c.url))
        .collect();
    info!(before, after = unique.len(), "De-duplicated candidates by URL");
    unique
}

/// Keep at most `n` candidates.
pub fn select_top(mut candidates: Vec<ArticleCandidate>, n: usize) -> Vec<ArticleCandidate> {
    candidates.truncate(n);
    candidates
}

/// Canonical form of an article URL used to detect duplicates.
///
/// Lowercases the URL, removes [`TRACKING_PARAMS`], drops the fragment and a
/// trailing slash on the path. Remaining query parameters keep their order.
/// Strings that do not parse as URLs are only lowercased.
pub fn dedup_key(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let Ok(mut url) = Url::parse(&lowered) else {
        debug!(url = %raw, "URL did not parse; using lowercased form as dedup key");
        return lowered;
    };

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url.set_fragment(None);

    let mut key = url.to_string();
    if url.path().len() > 1 && url.path().ends_with('/') {
        // Trailing slash sits right before the query, or ends the string.
        let path_end = key.find('?').unwrap_or(key.len());
        if key[..path_end].ends_with('/') {
            key.remove(path_end - 1);
        }
    } else if url.path() == "/" && url.query().is_none() {
        key = key.trim_end_matches('/').to_string();
    }
    key
}
