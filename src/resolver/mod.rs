//! Content resolution: turn a candidate into body text via a fallback chain.
//!
//! The resolver holds an ordered list of [`ResolutionStage`]s and returns the
//! first one that produces text. If none does, the article resolves to a
//! localized placeholder with method [`ExtractionMethod::Failed`]. Resolution
//! itself never fails.
//!
//! | Order | Stage | Accepts when |
//! |-------|-------|--------------|
//! | 1 | [`PrimaryStage`] | static fetch + extraction yields at least 150 chars |
//! | 2 | [`RenderedStage`] | only with a renderer; rendered extraction yields at least 150 chars |
//! | 3 | [`PartialStage`] | the longest text seen so far is over 50 chars |
//! | 4 | [`SourceSummaryStage`] | the listing's summary is over 20 chars after trimming |
//!
//! `hasFullContent` is true exactly when the accepted text came from an
//! extraction stage and is at least [`MIN_CONTENT_CHARS`] long. Partial text
//! is below that by construction, so partial results never claim full content.

pub mod extract;
pub mod fetch;
pub mod render;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::config::{AppConfig, ExtractorKind};
use crate::models::{ArticleCandidate, ExtractionMethod};
use crate::utils::{char_len, truncate_for_log};
use extract::{ExtractMode, extract};
use fetch::HtmlFetcher;
use render::PageRenderer;

/// Minimum length of text accepted as the full article.
pub const MIN_CONTENT_CHARS: usize = 150;
/// Text must be longer than this to be accepted as partial content.
pub const PARTIAL_FLOOR_CHARS: usize = 50;
/// The listing summary must be longer than this (after trimming) to be used.
pub const SEED_FLOOR_CHARS: usize = 20;

/// The outcome of resolving one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub content: String,
    pub has_full_content: bool,
    pub method: ExtractionMethod,
}

/// State shared by the stages while one candidate is resolved.
pub struct StageContext<'a> {
    pub candidate: &'a ArticleCandidate,
    /// Extracted texts that were too short to accept, in the order seen.
    pub fragments: Vec<String>,
}

impl<'a> StageContext<'a> {
    pub fn new(candidate: &'a ArticleCandidate) -> Self {
        Self {
            candidate,
            fragments: Vec::new(),
        }
    }

    /// Accept `text` as full content or remember it as a fragment.
    fn accept_or_keep(&mut self, text: String) -> Option<String> {
        if char_len(&text) >= MIN_CONTENT_CHARS {
            return Some(text);
        }
        if !text.is_empty() {
            self.fragments.push(text);
        }
        None
    }
}

/// One step of the fallback chain.
///
/// A stage that cannot produce text returns `None`; failures are logged by the
/// stage and never escape it.
#[async_trait]
pub trait ResolutionStage: Send + Sync {
    fn method(&self) -> ExtractionMethod;

    async fn attempt(&self, ctx: &mut StageContext<'_>) -> Option<String>;
}

/// Static fetch plus precision extraction.
pub struct PrimaryStage {
    fetcher: HtmlFetcher,
    extractor: ExtractorKind,
}

impl PrimaryStage {
    pub fn new(fetcher: HtmlFetcher, extractor: ExtractorKind) -> Self {
        Self { fetcher, extractor }
    }
}

#[async_trait]
impl ResolutionStage for PrimaryStage {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Primary
    }

    async fn attempt(&self, ctx: &mut StageContext<'_>) -> Option<String> {
        let candidate = ctx.candidate;
        let url = &candidate.url;
        let html = match self.fetcher.fetch(url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(%url, error = %e, "Primary fetch failed");
                return None;
            }
        };
        let text = extract(self.extractor, &html, ExtractMode::Precision);
        debug!(%url, chars = char_len(&text), "Primary extraction");
        ctx.accept_or_keep(text)
    }
}

/// Headless render plus recall extraction.
pub struct RenderedStage {
    renderer: Arc<dyn PageRenderer>,
}

impl RenderedStage {
    pub fn new(renderer: Arc<dyn PageRenderer>) -> Self {
        Self { renderer }
    }
}

#[async_trait]
impl ResolutionStage for RenderedStage {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Rendered
    }

    async fn attempt(&self, ctx: &mut StageContext<'_>) -> Option<String> {
        let candidate = ctx.candidate;
        let url = &candidate.url;
        let page = match self.renderer.render(url).await {
            Ok(page) => page,
            Err(e) => {
                warn!(%url, renderer = self.renderer.name(), error = %e, "Render failed");
                return None;
            }
        };
        let text = extract(ExtractorKind::Boilerplate, &page.html, ExtractMode::Recall);
        debug!(%url, final_url = %page.final_url, chars = char_len(&text), "Rendered extraction");
        ctx.accept_or_keep(text)
    }
}

/// The longest too-short text seen by earlier stages, if over the floor.
pub struct PartialStage;

#[async_trait]
impl ResolutionStage for PartialStage {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Partial
    }

    async fn attempt(&self, ctx: &mut StageContext<'_>) -> Option<String> {
        ctx.fragments
            .iter()
            .max_by_key(|f| char_len(f))
            .filter(|f| char_len(f) > PARTIAL_FLOOR_CHARS)
            .cloned()
    }
}

/// The listing's own summary, trimmed but otherwise verbatim.
pub struct SourceSummaryStage;

#[async_trait]
impl ResolutionStage for SourceSummaryStage {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::SourceSummary
    }

    async fn attempt(&self, ctx: &mut StageContext<'_>) -> Option<String> {
        let seed = ctx.candidate.summary_seed.trim();
        (char_len(seed) > SEED_FLOOR_CHARS).then(|| seed.to_string())
    }
}

/// Runs the fallback chain for one candidate at a time.
pub struct ContentResolver {
    stages: Vec<Box<dyn ResolutionStage>>,
}

impl ContentResolver {
    /// Build the standard chain. The rendered stage exists only with a renderer.
    pub fn new(
        fetcher: HtmlFetcher,
        extractor: ExtractorKind,
        renderer: Option<Arc<dyn PageRenderer>>,
    ) -> Self {
        let mut stages: Vec<Box<dyn ResolutionStage>> =
            vec![Box::new(PrimaryStage::new(fetcher, extractor))];
        if let Some(renderer) = renderer {
            stages.push(Box::new(RenderedStage::new(renderer)));
        }
        stages.push(Box::new(PartialStage));
        stages.push(Box::new(SourceSummaryStage));
        Self::with_stages(stages)
    }

    pub fn from_config(config: &AppConfig, renderer: Option<Arc<dyn PageRenderer>>) -> Self {
        Self::new(
            HtmlFetcher::new(&config.http),
            config.extraction.extractor,
            renderer,
        )
    }

    pub fn with_stages(stages: Vec<Box<dyn ResolutionStage>>) -> Self {
        Self { stages }
    }

    /// Methods of the configured stages, in order.
    pub fn stage_methods(&self) -> Vec<ExtractionMethod> {
        self.stages.iter().map(|s| s.method()).collect()
    }

    #[instrument(level = "info", skip_all, fields(url = %candidate.url))]
    pub async fn resolve(&self, candidate: &ArticleCandidate) -> Resolution {
        let mut ctx = StageContext::new(candidate);
        for stage in &self.stages {
            let method = stage.method();
            if let Some(content) = stage.attempt(&mut ctx).await {
                let has_full_content = matches!(
                    method,
                    ExtractionMethod::Primary | ExtractionMethod::Rendered | ExtractionMethod::Partial
                ) && char_len(&content) >= MIN_CONTENT_CHARS;
                info!(
                    %method,
                    chars = char_len(&content),
                    has_full_content,
                    preview = %truncate_for_log(&content, 80),
                    "Resolved content"
                );
                return Resolution {
                    content,
                    has_full_content,
                    method,
                };
            }
        }

        warn!(title = %candidate.title, "No stage produced content");
        Resolution {
            content: candidate.language.unavailable_content().to_string(),
            has_full_content: false,
            method: ExtractionMethod::Failed,
        }
    }
}
