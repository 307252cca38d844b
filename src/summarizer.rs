//! Bounded summaries of resolved article content.
//!
//! The default strategy is sentence-aware truncation:
//!
//! - content of at most [`MAX_SUMMARY_CHARS`] characters is returned unchanged
//! - otherwise the first [`MAX_SUMMARY_CHARS`] characters are cut back to the
//!   last sentence terminator beyond [`MIN_SUMMARY_CHARS`], or failing that to
//!   the last whitespace beyond it, or failing both left as is; trailing
//!   punctuation is then dropped and [`ELLIPSIS`] appended, so a cut reads
//!   `...` and never `。...` or `....`
//!
//! Terminators are `。！？` and `.`, `!`, `?` when followed by whitespace.
//!
//! An [`ExternalSummarizer`] may replace truncation when the caller asks for
//! it. Its output is bounded the same way, and any failure or empty answer
//! falls back to truncation, so a summary is never empty.

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::models::Language;
use crate::utils::char_len;

pub const MAX_SUMMARY_CHARS: usize = 600;
pub const MIN_SUMMARY_CHARS: usize = 450;
pub const ELLIPSIS: &str = "...";

const CJK_TERMINATORS: [char; 3] = ['。', '！', '？'];
const LATIN_TERMINATORS: [char; 3] = ['.', '!', '?'];
/// Stripped from the end of a cut before the ellipsis is added.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '。', '，', '；', '：', '！', '？'];

/// A summarization backend other than truncation (an LLM, a remote service).
///
/// Returning `None` means "no usable summary"; the caller falls back.
#[async_trait(?Send)]
pub trait ExternalSummarizer {
    async fn summarize(&self, content: &str, language: Language) -> Option<String>;

    fn name(&self) -> &'static str;
}

/// Truncate `content` to a bounded excerpt, preferring sentence boundaries.
pub fn truncate_summary(content: &str) -> String {
    let chars: Vec<char> = content.chars().collect();
    if chars.len() <= MAX_SUMMARY_CHARS {
        return content.to_string();
    }
    let head = &chars[..MAX_SUMMARY_CHARS];

    let cut = if let Some(end) = last_sentence_end(head).filter(|&i| i > MIN_SUMMARY_CHARS) {
        &head[..=end]
    } else if let Some(space) = head
        .iter()
        .rposition(|c| c.is_whitespace())
        .filter(|&i| i > MIN_SUMMARY_CHARS)
    {
        &head[..space]
    } else {
        head
    };
    with_ellipsis(cut)
}

fn with_ellipsis(cut: &[char]) -> String {
    let text: String = cut.iter().collect();
    text.trim_end_matches(TRAILING_PUNCTUATION).to_string() + ELLIPSIS
}

/// Index of the last sentence terminator in `chars`.
fn last_sentence_end(chars: &[char]) -> Option<usize> {
    (0..chars.len()).rev().find(|&i| {
        let c = chars[i];
        CJK_TERMINATORS.contains(&c)
            || (LATIN_TERMINATORS.contains(&c)
                && chars.get(i + 1).is_some_and(|next| next.is_whitespace()))
    })
}

/// Produces the summary of each resolved article.
pub struct Summarizer {
    external: Option<Box<dyn ExternalSummarizer>>,
    use_external: bool,
}

impl Summarizer {
    /// Truncation only.
    pub fn truncating() -> Self {
        Self {
            external: None,
            use_external: false,
        }
    }

    /// Truncation plus an optional external backend, used only when requested.
    pub fn new(external: Option<Box<dyn ExternalSummarizer>>, use_external: bool) -> Self {
        if use_external && external.is_none() {
            warn!("External summaries requested but no backend is available; truncating");
        }
        Self {
            external,
            use_external,
        }
    }

    #[instrument(level = "debug", skip_all, fields(chars = char_len(content), %language))]
    pub async fn summarize(&self, content: &str, language: Language) -> String {
        if content.trim().is_empty() {
            return language.unavailable_summary().to_string();
        }

        if let Some(external) = self.external.as_ref().filter(|_| self.use_external) {
            match external.summarize(content, language).await {
                Some(summary) if !summary.trim().is_empty() => {
                    debug!(backend = external.name(), "Using external summary");
                    return truncate_summary(summary.trim());
                }
                _ => warn!(
                    backend = external.name(),
                    "External summarizer gave nothing; truncating"
                ),
            }
        }

        truncate_summary(content)
    }
}
