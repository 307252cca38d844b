//! Markdown rendering of a digest.
//!
//! The document starts with the query echo and the note, then lists each
//! article as a section:
//!
//! ```markdown
//! ## 1. Chip exports hit a record
//!
//! *Example Wire* · 2025-05-06 09:30 +08:00 · partial
//!
//! Exports rose. Demand for servers stayed strong.
//!
//! [Read the original](https://example.com/chips)
//! ```

use crate::models::{Digest, ExtractionMethod};
use std::error::Error;
use std::fmt::{self, Write};
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, instrument};

use super::file_stem;

/// Render `digest` as a Markdown document.
pub fn digest_to_markdown(digest: &Digest) -> String {
    let mut md = String::new();
    // Writing into a String cannot fail.
    let _ = render(digest, &mut md);
    md
}

fn render(digest: &Digest, md: &mut String) -> fmt::Result {
    let params = &digest.search_params;
    writeln!(md, "# News digest: {}\n", params.keyword)?;
    writeln!(
        md,
        "{} to {} · language {} · source {} · {} of {} requested\n",
        params.start.format("%Y-%m-%d %H:%M"),
        params.end.format("%Y-%m-%d %H:%M"),
        params.language,
        params.search_mode,
        digest.articles.len(),
        params.requested_count
    )?;
    if let Some(note) = &digest.note {
        writeln!(md, "> {note}\n")?;
    }

    for (i, article) in digest.articles.iter().enumerate() {
        writeln!(md, "## {}. {}\n", i + 1, article.title)?;

        let mut meta = Vec::new();
        if !article.source.is_empty() {
            meta.push(format!("*{}*", article.source));
        } else if let Some(tag) = article.source_tag() {
            meta.push(format!("*{tag}*"));
        }
        if let Some(published) = article.published_at {
            meta.push(published.format("%Y-%m-%d %H:%M %:z").to_string());
        }
        meta.push(article.extraction_method.to_string());
        writeln!(md, "{}\n", meta.join(" · "))?;

        writeln!(md, "{}\n", article.summary)?;
        if !article.has_full_content && article.extraction_method != ExtractionMethod::Failed {
            writeln!(md, "*Full text could not be extracted; the excerpt may be incomplete.*\n")?;
        }
        writeln!(md, "[Read the original]({})\n", article.url)?;
    }
    Ok(())
}

/// Write the rendered digest to `{markdown_output_dir}/{date}_{keyword-slug}.md`.
#[instrument(level = "info", skip_all, fields(%markdown_output_dir))]
pub async fn write_markdown(
    digest: &Digest,
    markdown_output_dir: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let (date, slug) = file_stem(digest);
    fs::create_dir_all(markdown_output_dir).await?;
    let path = PathBuf::from(markdown_output_dir).join(format!("{date}_{slug}.md"));
    fs::write(&path, digest_to_markdown(digest)).await?;
    info!(path = %path.display(), "Wrote Markdown digest");
    Ok(path)
}
