//! JSON output for programmatic consumers.
//!
//! The file holds the serialized [`Digest`]: search parameters, the ordered
//! articles with content, summary and provenance, and the note.

use crate::models::Digest;
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

use super::file_stem;

/// Write a [`Digest`] to `{json_output_dir}/{date}/{keyword-slug}.json`.
///
/// Creates the date directory when needed and returns the written path.
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir))]
pub async fn write_digest(digest: &Digest, json_output_dir: &str) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(digest)?;
    let (date, slug) = file_stem(digest);

    let full_json_dir = PathBuf::from(json_output_dir).join(date);
    info!(full_json_dir = %full_json_dir.display(), "Ensuring JSON directory exists");
    if let Err(e) = fs::create_dir_all(&full_json_dir).await {
        error!(full_json_dir = %full_json_dir.display(), error = %e, "Failed to create JSON dir");
        return Err(e.into());
    }

    let path = full_json_dir.join(format!("{slug}.json"));
    fs::write(&path, json).await?;
    info!(path = %path.display(), articles = digest.articles.len(), "Wrote JSON digest");
    Ok(path)
}
