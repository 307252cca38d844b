//! Writers that hand a finished [`Digest`] to readers.
//!
//! # Submodules
//!
//! - [`json`]: Writes the digest as JSON for programmatic consumers
//! - [`markdown`]: Renders the digest as a readable Markdown document
//!
//! # Output Structure
//!
//! ```text
//! json_output_dir/
//! └── 2025-05-06/
//!     ├── 台積電.json
//!     └── semiconductors.json
//!
//! markdown_output_dir/
//! ├── 2025-05-06_台積電.md
//! └── 2025-05-06_semiconductors.md
//! ```
//!
//! The date is the last day of the query window in the reference timezone.

pub mod json;
pub mod markdown;

use crate::models::Digest;
use crate::utils::slugify_title;

/// `(date, keyword slug)` naming the files of one digest.
fn file_stem(digest: &Digest) -> (String, String) {
    let date = digest.search_params.end.date_naive().to_string();
    let slug = slugify_title(&digest.search_params.keyword);
    let slug = if slug.trim_matches('-').is_empty() {
        "digest".to_string()
    } else {
        slug
    };
    (date, slug)
}


#[cfg(test)]
mod tests {
    use super::testing::sample_digest;
    use super::*;

    #[test]
    fn test_file_stem() {
        assert_eq!(
            file_stem(&sample_digest("Chip Exports")),
            ("2025-05-06".to_string(), "chip-exports".to_string())
        );
        assert_eq!(file_stem(&sample_digest("!!!")).1, "digest");
    }
}
