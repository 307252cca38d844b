//! Command-line interface definitions for News Digest.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Credentials and the WebDriver endpoint can be provided via command-line
//! flags or environment variables.

use clap::{Parser, ValueEnum};

use crate::models::{LanguageSelection, SearchMode};

/// How the date window of a query is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DateMode {
    /// From local midnight until now in the reference timezone.
    Today,
    /// From `--start-date` 00:00:00 to `--end-date` 23:59:59.
    Custom,
}

/// Command-line arguments for the News Digest application.
///
/// # Examples
///
/// ```sh
/// # Today's English news about a keyword
/// news_digest --keyword "semiconductors" --language en-US
///
/// # Both languages over a custom window, written to JSON and Markdown
/// news_digest -k 台積電 -l both -n 10 --date-mode custom \
///     --start-date 2025-05-01 --end-date 2025-05-06 -j ./json -m ./markdown
///
/// # Prefer the Custom Search API
/// news_digest -k AI --search-mode google --google-api-key KEY --google-search-engine-id CX
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Search keyword (1-200 characters)
    #[arg(short, long)]
    pub keyword: String,

    /// Listing language
    #[arg(short, long, value_enum, default_value = "zh-TW")]
    pub language: LanguageSelection,

    /// Number of articles to return (1-20)
    #[arg(short = 'n', long, default_value_t = 5)]
    pub count: usize,

    /// Date window selection
    #[arg(long, value_enum, default_value = "today")]
    pub date_mode: DateMode,

    /// Window start for custom mode, YYYY-MM-DD
    #[arg(long)]
    pub start_date: Option<String>,

    /// Window end for custom mode, YYYY-MM-DD
    #[arg(long)]
    pub end_date: Option<String>,

    /// Which source adapter to query
    #[arg(long, value_enum, default_value = "rss")]
    pub search_mode: SearchMode,

    /// Optional path to a config.yaml file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Output directory for the JSON digest
    #[arg(short, long)]
    pub json_output_dir: Option<String>,

    /// Output directory for the Markdown digest
    #[arg(short, long)]
    pub markdown_output_dir: Option<String>,

    /// Google Custom Search API key
    #[arg(long, env = "GOOGLE_API_KEY")]
    pub google_api_key: Option<String>,

    /// Google Programmable Search Engine ID (cx)
    #[arg(long, env = "GOOGLE_SEARCH_ENGINE_ID")]
    pub google_search_engine_id: Option<String>,

    /// W3C WebDriver endpoint enabling the render fallback
    #[arg(long, env = "WEBDRIVER_URL")]
    pub webdriver_url: Option<String>,

    /// Try the external summarizer before sentence truncation
    #[arg(long)]
    pub use_external_summary: bool,
}
