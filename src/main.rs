//! # News Digest
//!
//! A keyword news pipeline that collects listings from Google News RSS or the
//! Google Custom Search API, extracts readable article text through a
//! fallback chain, and produces bounded summaries as JSON and Markdown.
//!
//! ## Features
//!
//! - Traditional Chinese (zh-TW) and English (en-US) listings, or both at once
//! - Exact date-window filtering, newest-first ordering, URL de-duplication
//! - Static extraction with optional headless-render fallback over WebDriver
//! - Sentence-aware summaries, optionally written by an LLM (`llm` feature)
//!
//! ## Usage
//!
//! ```sh
//! news_digest -k 台積電 -l both -n 5 -j ./json -m ./markdown
//! ```
//!
//! Without `-j`/`-m` the digest is printed to stdout as JSON.
//!
//! ## Architecture
//!
//! 1. **Query**: validate the keyword, count and date window
//! 2. **Listing**: fetch candidates from the selected source, per language
//! 3. **Aggregation**: merge, window, sort, de-duplicate, take the top N
//! 4. **Resolution**: extract content for each article, one at a time
//! 5. **Output**: write JSON and Markdown

use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod aggregator;
#[cfg_attr(not(feature = "llm"), allow(dead_code))]
mod api;
mod cli;
mod config;
mod models;
mod outputs;
mod pipeline;
mod query;
mod resolver;
mod sources;
mod summarizer;
mod utils;

use cli::Cli;
use config::AppConfig;
use outputs::{json, markdown};
use pipeline::Pipeline;
use query::NewsQuery;
use resolver::ContentResolver;
use resolver::render::{PageRenderer, WebDriverRenderer};
use sources::SourceSet;
use sources::custom_search::GoogleCustomSearch;
use sources::google_news::GoogleNewsRss;
use summarizer::Summarizer;
use utils::{ensure_writable_dir, now_in};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("news_digest starting up");

    let args = Cli::parse();
    debug!(?args.json_output_dir, ?args.markdown_output_dir, "Parsed CLI arguments");

    // ---- Configuration ----
    let config = AppConfig::load(args.config.as_deref())?.with_cli_overrides(&args);
    let now = now_in(config.reference_offset());

    let query = match NewsQuery::from_cli(&args, now) {
        Ok(query) => query,
        Err(e) => {
            error!(error = %e, "Invalid query");
            return Err(e.into());
        }
    };
    info!(
        keyword = %query.keyword,
        language = %query.language,
        count = query.count,
        start = %query.start,
        end = %query.end,
        search_mode = %query.search_mode,
        "Query accepted"
    );

    // Early check: output dirs must be writable before any network work
    for dir in [&args.json_output_dir, &args.markdown_output_dir]
        .into_iter()
        .flatten()
    {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(path = %dir, error = %e, "Output directory is not writable");
            return Err(e);
        }
    }

    // ---- Components ----
    let sources = SourceSet::new(
        Arc::new(GoogleNewsRss::new(&config.http)),
        Arc::new(GoogleCustomSearch::new(
            &config.http,
            config.google_search.clone(),
        )),
    );

    let renderer: Option<Arc<dyn PageRenderer>> =
        config.render.webdriver_url.as_deref().map(|endpoint| {
            info!(endpoint, "Render fallback enabled");
            Arc::new(WebDriverRenderer::new(endpoint, &config.render, &config.http))
                as Arc<dyn PageRenderer>
        });
    let resolver = ContentResolver::from_config(&config, renderer);
    info!(stages = ?resolver.stage_methods(), extractor = ?config.extraction.extractor, "Resolver ready");

    let summarizer = if config.summary.use_external {
        let external = api::load_llm_summarizer(&config.summary.llm_template).await;
        Summarizer::new(external, true)
    } else {
        Summarizer::truncating()
    };

    // ---- Run ----
    let digest = Pipeline::new(sources, resolver, summarizer).run(&query).await;

    // ---- Output ----
    if let Some(dir) = &args.json_output_dir {
        if let Err(e) = json::write_digest(&digest, dir).await {
            error!(error = %e, "Failed to write JSON output");
        }
    }
    if let Some(dir) = &args.markdown_output_dir {
        if let Err(e) = markdown::write_markdown(&digest, dir).await {
            error!(path = %dir, error = %e, "Failed writing Markdown");
        }
    }
    if args.json_output_dir.is_none() && args.markdown_output_dir.is_none() {
        println!("{}", serde_json::to_string_pretty(&digest)?);
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        articles = digest.articles.len(),
        note = digest.note.as_deref().unwrap_or(""),
        "Execution complete"
    );

    Ok(())
}
