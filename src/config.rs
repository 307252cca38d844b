//! Runtime configuration.
//!
//! Configuration is read once at start-up from an optional YAML file and then
//! overlaid with values from the command line or environment (credentials,
//! WebDriver endpoint). The resulting [`AppConfig`] is an immutable value that
//! is passed into each component at construction; nothing reads the process
//! environment after that point. Calling [`AppConfig::load`] again is the
//! reload operation: it produces a fresh value and leaves existing ones alone.
//!
//! # Example file
//!
//! ```yaml
//! reference_utc_offset_hours: 8
//! http:
//!   page_timeout_secs: 20
//! google_search:
//!   api_key: "..."
//!   engine_id: "..."
//! extraction:
//!   extractor: boilerplate
//! render:
//!   webdriver_url: "http://localhost:9515"
//!   browser: chrome
//! summary:
//!   use_external: false
//! ```

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::cli::Cli;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Top-level configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Offset of the reference timezone all windows are compared in.
    pub reference_utc_offset_hours: i32,
    pub http: HttpSettings,
    pub google_search: GoogleSearchSettings,
    pub extraction: ExtractionSettings,
    pub render: RenderSettings,
    pub summary: SummarySettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            reference_utc_offset_hours: 8,
            http: HttpSettings::default(),
            google_search: GoogleSearchSettings::default(),
            extraction: ExtractionSettings::default(),
            render: RenderSettings::default(),
            summary: SummarySettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpSettings {
    pub user_agent: String,
    pub accept_language: String,
    /// Timeout for article page fetches.
    pub page_timeout_secs: u64,
    /// Timeout for feed and search API calls.
    pub feed_timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: "zh-TW,zh;q=0.9,en-US;q=0.8,en;q=0.7".to_string(),
            page_timeout_secs: 20,
            feed_timeout_secs: 30,
        }
    }
}

impl HttpSettings {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn feed_timeout(&self) -> Duration {
        Duration::from_secs(self.feed_timeout_secs)
    }
}

/// Google Custom Search credentials. Both must be set for the adapter to run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GoogleSearchSettings {
    pub api_key: String,
    pub engine_id: String,
}

impl GoogleSearchSettings {
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.engine_id.trim().is_empty()
    }
}

/// Which text extractor the static fetch stage uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    /// DOM-based boilerplate removal.
    #[default]
    Boilerplate,
    /// Tag stripping plus a middle slice of the page text.
    Basic,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractionSettings {
    pub extractor: ExtractorKind,
}

/// Browser family behind the WebDriver endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    /// chromedriver
    #[default]
    Chrome,
    /// geckodriver
    Firefox,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderSettings {
    /// W3C WebDriver endpoint. `None` means the render capability is not provided.
    pub webdriver_url: Option<String>,
    pub browser: BrowserKind,
    /// Upper bound for one render, session setup and teardown excluded.
    pub timeout_secs: u64,
    /// Hosts whose links only redirect to the real article.
    pub redirector_domains: Vec<String>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            webdriver_url: None,
            browser: BrowserKind::Chrome,
            timeout_secs: 45,
            redirector_domains: vec!["news.google.com".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SummarySettings {
    /// Ask the external summarizer first when one is available.
    pub use_external: bool,
    /// Chat template name passed to the LLM backend.
    pub llm_template: String,
}

impl Default for SummarySettings {
    fn default() -> Self {
        Self {
            use_external: false,
            llm_template: "news_summary".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file, or defaults when `path` is `None`.
    #[instrument(level = "info")]
    pub fn load(path: Option<&str>) -> Result<Self, Box<dyn Error>> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                let config = Self::from_yaml(&raw)?;
                info!(path, "Loaded configuration file");
                Ok(config)
            }
            None => {
                info!("No configuration file given; using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    /// Overlay values supplied on the command line or via environment.
    pub fn with_cli_overrides(mut self, cli: &Cli) -> Self {
        if let Some(key) = &cli.google_api_key {
            self.google_search.api_key = key.clone();
        }
        if let Some(id) = &cli.google_search_engine_id {
            self.google_search.engine_id = id.clone();
        }
        if let Some(url) = &cli.webdriver_url {
            self.render.webdriver_url = Some(url.clone());
        }
        if cli.use_external_summary {
            self.summary.use_external = true;
        }
        self
    }

    /// The reference timezone as a fixed offset, falling back to UTC+8.
    pub fn reference_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.reference_utc_offset_hours * 3600).unwrap_or_else(|| {
            warn!(
                hours = self.reference_utc_offset_hours,
                "Invalid reference offset; using UTC+8"
            );
            FixedOffset::east_opt(8 * 3600).expect("UTC+8 is a valid offset")
        })
    }
}
