//! Headless rendering fallback over the W3C WebDriver protocol.
//!
//! [`PageRenderer`] is the capability the resolver holds. When no renderer is
//! configured the resolver simply has no rendered stage.
//!
//! [`WebDriverRenderer`] talks plain HTTP/JSON to chromedriver, geckodriver or
//! a Selenium grid. The session request matches the configured
//! [`BrowserKind`]: `goog:chromeOptions` for Chrome, `moz:firefoxOptions` for
//! Firefox. One render is one browser session:
//!
//! 1. `POST /session` with headless arguments and the browser user agent
//! 2. set the page-load timeout and navigate
//! 3. if the URL is on a redirector host, poll the current URL until it leaves
//! 4. settle, scroll to mid-page to trigger lazy loading, settle again
//! 5. read the final URL and page source
//! 6. `DELETE /session/{id}`, whatever happened in steps 2 to 5

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{Value, json};
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::{BrowserKind, HttpSettings, RenderSettings};

const SCROLL_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight / 2);";

/// A page after scripts ran.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    /// URL the browser ended up on after redirects.
    pub final_url: String,
    pub html: String,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("webdriver transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("webdriver error {status}: {message}")]
    Protocol { status: u16, message: String },
    #[error("unexpected webdriver response: {0}")]
    Malformed(String),
    #[error("render exceeded {0:?}")]
    Timeout(Duration),
}

/// Capability to load a URL in a script-executing browser.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str) -> Result<RenderedPage, RenderError>;

    fn name(&self) -> &'static str;
}

/// Delays used while a page settles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderTiming {
    pub poll_interval: Duration,
    pub poll_attempts: u32,
    pub settle: Duration,
    pub scroll_settle: Duration,
}

impl Default for RenderTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            poll_attempts: 20,
            settle: Duration::from_secs(1),
            scroll_settle: Duration::from_millis(500),
        }
    }
}

pub struct WebDriverRenderer {
    client: Client,
    endpoint: String,
    browser: BrowserKind,
    user_agent: String,
    render_timeout: Duration,
    redirector_domains: Vec<String>,
    timing: RenderTiming,
}

impl WebDriverRenderer {
    pub fn new(endpoint: &str, render: &RenderSettings, http: &HttpSettings) -> Self {
        let render_timeout = Duration::from_secs(render.timeout_secs);
        Self {
            client: Client::builder()
                .timeout(render_timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            browser: render.browser,
            user_agent: http.user_agent.clone(),
            render_timeout,
            redirector_domains: render.redirector_domains.clone(),
            timing: RenderTiming::default(),
        }
    }

    #[cfg(test)]
    pub fn with_timing(mut self, timing: RenderTiming) -> Self {
        self.timing = timing;
        self
    }

    fn is_redirector(&self, url: &str) -> bool {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
            .is_some_and(|host| {
                self.redirector_domains
                    .iter()
                    .any(|d| host == *d || host.ends_with(&format!(".{d}")))
            })
    }

    /// Send one WebDriver command and return its `value` member.
    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, RenderError> {
        let url = format!("{}{}", self.endpoint, path);
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        let status = response.status();
        let payload: Value = response.json().await?;
        let value = payload.get("value").cloned().unwrap_or(Value::Null);

        if !status.is_success() {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .or_else(|| value.get("error").and_then(Value::as_str))
                .unwrap_or("unknown error")
                .to_string();
            return Err(RenderError::Protocol {
                status: status.as_u16(),
                message,
            });
        }
        Ok(value)
    }

    /// Session capabilities for the configured browser.
    fn capabilities(&self) -> Value {
        let always_match = match self.browser {
            BrowserKind::Chrome => json!({
                "browserName": "chrome",
                "goog:chromeOptions": {
                    "args": [
                        "--headless=new",
                        "--no-sandbox",
                        "--disable-dev-shm-usage",
                        "--disable-gpu",
                        "--lang=zh-TW",
                        format!("--user-agent={}", self.user_agent),
                    ]
                }
            }),
            BrowserKind::Firefox => json!({
                "browserName": "firefox",
                "moz:firefoxOptions": {
                    "args": ["-headless"],
                    "prefs": {
                        "general.useragent.override": self.user_agent,
                        "intl.accept_languages": "zh-TW,zh,en-US,en",
                    }
                }
            }),
        };
        json!({ "capabilities": { "alwaysMatch": always_match } })
    }

    async fn new_session(&self) -> Result<String, RenderError> {
        let capabilities = self.capabilities();
        let value = self
            .command(Method::POST, "/session", Some(capabilities))
            .await?;
        value
            .get("sessionId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| RenderError::Malformed("missing sessionId".to_string()))
    }

    async fn current_url(&self, session: &str) -> Result<String, RenderError> {
        let value = self
            .command(Method::GET, &format!("/session/{session}/url"), None)
            .await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| RenderError::Malformed("url is not a string".to_string()))
    }

    /// Steps 2 to 5 of a render, inside an existing session.
    async fn drive(&self, session: &str, url: &str) -> Result<RenderedPage, RenderError> {
        let page_load_ms = self.render_timeout.as_millis() as u64;
        self.command(
            Method::POST,
            &format!("/session/{session}/timeouts"),
            Some(json!({ "pageLoad": page_load_ms })),
        )
        .await?;
        self.command(
            Method::POST,
            &format!("/session/{session}/url"),
            Some(json!({ "url": url })),
        )
        .await?;

        if self.is_redirector(url) {
            info!(url, "Waiting for redirector to hand off");
            for _ in 0..self.timing.poll_attempts {
                sleep(self.timing.poll_interval).await;
                let current = self.current_url(session).await?;
                if !self.is_redirector(&current) {
                    info!(%current, "Redirect finished");
                    break;
                }
            }
        }

        sleep(self.timing.settle).await;
        if let Err(e) = self
            .command(
                Method::POST,
                &format!("/session/{session}/execute/sync"),
                Some(json!({ "script": SCROLL_SCRIPT, "args": [] })),
            )
            .await
        {
            debug!(error = %e, "Scroll nudge failed");
        }
        sleep(self.timing.scroll_settle).await;

        let final_url = self.current_url(session).await?;
        let html = self
            .command(Method::GET, &format!("/session/{session}/source"), None)
            .await?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| RenderError::Malformed("source is not a string".to_string()))?;

        Ok(RenderedPage { final_url, html })
    }

    async fn close(&self, session: &str) {
        if let Err(e) = self
            .command(Method::DELETE, &format!("/session/{session}"), None)
            .await
        {
            warn!(session, error = %e, "Failed to delete WebDriver session");
        }
    }
}

#[async_trait]
impl PageRenderer for WebDriverRenderer {
    #[instrument(level = "info", skip(self))]
    async fn render(&self, url: &str) -> Result<RenderedPage, RenderError> {
        let session = self.new_session().await?;
        debug!(%session, "WebDriver session created");

        let result = match timeout(self.render_timeout, self.drive(&session, url)).await {
            Ok(result) => result,
            Err(_) => Err(RenderError::Timeout(self.render_timeout)),
        };
        self.close(&session).await;

        if let Ok(page) = &result {
            info!(final_url = %page.final_url, bytes = page.html.len(), "Rendered page");
        }
        result
    }

    fn name(&self) -> &'static str {
        "webdriver"
    }
}
