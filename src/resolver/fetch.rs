//! Static page fetching for the primary extraction stage.
//!
//! Bodies are decoded with the charset from the `Content-Type` header, else
//! the one declared by `<meta charset>` or `http-equiv` in the first few KB of
//! the document, else UTF-8. Many zh-TW sites still serve Big5 with only a
//! meta declaration.

use encoding_rs::{Encoding, UTF_8};
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, redirect};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::HttpSettings;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// How much of the document is searched for a charset declaration.
const META_SNIFF_BYTES: usize = 4096;

/// Why a page could not be fetched as HTML.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("timeout fetching {0}")]
    Timeout(String),
    /// Connection, TLS or body read failure
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP {0} for {1}")]
    HttpStatus(u16, String),
    #[error("not HTML: {0:?}")]
    NotHtml(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        match (e.is_timeout(), e.url()) {
            (true, Some(url)) => Self::Timeout(url.to_string()),
            (true, None) => Self::Timeout(String::new()),
            _ => Self::Transport(e.to_string()),
        }
    }
}

/// The `charset` parameter of a `Content-Type` value.
fn header_charset(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}

/// The charset declared inside the document head, if any.
fn meta_charset(bytes: &[u8]) -> Option<&'static Encoding> {
    static META: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r#"(?i-u)<meta[^>]+charset\s*=\s*["']?\s*([a-z0-9_:.\-]+)"#).expect("valid regex")
    });
    let head = &bytes[..bytes.len().min(META_SNIFF_BYTES)];
    let label = META.captures(head)?.get(1)?;
    Encoding::for_label(label.as_bytes())
}

/// Decode a page body: header charset, then meta declaration, then UTF-8.
pub fn decode_html(bytes: &[u8], content_type: &str) -> (String, &'static str) {
    let encoding = header_charset(content_type)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .or_else(|| meta_charset(bytes))
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(bytes);
    (text.into_owned(), encoding.name())
}

/// Fetches article pages with a browser-like identity and a bounded timeout.
pub struct HtmlFetcher {
    client: Client,
}

impl HtmlFetcher {
    pub fn new(http: &HttpSettings) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        if let Ok(value) = HeaderValue::from_str(&http.accept_language) {
            headers.insert(ACCEPT_LANGUAGE, value);
        }

        let client = Client::builder()
            .timeout(http.page_timeout())
            .user_agent(http.user_agent.as_str())
            .default_headers(headers)
            .redirect(redirect::Policy::limited(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }

    /// Fetch `url` and return its body if it is a 2xx HTML response.
    ///
    /// No retries: a failed fetch moves resolution on to the next stage.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16(), url.to_string()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if !content_type.contains("text/html") && !content_type.contains("application/xhtml") {
            return Err(FetchError::NotHtml(content_type));
        }

        let final_url = response.url().to_string();
        let bytes = response.bytes().await?;
        let (body, charset) = decode_html(&bytes, &content_type);
        debug!(bytes = bytes.len(), charset, %final_url, "Fetched page");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn html_response(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8")
    }

    fn header_is(name: &'static str, expected: &'static str) -> impl Fn(&Request) -> bool + Send + Sync {
        move |request: &Request| {
            request
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v == expected)
        }
    }

    #[tokio::test]
    async fn test_fetch_html_sends_browser_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/story"))
            .and(header_is("accept-language", "zh-TW,zh;q=0.9,en-US;q=0.8,en;q=0.7"))
            .and(header_is("accept", ACCEPT_HTML))
            .respond_with(html_response("<p>hello</p>"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HtmlFetcher::new(&HttpSettings::default());
        let body = fetcher.fetch(&format!("{}/story", server.uri())).await.unwrap();
        assert_eq!(body, "<p>hello</p>");
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_raw("<p>gone</p>", "text/html"))
            .mount(&server)
            .await;

        let fetcher = HtmlFetcher::new(&HttpSettings::default());
        let err = fetcher.fetch(&server.uri()).await.unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus(404, _)));
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_html() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("%PDF-1.7", "application/pdf"))
            .mount(&server)
            .await;

        let fetcher = HtmlFetcher::new(&HttpSettings::default());
        let err = fetcher.fetch(&server.uri()).await.unwrap_err();
        assert!(matches!(err, FetchError::NotHtml(ref ct) if ct == "application/pdf"));
    }

    #[tokio::test]
    async fn test_fetch_rejects_plain_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>looks like html</p>"))
            .mount(&server)
            .await;

        let fetcher = HtmlFetcher::new(&HttpSettings::default());
        let err = fetcher.fetch(&server.uri()).await.unwrap_err();
        assert!(matches!(err, FetchError::NotHtml(ref ct) if ct.starts_with("text/plain")));
    }

    #[tokio::test]
    async fn test_fetch_accepts_xhtml() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<html/>", "application/xhtml+xml"))
            .mount(&server)
            .await;

        let fetcher = HtmlFetcher::new(&HttpSettings::default());
        assert_eq!(fetcher.fetch(&server.uri()).await.unwrap(), "<html/>");
    }

    #[tokio::test]
    async fn test_fetch_decodes_big5_from_meta_charset() {
        let page = "<html><head><meta http-equiv=\"Content-Type\" content=\"text/html; charset=big5\"></head>\
                    <body><p>台積電營收創新高</p></body></html>";
        let (bytes, _, _) = encoding_rs::BIG5.encode(page);
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(bytes.into_owned(), "text/html"))
            .mount(&server)
            .await;

        let fetcher = HtmlFetcher::new(&HttpSettings::default());
        let body = fetcher.fetch(&server.uri()).await.unwrap();
        assert!(body.contains("台積電營收創新高"));
    }

    #[test]
    fn test_decode_prefers_header_charset() {
        let (bytes, _, _) = encoding_rs::BIG5.encode("<meta charset=\"utf-8\"><p>新聞</p>");
        let (text, charset) = decode_html(&bytes, "text/html; charset=\"Big5\"");
        assert_eq!(charset, "Big5");
        assert!(text.contains("新聞"));
    }

    #[test]
    fn test_decode_defaults_to_utf8() {
        let (text, charset) = decode_html("<p>新聞</p>".as_bytes(), "text/html");
        assert_eq!(charset, "UTF-8");
        assert_eq!(text, "<p>新聞</p>");

        let (_, charset) = decode_html(b"<meta charset='no-such-charset'>", "text/html");
        assert_eq!(charset, "UTF-8");
    }

    #[tokio::test]
    async fn test_fetch_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(html_response("<p>late</p>").set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let settings = HttpSettings {
            page_timeout_secs: 1,
            ..HttpSettings::default()
        };
        let err = HtmlFetcher::new(&settings).fetch(&server.uri()).await.unwrap_err();
        assert!(matches!(err, FetchError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_fetch_unreachable_is_transport_error() {
        let fetcher = HtmlFetcher::new(&HttpSettings::default());
        let err = fetcher.fetch("http://127.0.0.1:9/").await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(_) | FetchError::Timeout(_)));
    }
}
