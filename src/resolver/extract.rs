//! Article text extraction from HTML.
//!
//! Two extractors are available:
//!
//! | Extractor | Strategy |
//! |-----------|----------|
//! | [`ExtractorKind::Boilerplate`] | DOM walk: pick the densest content container, drop navigation chrome |
//! | [`ExtractorKind::Basic`] | Strip script/style and tags, then keep a middle slice of the text |
//!
//! The boilerplate extractor runs in one of two modes. [`ExtractMode::Precision`]
//! keeps only paragraph text and is used on statically fetched pages.
//! [`ExtractMode::Recall`] keeps every visible text node of the container and
//! is used on rendered pages, where losing content costs more than keeping a
//! little chrome.
//!
//! Whatever the extractor, accepted text goes through [`clean_content`].

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::config::ExtractorKind;
use crate::utils::{char_len, collapse_whitespace};

/// Text kept by the basic extractor once the page is longer than this.
const BASIC_SLICE_CHARS: usize = 2000;

/// Elements whose text is never article content.
const NOISE_ELEMENTS: [&str; 11] = [
    "script", "style", "noscript", "nav", "header", "footer", "aside", "form", "iframe", "svg",
    "button",
];

/// Fixed boilerplate phrases removed from accepted content.
const NOISE_PHRASES: [&str; 8] = [
    "訂閱電子報",
    "加入會員",
    "免費註冊",
    "分享到",
    "Advertisement",
    "Sponsored",
    "Loading...",
    "Please wait",
];

/// Content containers, most specific last. The one yielding the most text wins.
static CONTAINERS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        "article",
        "main",
        "[role='main']",
        "[itemprop='articleBody']",
        ".article-content",
        ".article-body",
        ".article__body",
        ".post-content",
        ".entry-content",
        ".story-body",
        "#article-body",
        "#content",
    ]
    .iter()
    .filter_map(|s| Selector::parse(s).ok())
    .collect()
});

static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("valid selector"));
static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").expect("valid selector"));

static SCRIPT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("valid regex"));
static STYLE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").expect("valid regex"));
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

static NOISE: Lazy<Regex> = Lazy::new(|| {
    let alternation = NOISE_PHRASES
        .iter()
        .map(|p| regex::escape(p))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?i){alternation}")).expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractMode {
    Precision,
    Recall,
}

/// Extract article text with the configured extractor, then clean it.
pub fn extract(kind: ExtractorKind, html: &str, mode: ExtractMode) -> String {
    let raw = match kind {
        ExtractorKind::Boilerplate => extract_boilerplate(html, mode),
        ExtractorKind::Basic => extract_basic(html),
    };
    clean_content(&raw)
}

/// DOM-based extraction. Returns raw (uncleaned) text, possibly empty.
pub fn extract_boilerplate(html: &str, mode: ExtractMode) -> String {
    let document = Html::parse_document(html);
    let collect: fn(ElementRef) -> String = match mode {
        ExtractMode::Precision => paragraph_text,
        ExtractMode::Recall => visible_text,
    };

    let best = CONTAINERS
        .iter()
        .filter_map(|selector| document.select(selector).next())
        .map(collect)
        .max_by_key(|text| char_len(text))
        .unwrap_or_default();
    if !best.is_empty() {
        return best;
    }

    document
        .select(&BODY)
        .next()
        .map(collect)
        .unwrap_or_default()
}

/// Crude extraction: drop script/style blocks and tags, collapse whitespace,
/// and keep a slice from the first quarter onwards when the page is long.
pub fn extract_basic(html: &str) -> String {
    let without_scripts = SCRIPT_BLOCK.replace_all(html, "");
    let without_styles = STYLE_BLOCK.replace_all(&without_scripts, "");
    let text = collapse_whitespace(&TAG.replace_all(&without_styles, " "));

    let total = char_len(&text);
    if total > BASIC_SLICE_CHARS {
        text.chars().skip(total / 4).take(BASIC_SLICE_CHARS).collect()
    } else {
        text
    }
}

/// Collapse whitespace, trim, and remove the fixed noise phrases (case-insensitive).
pub fn clean_content(text: &str) -> String {
    let collapsed = collapse_whitespace(text);
    collapse_whitespace(&NOISE.replace_all(&collapsed, ""))
}

fn is_noise_element(element: ElementRef) -> bool {
    NOISE_ELEMENTS.contains(&element.value().name())
}

fn in_noise(element: ElementRef) -> bool {
    is_noise_element(element) || element.ancestors().filter_map(ElementRef::wrap).any(is_noise_element)
}

/// Text of every `<p>` under `root` that is not inside navigation chrome.
fn paragraph_text(root: ElementRef) -> String {
    root.select(&PARAGRAPH)
        .filter(|p| !in_noise(*p))
        .map(|p| collapse_whitespace(&p.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Every text node under `root` that is not inside navigation chrome.
fn visible_text(root: ElementRef) -> String {
    let mut parts = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        if node
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(is_noise_element)
        {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const NEWS_PAGE: &str = r#"
        <!DOCTYPE html>
        <html>
        <head><title>Test</title><style>.x { color: red }</style></head>
        <body>
            <header>Site header with login links</header>
            <nav><p>Home | World | Business</p></nav>
            <article>
                <h1>Chip exports hit a record</h1>
                <div class="byline">By Staff Reporter</div>
                <p>Exports of semiconductors reached a record high in April, driven by demand for servers.</p>
                <p>Officials expect the trend to continue <b>through the third quarter</b> of the year.</p>
                <aside><p>Related: other stories you may like</p></aside>
                <script>track("view")</script>
            </article>
            <footer><p>Copyright footer text</p></footer>
        </body>
        </html>
    "#;

    #[test]
    fn test_precision_keeps_only_article_paragraphs() {
        let text = extract(ExtractorKind::Boilerplate, NEWS_PAGE, ExtractMode::Precision);
        assert!(text.starts_with("Exports of semiconductors"));
        assert!(text.contains("continue through the third quarter"));
        assert!(!text.contains("Chip exports hit a record"));
        assert!(!text.contains("Related"));
        assert!(!text.contains("Home"));
        assert!(!text.contains("Copyright"));
    }

    #[test]
    fn test_recall_keeps_headline_and_byline() {
        let text = extract(ExtractorKind::Boilerplate, NEWS_PAGE, ExtractMode::Recall);
        assert!(text.contains("Chip exports hit a record"));
        assert!(text.contains("By Staff Reporter"));
        assert!(text.contains("Exports of semiconductors"));
        assert!(!text.contains("track("));
        assert!(!text.contains("Related"));
        assert!(!text.contains("Site header"));
    }

    #[test]
    fn test_boilerplate_falls_back_to_body() {
        let html = "<html><body><nav>Menu</nav><p>Plain body paragraph.</p></body></html>";
        assert_eq!(
            extract(ExtractorKind::Boilerplate, html, ExtractMode::Precision),
            "Plain body paragraph."
        );
    }

    #[test]
    fn test_boilerplate_on_empty_document() {
        assert_eq!(extract_boilerplate("", ExtractMode::Recall), "");
    }

    #[test]
    fn test_basic_strips_scripts_and_tags() {
        let html = "<html><head><SCRIPT type='x'>var a = 1;</SCRIPT><style>p{}</style></head>\
                    <body><p>Hello <i>world</i></p></body></html>";
        assert_eq!(extract(ExtractorKind::Basic, html, ExtractMode::Precision), "Hello world");
    }

    #[test]
    fn test_basic_takes_middle_slice_of_long_pages() {
        let html = format!("<p>{}</p>", "字".repeat(4000));
        let text = extract_basic(&html);
        assert_eq!(char_len(&text), 2000);
    }

    #[test]
    fn test_clean_content_removes_noise_case_insensitively() {
        let cleaned = clean_content("  Body text.\n ADVERTISEMENT  more text 訂閱電子報 loading... end ");
        assert_eq!(cleaned, "Body text. more text end");
    }
}
