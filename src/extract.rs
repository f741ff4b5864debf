//! Text extraction for uploaded files and fetched web pages.
//!
//! Files are read verbatim except for PDFs, which are not parsed: they
//! yield [`SourceText::Unsupported`] with a placeholder naming the file.
//! Web pages are reduced to plain text with two regex passes (tags to
//! spaces, whitespace runs collapsed) and capped to a character budget.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

pub const MIME_PDF: &str = "application/pdf";

/// Title used when a fetched page has no `<title>` element.
pub const DEFAULT_WEB_TITLE: &str = "Web Article";

static RE_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<title>(.*?)</title>").expect("title regex"));

static RE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag regex"));

static RE_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Failed to extract web content: {0}")]
    Fetch(String),
}

/// Result of reading a content source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceText {
    /// Text taken from the source itself.
    Extracted(String),
    /// The source type is recognized but extraction is not supported yet;
    /// carries the placeholder text stored in its place.
    Unsupported(String),
}

impl SourceText {
    pub fn is_supported(&self) -> bool {
        matches!(self, SourceText::Extracted(_))
    }

    pub fn into_text(self) -> String {
        match self {
            SourceText::Extracted(text) | SourceText::Unsupported(text) => text,
        }
    }
}

fn is_pdf(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|essence| essence.trim().eq_ignore_ascii_case(MIME_PDF))
        .unwrap_or(false)
}

/// Reads an uploaded file's text. Bytes that are not valid UTF-8 are
/// replaced rather than rejected.
pub fn extract_file_text(name: &str, content_type: Option<&str>, bytes: &[u8]) -> SourceText {
    if is_pdf(content_type) {
        return SourceText::Unsupported(format!(
            "PDF content extraction not implemented yet. File: {}",
            name
        ));
    }
    SourceText::Extracted(String::from_utf8_lossy(bytes).into_owned())
}

/// Plain-text view of an HTML page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebPage {
    pub title: String,
    pub content: String,
}

/// Reduces raw HTML to a title and at most `max_chars` characters of text.
pub fn parse_html(html: &str, max_chars: usize) -> WebPage {
    let title = RE_TITLE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| DEFAULT_WEB_TITLE.to_string());

    let stripped = RE_TAG.replace_all(html, " ");
    let collapsed = RE_WHITESPACE.replace_all(&stripped, " ");
    let content = truncate_chars(collapsed.trim(), max_chars).to_string();

    WebPage { title, content }
}

/// Fetches `url` and reduces the body with [`parse_html`].
///
/// The response status is not inspected; an error page is extracted like
/// any other page. Only transport and body-decoding failures are errors.
pub async fn fetch_web_content(
    client: &reqwest::Client,
    url: &str,
    max_chars: usize,
) -> Result<WebPage, ExtractError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ExtractError::Fetch(e.to_string()))?;
    let html = response
        .text()
        .await
        .map_err(|e| ExtractError::Fetch(e.to_string()))?;
    Ok(parse_html(&html, max_chars))
}

/// Longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
