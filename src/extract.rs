//! Text extraction from fetched documents
//!
//! The `Extractor` trait turns raw bytes into plain text. The built-in
//! `HtmlTextExtractor` handles HTML and plain-text formats; other formats
//! (PDF included) are reported as `ParseError::Unsupported` so the pipeline
//! can log and skip them, or plug in a different extractor.

use crate::crawler::{extract_title, mime_type};
use crate::ParseError;
use scraper::{ElementRef, Html, Selector};

/// Selectors tried in order to find the main content of an HTML page
const CONTENT_SELECTORS: &[&str] = &["article", "main", ".content", ".post", "#content"];

/// Elements whose text never reaches the extracted output
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Text pulled out of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    /// Document title, when the format carries one
    pub title: Option<String>,
    /// Plain text, one block per line
    pub text: String,
}

/// Capability that converts document bytes to plain text
pub trait Extractor: Send + Sync {
    /// Extracts text from `bytes` served with `content_type`
    fn extract(&self, bytes: &[u8], content_type: &str) -> Result<ExtractedText, ParseError>;
}

/// Extractor for HTML, plain text and Markdown
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlTextExtractor;

/// Document extensions whose usual formats the built-in extractor reads
const READABLE_EXTENSIONS: &[&str] = &["htm", "html", "markdown", "md", "text", "txt", "xhtml"];

impl HtmlTextExtractor {
    /// Creates the extractor
    pub fn new() -> Self {
        Self
    }

    /// Returns the configured document extensions this extractor cannot read
    ///
    /// Documents with these extensions are discovered but skipped unless an
    /// external [`Extractor`] handles them.
    pub fn unreadable_extensions(extensions: &[String]) -> Vec<&str> {
        extensions
            .iter()
            .map(String::as_str)
            .filter(|ext| !READABLE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .collect()
    }
}

/// Format decided from the Content-Type header, falling back to sniffing
#[derive(Debug, PartialEq, Eq)]
enum Format {
    Html,
    Text,
}

impl Extractor for HtmlTextExtractor {
    fn extract(&self, bytes: &[u8], content_type: &str) -> Result<ExtractedText, ParseError> {
        match detect_format(bytes, content_type)? {
            Format::Html => {
                let html = decode_utf8(bytes)?;
                Ok(extract_html(&html))
            }
            Format::Text => {
                let text = decode_utf8(bytes)?;
                Ok(ExtractedText {
                    title: None,
                    text: normalize_lines(&text),
                })
            }
        }
    }
}

fn detect_format(bytes: &[u8], content_type: &str) -> Result<Format, ParseError> {
    let mime = mime_type(content_type);
    match mime.as_str() {
        "text/html" | "application/xhtml+xml" => Ok(Format::Html),
        "text/plain" | "text/markdown" | "text/x-markdown" => Ok(Format::Text),
        "" | "application/octet-stream" | "binary/octet-stream" => sniff(bytes),
        other => Err(ParseError::Unsupported(other.to_string())),
    }
}

/// Guesses the format of a body served without a useful Content-Type
fn sniff(bytes: &[u8]) -> Result<Format, ParseError> {
    if bytes.starts_with(b"%PDF") {
        return Err(ParseError::Unsupported("application/pdf".to_string()));
    }

    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(512)]).to_ascii_lowercase();
    let head = head.trim_start();
    if head.starts_with("<!doctype html") || head.starts_with("<html") {
        return Ok(Format::Html);
    }

    if std::str::from_utf8(bytes).is_ok() {
        Ok(Format::Text)
    } else {
        Err(ParseError::Unsupported("application/octet-stream".to_string()))
    }
}

fn decode_utf8(bytes: &[u8]) -> Result<String, ParseError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8(bytes.to_vec()).map_err(|e| ParseError::Encoding(e.to_string()))
}

fn extract_html(html: &str) -> ExtractedText {
    let document = Html::parse_document(html);
    let title = extract_title(&document);

    let root = CONTENT_SELECTORS
        .iter()
        .chain(std::iter::once(&"body"))
        .filter_map(|selector| Selector::parse(selector).ok())
        .find_map(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element());

    ExtractedText {
        title,
        text: visible_text(root),
    }
}

/// Collects the text under `root`, one trimmed line per text node
fn visible_text(root: ElementRef<'_>) -> String {
    let mut lines = Vec::new();

    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|element| HIDDEN_ELEMENTS.contains(&element.name()))
        });
        if hidden {
            continue;
        }

        let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !line.is_empty() {
            lines.push(line);
        }
    }

    lines.join("\n")
}

/// Trims trailing whitespace and collapses runs of blank lines
fn normalize_lines(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for line in text.lines().map(str::trim_end) {
        if line.is_empty() && out.last().map_or(true, |last| last.is_empty()) {
            continue;
        }
        out.push(line);
    }
    while out.last().is_some_and(|last| last.is_empty()) {
        out.pop();
    }
    out.join("\n")
}
