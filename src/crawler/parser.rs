//! HTML parser for extracting links and metadata
//!
//! This module handles parsing HTML content to extract:
//! - Links to follow or record (from <a> tags, canonical links and embeds)
//! - Page title
//!
//! Every extracted link is resolved against the page URL (or its `<base href>`),
//! normalized, and classified as a document or a page.

use crate::url::{classify_link, normalize_url, LinkKind};
use crate::ParseError;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// A normalized link found on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedLink {
    /// Absolute, normalized URL
    pub url: Url,
    /// Whether the link is a document or a page
    pub kind: LinkKind,
}

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Links in document order, without duplicates
    pub links: Vec<ExtractedLink>,
}

impl ParsedPage {
    /// Returns the document links on the page
    pub fn documents(&self) -> impl Iterator<Item = &ExtractedLink> {
        self.links.iter().filter(|l| l.kind == LinkKind::Document)
    }

    /// Returns the page links on the page
    pub fn pages(&self) -> impl Iterator<Item = &ExtractedLink> {
        self.links.iter().filter(|l| l.kind == LinkKind::Page)
    }
}

/// Parses HTML content and extracts links and metadata
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document (`download` links too)
/// - `<link rel="canonical" href="...">`
/// - `<embed src>`, `<iframe src>` and `<object data>` pointing at documents
///
/// **Exclude:**
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs
/// - Fragment-only links
/// - Anything that does not resolve to an HTTP(S) URL
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `page_url` - The URL the page was served from
/// * `document_extensions` - Extensions that mark a link as a document
///
/// # Example
///
/// ```
/// use docent::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/notes.pdf">Notes</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url, &["pdf".to_string()]).unwrap();
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.documents().count(), 1);
/// ```
pub fn parse_html(
    html: &str,
    page_url: &Url,
    document_extensions: &[String],
) -> Result<ParsedPage, ParseError> {
    if page_url.cannot_be_a_base() {
        return Err(ParseError::Html {
            url: page_url.to_string(),
            message: "page URL cannot serve as a base for relative links".to_string(),
        });
    }

    let document = Html::parse_document(html);
    let base_url = extract_base(&document, page_url);

    let title = extract_title(&document);
    let links = extract_links(&document, &base_url, document_extensions);

    Ok(ParsedPage { title, links })
}

/// Extracts the page title from the HTML document
pub(crate) fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| {
            element
                .text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|s| !s.is_empty())
}

/// Honors `<base href>` when present
fn extract_base(document: &Html, page_url: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|element| element.value().attr("href"))
                .and_then(|href| page_url.join(href.trim()).ok())
        })
        .unwrap_or_else(|| page_url.clone())
}

fn extract_links(document: &Html, base_url: &Url, extensions: &[String]) -> Vec<ExtractedLink> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    let mut push = |href: &str, documents_only: bool| {
        let Some(url) = resolve_link(href, base_url) else {
            return;
        };
        let kind = classify_link(&url, extensions);
        if documents_only && kind != LinkKind::Document {
            return;
        }
        if seen.insert(url.to_string()) {
            links.push(ExtractedLink { url, kind });
        }
    };

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if let Some(href) = element.value().attr("href") {
                push(href, false);
            }
        }
    }

    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            if let Some(href) = element.value().attr("href") {
                push(href, false);
            }
        }
    }

    // Embedded viewers only matter when they point at a document
    for (selector, attr) in [("embed[src]", "src"), ("iframe[src]", "src"), ("object[data]", "data")] {
        if let Ok(selector) = Selector::parse(selector) {
            for element in document.select(&selector) {
                if let Some(href) = element.value().attr(attr) {
                    push(href, true);
                }
            }
        }
    }

    links
}

/// Resolves a link href to a normalized absolute URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    normalize_url(absolute_url.as_str()).ok()
}
