//! URL handling module for Docent
//!
//! This module provides URL normalization, site comparison and link
//! classification.

mod domain;
mod normalize;

// Re-export main functions
pub use domain::{extract_domain, is_same_site};
pub use normalize::normalize_url;

use url::Url;

/// What a discovered link points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LinkKind {
    /// A downloadable artifact; recorded but never traversed
    Document,
    /// An HTML page that may be crawled further
    Page,
}

impl LinkKind {
    /// Returns true if the link should be traversed by the crawler
    pub fn is_crawlable(&self) -> bool {
        matches!(self, Self::Page)
    }
}

/// Classifies a link as a document or a page
///
/// A link is a document when the last path segment ends in one of the
/// configured `extensions` (compared case-insensitively, without the dot).
/// Everything else is a page.
///
/// # Examples
///
/// ```
/// use docent::url::{classify_link, LinkKind};
/// use url::Url;
///
/// let extensions = vec!["pdf".to_string()];
/// let url = Url::parse("https://example.com/notes/Genesis.PDF").unwrap();
/// assert_eq!(classify_link(&url, &extensions), LinkKind::Document);
///
/// let url = Url::parse("https://example.com/studies/genesis").unwrap();
/// assert_eq!(classify_link(&url, &extensions), LinkKind::Page);
/// ```
pub fn classify_link(url: &Url, extensions: &[String]) -> LinkKind {
    let last_segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");

    let extension = match last_segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => return LinkKind::Page,
    };

    if extensions
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(&extension))
    {
        LinkKind::Document
    } else {
        LinkKind::Page
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extensions() -> Vec<String> {
        vec!["pdf".to_string(), "txt".to_string()]
    }

    fn classify(url: &str) -> LinkKind {
        classify_link(&Url::parse(url).unwrap(), &extensions())
    }

    #[test]
    fn test_pdf_is_document() {
        assert_eq!(classify("https://example.com/a/notes.pdf"), LinkKind::Document);
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        assert_eq!(classify("https://example.com/NOTES.PDF"), LinkKind::Document);
    }

    #[test]
    fn test_query_does_not_hide_extension() {
        assert_eq!(
            classify("https://example.com/notes.pdf?download=1"),
            LinkKind::Document
        );
    }

    #[test]
    fn test_html_is_page() {
        assert_eq!(classify("https://example.com/index.html"), LinkKind::Page);
        assert_eq!(classify("https://example.com/studies"), LinkKind::Page);
        assert_eq!(classify("https://example.com/"), LinkKind::Page);
    }

    #[test]
    fn test_dotfile_is_page() {
        assert_eq!(classify("https://example.com/.pdf"), LinkKind::Page);
    }

    #[test]
    fn test_unlisted_extension_is_page() {
        assert_eq!(classify("https://example.com/slides.pptx"), LinkKind::Page);
    }

    #[test]
    fn test_is_crawlable() {
        assert!(LinkKind::Page.is_crawlable());
        assert!(!LinkKind::Document.is_crawlable());
    }
}
