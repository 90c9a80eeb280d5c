//! Query-focused excerpts of retrieved text

/// Width of the scanning window in characters
const WINDOW_CHARS: usize = 300;

/// Step between scanned window starts
const WINDOW_STEP: usize = 50;

/// Query words shorter than this are not counted
const MIN_QUERY_WORD_CHARS: usize = 3;

/// Returns the part of `text` densest in query words
///
/// Windows of 300 characters are scanned every 50 characters and scored by
/// the number of query-word occurrences. The excerpt spans half a window
/// before the best window start and one and a half windows after it, with
/// `...` marking truncation on either side.
pub fn extract_excerpt(text: &str, query: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return String::new();
    }

    let words = query_words(query);
    let mut best_pos = 0;
    let mut best_score = 0;

    for start in (0..chars.len()).step_by(WINDOW_STEP) {
        let end = (start + WINDOW_CHARS).min(chars.len());
        let window: String = chars[start..end].iter().flat_map(|c| c.to_lowercase()).collect();
        let score: usize = words.iter().map(|w| window.matches(w.as_str()).count()).sum();
        if score > best_score {
            best_score = score;
            best_pos = start;
        }
    }

    let start = best_pos.saturating_sub(WINDOW_CHARS / 2);
    let end = (best_pos + WINDOW_CHARS * 3 / 2).min(chars.len());

    let body: String = chars[start..end].iter().collect();
    let mut excerpt = String::new();
    if start > 0 {
        excerpt.push_str("...");
    }
    excerpt.push_str(body.trim());
    if end < chars.len() {
        excerpt.push_str("...");
    }
    excerpt
}

fn query_words(query: &str) -> Vec<String> {
    query
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| w.chars().count() >= MIN_QUERY_WORD_CHARS)
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_returned_whole() {
        assert_eq!(extract_excerpt("  The ark rested.  ", "ark"), "The ark rested.");
        assert_eq!(extract_excerpt("", "ark"), "");
    }

    #[test]
    fn test_excerpt_centres_on_matches() {
        let text = format!("{}Noah built the ark.{}", "x".repeat(1000), "y".repeat(1000));
        let excerpt = extract_excerpt(&text, "Noah ark");

        assert!(excerpt.contains("Noah built the ark."));
        assert!(excerpt.starts_with("..."));
        assert!(excerpt.ends_with("..."));
        assert!(excerpt.chars().count() <= WINDOW_CHARS * 2 + 6);
    }

    #[test]
    fn test_no_match_starts_at_beginning() {
        let text = "a".repeat(1000);
        let excerpt = extract_excerpt(&text, "zebra");
        assert!(!excerpt.starts_with("..."));
        assert!(excerpt.ends_with("..."));
        assert_eq!(excerpt.chars().count(), 450 + 3);
    }

    #[test]
    fn test_multibyte_text_is_sliced_on_chars() {
        let text = "é".repeat(700);
        let excerpt = extract_excerpt(&text, "é");
        assert!(excerpt.chars().all(|c| c == 'é' || c == '.'));
    }
}
