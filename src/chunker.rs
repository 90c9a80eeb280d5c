//! Document-to-chunk segmentation
//!
//! Text is cut into fixed-size character windows. Consecutive windows share
//! `overlap` characters, so window `k` starts at `k * (size - overlap)`.
//! Emission stops with the first window that reaches the end of the text.

use crate::config::validate_chunk_params;
use crate::ConfigError;
use serde::{Deserialize, Serialize};

/// A contiguous slice of a document's text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// `{document_id}:{sequence_index:06}`
    pub id: String,
    /// Owning document
    pub document_id: String,
    /// The chunk text
    pub text: String,
    /// First character (inclusive)
    pub start_offset: usize,
    /// Last character (exclusive)
    pub end_offset: usize,
    /// Position of the chunk within its document
    pub sequence_index: usize,
}

impl Chunk {
    /// Builds the chunk id for a document and sequence index
    ///
    /// Zero padding keeps lexicographic id order equal to sequence order.
    pub fn id_for(document_id: &str, sequence_index: usize) -> String {
        format!("{}:{:06}", document_id, sequence_index)
    }
}

/// Splits `text` into overlapping chunks
///
/// # Arguments
///
/// * `document_id` - Id of the document the text belongs to
/// * `text` - The extracted text
/// * `size` - Window length in characters
/// * `overlap` - Characters shared by consecutive windows
///
/// # Returns
///
/// * `Ok(Vec<Chunk>)` - Chunks in sequence order (empty for empty text)
/// * `Err(ConfigError)` - Unless `size > overlap > 0`
///
/// # Example
///
/// ```
/// use docent::chunk;
///
/// let text = "a".repeat(2300);
/// let chunks = chunk("doc", &text, 1000, 200).unwrap();
/// let spans: Vec<_> = chunks.iter().map(|c| (c.start_offset, c.end_offset)).collect();
/// assert_eq!(spans, vec![(0, 1000), (800, 1800), (1600, 2300)]);
/// ```
pub fn chunk(
    document_id: &str,
    text: &str,
    size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, ConfigError> {
    validate_chunk_params(size, overlap)?;

    // Byte offset of every char boundary, with the end of the text appended
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let len = boundaries.len() - 1;
    let stride = size - overlap;

    let mut chunks = Vec::with_capacity(len.div_ceil(stride));
    let mut start = 0;

    while start < len {
        let end = (start + size).min(len);
        let sequence_index = chunks.len();

        chunks.push(Chunk {
            id: Chunk::id_for(document_id, sequence_index),
            document_id: document_id.to_string(),
            text: text[boundaries[start]..boundaries[end]].to_string(),
            start_offset: start,
            end_offset: end,
            sequence_index,
        });

        if end == len {
            break;
        }
        start += stride;
    }

    Ok(chunks)
}
