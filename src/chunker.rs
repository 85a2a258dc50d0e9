/// Document chunking: splits text into overlapping segments sized for
/// embedding.
///
/// Chunks are contiguous char spans of the source text. Cut points prefer
/// paragraph boundaries, then sentence boundaries, then hard cuts; each
/// chunk after the first starts `overlap` chars before the previous cut.
/// Concatenating the chunks with overlap prefixes removed reconstructs the
/// source text exactly.
use crate::error::{RagError, Result};

/// A chunk produced by [`chunk`], before embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkCandidate {
    /// Ordinal position within the document.
    pub position: usize,
    /// Char offset of `text` within the source (including the overlap prefix).
    pub start_offset: usize,
    pub text: String,
}

impl ChunkCandidate {
    /// Char offset one past the end of `text` within the source.
    #[must_use]
    pub fn end_offset(&self) -> usize {
        self.start_offset + self.text.chars().count()
    }
}

/// Split `text` into chunks of at most `max_chars` chars with `overlap`
/// chars carried over from the previous chunk.
///
/// Returns an empty `Vec` for empty input. Fails with
/// [`RagError::InvalidArgument`] unless `max_chars > 0` and
/// `overlap < max_chars`.
pub fn chunk(text: &str, max_chars: usize, overlap: usize) -> Result<Vec<ChunkCandidate>> {
    if max_chars == 0 {
        return Err(RagError::InvalidArgument(
            "max_chars must be positive".to_string(),
        ));
    }
    if overlap >= max_chars {
        return Err(RagError::InvalidArgument(format!(
            "overlap ({overlap}) must be less than max_chars ({max_chars})"
        )));
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Ok(Vec::new());
    }

    let mut chunks = Vec::new();
    let mut cut = 0;
    let mut position = 0;

    while cut < chars.len() {
        // Interior budget: the first chunk has no overlap prefix
        let step = if position == 0 {
            max_chars
        } else {
            max_chars - overlap
        };
        let next_cut = find_cut_point(&chars, cut, step);

        let start = if position == 0 {
            0
        } else {
            cut.saturating_sub(overlap)
        };
        let chunk_text: String = chars[start..next_cut].iter().collect();

        chunks.push(ChunkCandidate {
            position,
            start_offset: start,
            text: chunk_text,
        });

        position += 1;
        cut = next_cut;
    }

    Ok(chunks)
}

/// Choose the cut point for the span starting at `from` with budget `step`.
///
/// Searches backwards from the hard limit to `step / 2` for a paragraph
/// break, then a sentence boundary, and falls back to the hard limit.
fn find_cut_point(chars: &[char], from: usize, step: usize) -> usize {
    let hard = from + step;
    if hard >= chars.len() {
        return chars.len();
    }

    let floor = from + (step / 2).max(1);

    // Paragraph boundary: cut right after "\n\n"
    let mut i = hard;
    while i > floor {
        if chars[i - 1] == '\n' && chars[i - 2] == '\n' {
            return i;
        }
        i -= 1;
    }

    // Sentence boundary: cut right after terminal punctuation
    let mut i = hard;
    while i > floor {
        let c = chars[i - 1];
        if c == '.' || c == '!' || c == '?' || c == '\n' || c == '。' {
            return i;
        }
        i -= 1;
    }

    hard
}
