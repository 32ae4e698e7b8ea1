//! Text chunking for retrieval over user-supplied documents.
//!
//! This module turns raw document text into overlapping [`Chunk`]s sized for an
//! embedding model, and formats retrieved passages back into a prompt context.
//!
//! Chunking walks the document with a sliding window of `chunk_size`
//! characters. Each window end is snapped backwards to the most preferred
//! boundary available inside the window (paragraph break, then line break,
//! then space), so chunks end on natural seams instead of mid-word. The window
//! then steps forward by `chunk_size - overlap`, so the tail of each chunk is
//! repeated at the head of the next one and no retrieval unit loses its
//! surrounding sentence.
//!
//! # Example
//!
//! ```
//! use docqa_context::text::TextChunker;
//!
//! let chunker = TextChunker::new(500, 50).unwrap();
//! let text = "First paragraph about the topic.\n\nSecond paragraph with more detail.";
//! let chunks = chunker.chunk(text);
//!
//! assert!(!chunks.is_empty());
//! for chunk in &chunks {
//!     assert!(!chunk.text.trim().is_empty());
//! }
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default boundary patterns, ordered from most to least preferred.
///
/// - `\n\n`: paragraph breaks
/// - `\n`: line breaks
/// - ` `: spaces, the most granular seam before falling back to raw characters
pub const DEFAULT_BOUNDARIES: &[&str] = &[r"\n\n", r"\n", r" "];

/// Errors raised while configuring a [`TextChunker`].
#[derive(Debug, Error)]
pub enum ContextError {
    /// Chunking parameters are internally inconsistent.
    #[error("invalid chunking parameters: {message}")]
    InvalidConfig { message: String },

    /// A boundary pattern failed to compile as a regular expression.
    #[error("invalid boundary pattern `{pattern}`")]
    InvalidBoundary {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

impl ContextError {
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

/// A bounded contiguous slice of document text used as a retrieval unit.
///
/// Chunks are ordered by position in the source document; `id` is the 0-based
/// position and `length` the character count of the trimmed text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// 0-based position of this chunk within the document.
    pub id: usize,
    /// Trimmed chunk text. Never empty.
    pub text: String,
    /// Character count of `text`.
    pub length: usize,
}

/// Splits document text into overlapping chunks along preferred boundaries.
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
    boundaries: Vec<Regex>,
}

impl TextChunker {
    /// Create a chunker with the default boundary preference list.
    ///
    /// Fails with [`ContextError::InvalidConfig`] when `chunk_size` is zero or
    /// `overlap >= chunk_size` (the window could never advance).
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ContextError> {
        Self::with_boundaries(chunk_size, overlap, DEFAULT_BOUNDARIES)
    }

    /// Create a chunker with custom boundary patterns, ordered from most to
    /// least preferred.
    pub fn with_boundaries(
        chunk_size: usize,
        overlap: usize,
        boundary_patterns: &[&str],
    ) -> Result<Self, ContextError> {
        if chunk_size == 0 {
            return Err(ContextError::invalid_config("chunk_size must be positive"));
        }
        if overlap >= chunk_size {
            return Err(ContextError::invalid_config(format!(
                "overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }

        let boundaries = boundary_patterns
            .iter()
            .map(|&pattern| {
                Regex::new(pattern).map_err(|source| ContextError::InvalidBoundary {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            chunk_size,
            overlap,
            boundaries,
        })
    }

    /// The configured window size in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// The configured overlap between consecutive chunks, in characters.
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into ordered, overlapping [`Chunk`]s.
    ///
    /// Empty or whitespace-only input yields an empty Vec rather than an
    /// error. Windows that trim to nothing are dropped, which can leave
    /// irregular-length trailing chunks.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut chunks: Vec<Chunk> = Vec::new();
        let mut start = 0usize;

        while start < text.len() {
            let end = self.window_end(text, start);
            let trimmed = text[start..end].trim();
            if !trimmed.is_empty() {
                chunks.push(Chunk {
                    id: chunks.len(),
                    text: trimmed.to_string(),
                    length: trimmed.chars().count(),
                });
            }

            if end >= text.len() {
                break;
            }

            // Step back by the overlap so the tail of this window repeats at
            // the head of the next, but always make forward progress.
            let overlap_bytes = char_offset_back(&text[start..end], self.overlap);
            let next = floor_char_boundary(text, end - overlap_bytes);
            start = if next > start { next } else { end };
        }

        chunks
    }

    // Find the byte offset where the window starting at `start` should end:
    // at most `chunk_size` characters forward, snapped backwards to the last
    // occurrence of the most preferred boundary inside the window.
    fn window_end(&self, text: &str, start: usize) -> usize {
        let remaining = &text[start..];
        let hard_end = char_offset_forward(remaining, self.chunk_size);
        if hard_end >= remaining.len() {
            return text.len();
        }

        let window = &remaining[..hard_end];
        for boundary in &self.boundaries {
            // Last match wins: it is the split closest to chunk_size for this
            // boundary type. Splits inside the overlap region would stall the
            // window, so they are skipped. `overlap` counts characters, so
            // the match offset is measured in characters too.
            if let Some(m) = boundary.find_iter(window).last() {
                if window[..m.end()].chars().count() > self.overlap {
                    return start + m.end();
                }
            }
        }

        // No usable boundary: fall back to a raw character split.
        start + hard_end
    }
}

/// Normalize extracted document text before chunking.
///
/// Trims every line, drops blank lines, and rejoins with single newlines.
/// This mirrors how text arrives from PDF extraction: full of ragged
/// whitespace and empty artifact lines.
pub fn clean_text(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format retrieved passages into a single prompt-context string.
///
/// Each passage is tagged `[Chunk i]` with a 1-based rank, and passages are
/// joined by blank lines. The explicit tags let the prompt builder instruct
/// the model not to mention chunk numbers in its answer. Returns an empty
/// string for an empty slice.
pub fn assemble_context<S: AsRef<str>>(passages: &[S]) -> String {
    passages
        .iter()
        .enumerate()
        .map(|(i, passage)| format!("[Chunk {}]\n{}", i + 1, passage.as_ref()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

// Byte length of the first `chars` characters of `text`.
fn char_offset_forward(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

// Byte length of the last `chars` characters of `text`.
fn char_offset_back(text: &str, chars: usize) -> usize {
    let total = text.chars().count();
    if chars >= total {
        return text.len();
    }
    text.len() - char_offset_forward(text, total - chars)
}

// Largest char boundary at or below `index`.
fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(matches!(
            TextChunker::new(0, 0),
            Err(ContextError::InvalidConfig { .. })
        ));
        assert!(matches!(
            TextChunker::new(100, 100),
            Err(ContextError::InvalidConfig { .. })
        ));
        assert!(matches!(
            TextChunker::new(100, 150),
            Err(ContextError::InvalidConfig { .. })
        ));
        assert!(TextChunker::new(100, 0).is_ok());
    }

    #[test]
    fn test_empty_and_whitespace_input() {
        let chunker = TextChunker::new(500, 50).unwrap();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("   \n\n\t  \n").is_empty());
    }

    #[test]
    fn test_short_input_single_chunk() {
        let chunker = TextChunker::new(500, 50).unwrap();
        let text = "A short document that fits in one chunk.";
        let chunks = chunker.chunk(text);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, 0);
        assert_eq!(chunks[0].text, text);
        assert_eq!(chunks[0].length, text.chars().count());
    }

    #[test]
    fn test_long_input_splits_with_overlap() {
        let chunker = TextChunker::new(100, 20).unwrap();
        let text = (0..50)
            .map(|i| format!("Sentence number {i} talks about the subject. "))
            .collect::<String>();
        let chunks = chunker.chunk(&text);

        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.id, i);
            assert!(!chunk.text.trim().is_empty());
            assert!(chunk.length <= 100);
        }

        // Consecutive chunks share content: the head of chunk i+1 repeats the
        // tail of chunk i.
        for pair in chunks.windows(2) {
            let head: String = pair[1].text.chars().take(10).collect();
            assert!(
                pair[0].text.contains(head.trim()),
                "expected overlap between {:?} and {:?}",
                pair[0].text,
                pair[1].text
            );
        }
    }

    #[test]
    fn test_content_preserved_across_chunks() {
        let chunker = TextChunker::new(80, 10).unwrap();
        let text = "The quick brown fox jumps over the lazy dog. \
                    Pack my box with five dozen liquor jugs. \
                    How vexingly quick daft zebras jump. \
                    Sphinx of black quartz judge my vow.";
        let chunks = chunker.chunk(text);

        // Every word of the source appears in some chunk.
        let merged: String = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        for word in text.split_whitespace() {
            assert!(merged.contains(word), "missing word: {word}");
        }
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let chunker = TextChunker::new(60, 5).unwrap();
        let text = "First paragraph here, fairly short.\n\nSecond paragraph follows with some more words in it.";
        let chunks = chunker.chunk(text);

        // The first split should land on the paragraph break, not mid-word.
        assert_eq!(chunks[0].text, "First paragraph here, fairly short.");
    }

    #[test]
    fn test_multibyte_text_does_not_panic() {
        let chunker = TextChunker::new(50, 10).unwrap();
        let text = "कृत्रिम बुद्धिमत्ता मशीनों में मानव बुद्धिमत्ता का अनुकरण है। \
                    यह कंप्यूटर को सोचने और सीखने में सक्षम बनाता है। "
            .repeat(5);
        let chunks = chunker.chunk(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.length <= 50);
        }
    }

    #[test]
    fn test_multibyte_boundary_inside_overlap_is_skipped() {
        // Devanagari is three bytes per character, so a space 7 characters
        // into the window sits well past 10 in byte terms. It still falls
        // inside the 10-character overlap region and must not end the
        // window; the first chunk is a raw 12-character split instead.
        let head = "कखगघङच";
        let tail = "कखगघङचछजझञटठडढणत";
        let text = format!("{head} {tail}");

        let chunker = TextChunker::new(12, 10).unwrap();
        let chunks = chunker.chunk(&text);

        assert_eq!(chunks[0].length, 12);
    }

    #[test]
    fn test_clean_text() {
        let raw = "  First line  \n\n\n   \nSecond line\n  \nThird line  ";
        assert_eq!(clean_text(raw), "First line\nSecond line\nThird line");
        assert_eq!(clean_text("\n\n\n"), "");
    }

    #[test]
    fn test_assemble_context() {
        let passages = ["alpha passage", "beta passage"];
        let context = assemble_context(&passages);
        assert_eq!(context, "[Chunk 1]\nalpha passage\n\n[Chunk 2]\nbeta passage");

        let empty: [&str; 0] = [];
        assert_eq!(assemble_context(&empty), "");
    }
}
