//! Sliding-window text chunking.
//!
//! Text is split into fixed-size windows measured in characters. Each window
//! starts `size - overlap` characters after the previous one, so consecutive
//! chunks share `overlap` characters of context.

use crate::document::Chunk;
use crate::error::{RagError, Result};

/// Splits text into overlapping fixed-size windows.
///
/// # Example
///
/// ```rust,ignore
/// use brain_rag::SlidingWindowChunker;
///
/// let chunker = SlidingWindowChunker::new(1000, 200)?;
/// let chunks = chunker.chunk(&text);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SlidingWindowChunker {
    size: usize,
    overlap: usize,
}

impl SlidingWindowChunker {
    /// Create a new chunker.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidChunkConfig`] unless `overlap < size`; any
    /// other combination would never advance the window.
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        if overlap >= size {
            return Err(RagError::InvalidChunkConfig { size, overlap });
        }
        Ok(Self { size, overlap })
    }

    /// Window size in characters.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Overlap between consecutive windows in characters.
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into chunks. Empty text yields no chunks.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        let step = self.size - self.overlap;
        let mut chunks = Vec::new();
        let mut start = 0;
        let mut start_byte = 0;

        while start_byte < text.len() {
            let rest = &text[start_byte..];
            // `None` when the window runs to the end of the text.
            let full_width = rest.char_indices().nth(self.size).map(|(width, _)| width);
            let (width, chars) = match full_width {
                Some(width) => (width, self.size),
                None => (rest.len(), rest.chars().count()),
            };

            chunks.push(Chunk {
                index: chunks.len(),
                text: rest[..width].to_string(),
                start,
                end: start + chars,
            });

            // Any later window would sit inside this one.
            if full_width.is_none() {
                break;
            }
            start += step;
            start_byte += rest.char_indices().nth(step).map_or(rest.len(), |(offset, _)| offset);
        }

        chunks
    }
}

/// Split `text` into windows of `size` characters overlapping by `overlap`.
///
/// # Errors
///
/// Returns [`RagError::InvalidChunkConfig`] if `overlap >= size`.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    Ok(SlidingWindowChunker::new(size, overlap)?.chunk(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(chunk_text("", 10, 2).unwrap().is_empty());
    }

    #[test]
    fn rejects_non_advancing_window() {
        assert!(matches!(
            chunk_text("abc", 5, 5),
            Err(RagError::InvalidChunkConfig { size: 5, overlap: 5 })
        ));
        assert!(matches!(chunk_text("abc", 5, 9), Err(RagError::InvalidChunkConfig { .. })));
        assert!(matches!(chunk_text("abc", 0, 0), Err(RagError::InvalidChunkConfig { .. })));
    }

    #[test]
    fn text_shorter_than_window_is_one_chunk() {
        let chunks = chunk_text("hello", 1000, 200).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "hello");
        assert_eq!((chunks[0].start, chunks[0].end), (0, 5));
    }

    #[test]
    fn windows_overlap_and_last_is_clipped() {
        let chunks = chunk_text("abcdefghij", 4, 1).unwrap();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abcd", "defg", "ghij"]);

        let chunks = chunk_text("abcdefghijk", 4, 1).unwrap();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abcd", "defg", "ghij", "jk"]);
    }

    #[test]
    fn offsets_count_characters_not_bytes() {
        let text = "héllo wörld ünïcode";
        let chunks = chunk_text(text, 6, 2).unwrap();
        for chunk in &chunks {
            let expected: String =
                text.chars().skip(chunk.start).take(chunk.end - chunk.start).collect();
            assert_eq!(chunk.text, expected);
        }
        assert_eq!(chunks.last().unwrap().end, text.chars().count());
    }

    #[test]
    fn long_multibyte_text_is_covered_without_gaps() {
        let text: String = "añ€😀".repeat(1500);
        let len = text.chars().count();
        let chunks = chunk_text(&text, 1000, 200).unwrap();

        assert_eq!(chunks.len(), (len - 200).div_ceil(800));
        assert_eq!(chunks[0].start, 0);
        assert_eq!(chunks.last().unwrap().end, len);
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].start, pair[0].start + 800);
        }

        let mut rebuilt: String = chunks[0].text.clone();
        for chunk in &chunks[1..] {
            rebuilt.extend(chunk.text.chars().skip(200));
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn indices_are_sequential() {
        let chunks = chunk_text(&"x".repeat(50), 10, 3).unwrap();
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
    }
}
