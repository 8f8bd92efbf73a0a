//! Boundary-aware text chunking with overlap.

use crate::models::{ChunkingConfig, DocumentMetadata, Passage};

/// Characters that end a sentence or paragraph.
const BOUNDARY_CHARS: [char; 4] = ['.', '!', '?', '\n'];

/// Upper bound on how far back a window end may snap to a boundary.
const MAX_BOUNDARY_LOOKBACK: usize = 100;

/// Splits documents into overlapping passages.
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Window size in characters
    chunk_size: usize,
    /// Characters shared by consecutive windows
    overlap: usize,
}

impl TextChunker {
    pub fn new(config: &ChunkingConfig) -> Self {
        Self {
            chunk_size: config.chunk_size.max(1),
            overlap: config.overlap,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(&ChunkingConfig::default())
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into passage strings using this chunker's settings.
    pub fn split(&self, text: &str) -> Vec<String> {
        chunk(text, self.chunk_size, self.overlap)
    }

    /// Split a document and tag every passage with its position and the total count.
    pub fn chunk_document(
        &self,
        document_id: &str,
        text: &str,
        metadata: &DocumentMetadata,
    ) -> Vec<Passage> {
        let pieces = self.split(text);
        let total = pieces.len() as u32;

        pieces
            .into_iter()
            .enumerate()
            .map(|(idx, piece)| {
                Passage::new(document_id, piece, idx as u32, total, metadata.clone())
            })
            .collect()
    }
}

/// Split `text` into overlapping passages of at most `chunk_size` characters.
///
/// Text that already fits is returned unchanged. Longer text is cut into
/// windows whose end snaps back to the nearest `.`, `!`, `?` or newline found
/// within `min(100, chunk_size / 2)` characters. Each window is trimmed and
/// kept only if non-empty; the next window starts `overlap` characters before
/// the previous end. A window that would not move forward starts at the
/// previous end instead, so the loop always terminates.
pub fn chunk(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    let chunk_size = chunk_size.max(1);

    if total <= chunk_size {
        return vec![text.to_string()];
    }

    let lookback = MAX_BOUNDARY_LOOKBACK.min(chunk_size / 2);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < total {
        let mut end = start + chunk_size;

        if end < total
            && let Some(i) = (0..lookback).find(|i| BOUNDARY_CHARS.contains(&chars[end - i - 1]))
        {
            end -= i;
        }

        let piece: String = chars[start..end.min(total)].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }

        let mut next = end.saturating_sub(overlap);
        if next <= start {
            next = end;
        }
        if next >= total {
            break;
        }
        start = next;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentences(total_chars: usize) -> String {
        let sentence = "The quick brown fox jumps over the lazy dog. ";
        sentence.repeat(total_chars / sentence.len() + 1)[..total_chars].to_string()
    }

    #[test]
    fn test_short_text_returned_unchanged() {
        let text = "  Hello, world!  ";
        assert_eq!(chunk(text, 1000, 200), vec![text.to_string()]);
    }

    #[test]
    fn test_exact_size_is_single_chunk() {
        let text = "a".repeat(500);
        assert_eq!(chunk(&text, 500, 100), vec![text]);
    }

    #[test]
    fn test_empty_text_single_empty_chunk() {
        assert_eq!(chunk("", 10, 2), vec![String::new()]);
    }

    #[test]
    fn test_long_text_multiple_bounded_chunks() {
        let text = sentences(5000);
        let chunks = chunk(&text, 500, 100);

        assert!(chunks.len() > 1);
        for piece in &chunks {
            assert!(piece.chars().count() <= 520, "chunk too long: {}", piece.len());
            assert!(!piece.is_empty());
        }
    }

    #[test]
    fn test_chunks_snap_to_sentence_boundary() {
        let text = sentences(5000);
        let chunks = chunk(&text, 500, 100);

        for piece in &chunks[..chunks.len() - 1] {
            assert!(piece.ends_with('.'), "expected sentence end: {:?}", piece);
        }
    }

    #[test]
    fn test_no_boundary_cuts_at_window() {
        let text = "a".repeat(250);
        let chunks = chunk(&text, 100, 20);

        let lengths: Vec<usize> = chunks.iter().map(String::len).collect();
        assert_eq!(lengths, vec![100, 100, 90, 10]);
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let text: String = (0..300)
            .map(|i| char::from(b'a' + (i % 26) as u8))
            .collect();
        let chunks = chunk(&text, 100, 20);

        for pair in chunks.windows(2) {
            let tail = &pair[0][pair[0].len() - 20..];
            assert!(pair[1].starts_with(tail));
        }
    }

    #[test]
    fn test_reconstructs_original_content() {
        let text: String = (0..1234)
            .map(|i| char::from(b'a' + (i % 26) as u8))
            .collect();
        let chunks = chunk(&text, 100, 30);

        let mut rebuilt = chunks[0].clone();
        for piece in &chunks[1..] {
            rebuilt.push_str(&piece[30..]);
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_terminates_when_overlap_not_smaller_than_size() {
        let text = "x".repeat(1000);
        let chunks = chunk(&text, 100, 100);
        assert_eq!(chunks.len(), 10);

        let chunks = chunk(&text, 100, 500);
        assert_eq!(chunks.len(), 10);
    }

    #[test]
    fn test_terminates_when_snap_outruns_overlap() {
        let text = "abcd.".repeat(400);
        let chunks = chunk(&text, 20, 19);
        assert!(!chunks.is_empty());
        assert!(chunks.len() < 2000);
    }

    #[test]
    fn test_whitespace_only_windows_dropped() {
        let text = format!("{}{}", "word ".repeat(30), " ".repeat(300));
        let chunks = chunk(&text, 100, 10);
        assert!(chunks.iter().all(|c| !c.trim().is_empty()));
    }

    #[test]
    fn test_multibyte_characters() {
        let text = "한국어 문장입니다. ".repeat(100);
        let chunks = chunk(&text, 50, 10);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 50));
    }

    #[test]
    fn test_chunk_document_tags_positions() {
        let chunker = TextChunker::new(&ChunkingConfig {
            chunk_size: 200,
            overlap: 40,
        });
        let metadata = DocumentMetadata::new("fox.txt", ".txt", 2000);
        let passages = chunker.chunk_document("doc-1", &sentences(2000), &metadata);

        assert!(passages.len() > 1);
        for (i, passage) in passages.iter().enumerate() {
            assert_eq!(passage.chunk_index, i as u32);
            assert_eq!(passage.chunk_count, passages.len() as u32);
            assert_eq!(passage.document_id, "doc-1");
            assert_eq!(passage.source(), "fox.txt");
        }
    }

    #[test]
    fn test_with_defaults() {
        let chunker = TextChunker::with_defaults();
        assert_eq!(chunker.chunk_size(), 1000);
        assert_eq!(chunker.overlap(), 200);
    }
}
