//! Sentence-bounded text chunking with overlap

use unicode_segmentation::UnicodeSegmentation;

/// Text chunker with configurable size and overlap
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Target chunk size in characters
    chunk_size: usize,
    /// Overlap carried into the next chunk
    overlap: usize,
    /// Chunks shorter than this are dropped
    min_size: usize,
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::new(800, 100)
    }
}

impl TextChunker {
    /// Create a new chunker
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            overlap: overlap.min(chunk_size),
            min_size: 40,
        }
    }

    /// Set the minimum chunk size
    pub fn with_min_size(mut self, min_size: usize) -> Self {
        self.min_size = min_size;
        self
    }

    /// Split text into chunks that end on sentence boundaries
    ///
    /// A sentence longer than the chunk size becomes a chunk of its own.
    /// Text shorter than the minimum size still yields one chunk when it is
    /// all there is.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;

        for sentence in text.split_sentence_bounds() {
            let sentence_len = sentence.chars().count();

            if current_len > 0 && current_len + sentence_len > self.chunk_size {
                self.push_chunk(&mut chunks, &current);

                current = self.overlap_text(&current);
                current_len = current.chars().count();
            }

            current.push_str(sentence);
            current_len += sentence_len;
        }

        self.push_chunk(&mut chunks, &current);
        if chunks.is_empty() {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                chunks.push(trimmed.to_string());
            }
        }

        chunks
    }

    fn push_chunk(&self, chunks: &mut Vec<String>, text: &str) {
        let trimmed = text.trim();
        if trimmed.chars().count() >= self.min_size {
            chunks.push(trimmed.to_string());
        }
    }

    /// Tail of a chunk to repeat at the start of the next one
    fn overlap_text(&self, text: &str) -> String {
        if self.overlap == 0 {
            return String::new();
        }

        // A chunk no longer than the overlap would be repeated whole.
        let total = text.chars().count();
        if total <= self.overlap {
            return String::new();
        }

        let start = text
            .char_indices()
            .nth(total - self.overlap)
            .map(|(i, _)| i)
            .unwrap_or(0);
        let tail = &text[start..];

        // Prefer starting at a sentence, then at a word.
        if let Some(pos) = tail.find(". ") {
            return tail[pos + 2..].to_string();
        }
        if let Some(pos) = tail.find(' ') {
            return tail[pos + 1..].to_string();
        }

        tail.to_string()
    }
}
