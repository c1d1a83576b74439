//! Fixed-size, overlapping character windows over document text.
//!
//! Counting is done in `char`s, never bytes, so multi-byte text is never split
//! inside a code point. Sentence and paragraph boundaries are ignored.

/// Splits text into overlapping chunks of at most `chunk_size` characters.
#[derive(Debug, Clone, Copy)]
pub struct TextSegmenter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSegmenter {
    /// `chunk_size` is raised to 1 and `chunk_overlap` capped below it.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Left-to-right windows; each starts `chunk_size - chunk_overlap` chars after the last.
    ///
    /// Input no longer than `chunk_size` comes back as a single chunk; empty input yields none.
    pub fn segment(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let total_chars = chars.len();
        let mut chunks = Vec::new();

        if total_chars == 0 {
            return chunks;
        }

        let step = self.chunk_size - self.chunk_overlap;
        let mut start = 0;

        loop {
            let end = (start + self.chunk_size).min(total_chars);
            chunks.push(chars[start..end].iter().collect());
            if end == total_chars {
                break;
            }
            start += step;
        }

        chunks
    }
}

impl Default for TextSegmenter {
    fn default() -> Self {
        Self::new(1000, 200)
    }
}
