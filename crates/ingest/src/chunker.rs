use unicode_segmentation::UnicodeSegmentation;

use crate::chunk::Chunk;

#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
        }
    }
}

/// Splits text into overlapping windows, breaking at the coarsest boundary
/// available: paragraph, line, sentence, word, then a hard character cut.
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        let chunk_size = config.chunk_size.max(1);
        let chunk_overlap = config.chunk_overlap.min(chunk_size - 1);
        Self {
            config: ChunkerConfig {
                chunk_size,
                chunk_overlap,
            },
        }
    }

    pub fn chunk_text(&self, text: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        if text.is_empty() {
            return chunks;
        }

        // Byte offset of every char, plus the end of the text
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total = bounds.len() - 1;

        let mut start = 0;
        loop {
            let limit = (start + self.config.chunk_size).min(total);
            let end = if limit == total {
                total
            } else {
                self.find_break(text, &bounds, start, limit)
            };

            chunks.push(Chunk::new(chunks.len(), text, (bounds[start], bounds[end])));

            if end == total {
                break;
            }
            start = self.next_start(text, &bounds, end);
        }

        tracing::debug!(chunks = chunks.len(), chars = total, "chunked document");
        chunks
    }

    /// Pick the end (char position) of the chunk starting at `start`.
    fn find_break(&self, text: &str, bounds: &[usize], start: usize, limit: usize) -> usize {
        let base = bounds[start];
        let window = &text[base..bounds[limit]];
        // Anything shorter would not move the next chunk past this one
        let min_end = start + self.config.chunk_overlap + 1;

        let accept = |byte_in_window: usize| {
            char_position(bounds, base + byte_in_window).filter(|&pos| pos >= min_end)
        };

        for separator in ["\n\n", "\n"] {
            if let Some(pos) = window.rfind(separator).and_then(|i| accept(i + separator.len())) {
                return pos;
            }
        }

        let last_sentence = window
            .split_sentence_bound_indices()
            .map(|(i, _)| i)
            .filter(|&i| i > 0)
            .last();
        if let Some(pos) = last_sentence.and_then(accept) {
            return pos;
        }

        let last_space = window
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_whitespace())
            .map(|(i, c)| i + c.len_utf8());
        if let Some(pos) = last_space.and_then(accept) {
            return pos;
        }

        limit
    }

    /// Start of the next chunk: `overlap` characters back from `end`, moved
    /// forward to the next word start when one exists inside the overlap.
    fn next_start(&self, text: &str, bounds: &[usize], end: usize) -> usize {
        let candidate = end - self.config.chunk_overlap;
        let overlap = &text[bounds[candidate]..bounds[end]];

        let at_word_start = candidate == 0
            || text[..bounds[candidate]]
                .chars()
                .next_back()
                .is_some_and(char::is_whitespace);
        if at_word_start {
            return candidate;
        }

        overlap
            .split_word_bound_indices()
            .skip(1)
            .find(|(_, word)| !word.chars().all(char::is_whitespace))
            .and_then(|(i, _)| char_position(bounds, bounds[candidate] + i))
            .filter(|&pos| pos < end)
            .unwrap_or(candidate)
    }
}

fn char_position(bounds: &[usize], byte: usize) -> Option<usize> {
    bounds.binary_search(&byte).ok()
}
