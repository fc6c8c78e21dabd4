use serde::{Deserialize, Serialize};

/// A window of the source document. Chunks are produced in document order and
/// consecutive chunks share `overlap` characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    pub offset: (usize, usize), // [start, end) byte positions in the source
}

impl Chunk {
    pub fn new(index: usize, source: &str, offset: (usize, usize)) -> Self {
        Self {
            index,
            text: source[offset.0..offset.1].to_string(),
            offset,
        }
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Rebuild the source text from ordered, overlapping chunks.
pub fn reassemble(chunks: &[Chunk]) -> String {
    let mut out = String::new();
    let mut covered = 0;

    for chunk in chunks {
        let (start, end) = chunk.offset;
        if end <= covered {
            continue;
        }
        let skip = covered.saturating_sub(start);
        out.push_str(&chunk.text[skip..]);
        covered = end;
    }

    out
}
