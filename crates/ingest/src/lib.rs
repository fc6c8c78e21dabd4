pub mod chunk;
pub mod chunker;

pub use chunk::{Chunk, reassemble};
pub use chunker::{Chunker, ChunkerConfig};

/// Chunk a document with the given window settings.
pub fn chunk_document(text: &str, config: ChunkerConfig) -> Vec<Chunk> {
    Chunker::new(config).chunk_text(text)
}
