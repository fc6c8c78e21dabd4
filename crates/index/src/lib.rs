pub mod embeddings;
pub mod vector_index;

pub use embeddings::{Embedder, EmbeddingTask, GeminiEmbeddingClient, OllamaEmbeddingClient};
pub use vector_index::{DEFAULT_TOP_K, VectorIndex};
