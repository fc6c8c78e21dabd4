use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::embeddings::{Embedder, EmbeddingTask};

pub const INDEX_FORMAT_VERSION: u32 = 1;
pub const DEFAULT_TOP_K: usize = 3;

/// Exact nearest-neighbour index over chunk embeddings, ranked by Euclidean
/// distance. `vectors[i]` is the embedding of `chunks[i]`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VectorIndex {
    chunks: Vec<String>,
    vectors: Vec<Vec<f32>>,
    dimension: usize,
}

#[derive(Serialize, Deserialize)]
struct IndexSnapshot {
    format_version: u32,
    dimension: usize,
    chunks: Vec<String>,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    /// The "no usable index" value: searching it always returns nothing
    pub fn empty() -> Self {
        Self::default()
    }

    /// Embed every chunk and index the results. A failed embedding call is an
    /// error; an unusable batch yields an empty index.
    pub async fn build(chunks: &[ingest::Chunk], embedder: &dyn Embedder) -> Result<Self> {
        if chunks.is_empty() {
            return Ok(Self::empty());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder
            .embed(&texts, EmbeddingTask::RetrievalDocument)
            .await
            .context("Failed to embed document chunks")?;

        Ok(Self::from_embeddings(texts, vectors))
    }

    pub fn from_embeddings(chunks: Vec<String>, vectors: Vec<Vec<f32>>) -> Self {
        if let Err(reason) = check_shape(&chunks, &vectors) {
            tracing::warn!(
                chunks = chunks.len(),
                vectors = vectors.len(),
                reason,
                "Embedding batch unusable, index left empty"
            );
            return Self::empty();
        }

        let dimension = vectors.first().map_or(0, Vec::len);
        tracing::info!(chunks = chunks.len(), dimension, "built vector index");
        Self {
            chunks,
            vectors,
            dimension,
        }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    /// Indices and squared distances of the `k` closest vectors, closest first.
    /// Equal distances keep chunk order.
    pub fn nearest(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        if self.is_empty() || query.len() != self.dimension {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = self.vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, squared_distance(query, v)))
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);
        scored
    }

    /// Chunks most similar to `query`, most similar first. Returns at most
    /// `k` results and never fails: an empty index or a failed query
    /// embedding gives an empty result.
    pub async fn search(&self, embedder: &dyn Embedder, query: &str, k: usize) -> Vec<String> {
        if self.is_empty() || k == 0 {
            return Vec::new();
        }

        let query_vector = match embedder.embed_query(query).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "Query embedding failed, returning no chunks");
                return Vec::new();
            }
        };

        if query_vector.len() != self.dimension || query_vector.iter().any(|x| !x.is_finite()) {
            tracing::warn!(
                expected = self.dimension,
                actual = query_vector.len(),
                "Query embedding unusable, returning no chunks"
            );
            return Vec::new();
        }

        self.nearest(&query_vector, k)
            .into_iter()
            .map(|(i, _)| self.chunks[i].clone())
            .collect()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let snapshot = IndexSnapshot {
            format_version: INDEX_FORMAT_VERSION,
            dimension: self.dimension,
            chunks: self.chunks.clone(),
            vectors: self.vectors.clone(),
        };
        serde_json::to_vec(&snapshot).context("Failed to serialize vector index")
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let snapshot: IndexSnapshot =
            serde_json::from_slice(bytes).context("Failed to parse vector index blob")?;

        if snapshot.format_version != INDEX_FORMAT_VERSION {
            anyhow::bail!(
                "Unsupported vector index format version: {}",
                snapshot.format_version
            );
        }

        if snapshot.vectors.is_empty() && snapshot.chunks.is_empty() {
            return Ok(Self::empty());
        }

        check_shape(&snapshot.chunks, &snapshot.vectors)
            .map_err(|reason| anyhow::anyhow!("Corrupt vector index blob: {}", reason))?;
        if snapshot.vectors[0].len() != snapshot.dimension {
            anyhow::bail!("Corrupt vector index blob: dimension does not match vectors");
        }

        Ok(Self {
            chunks: snapshot.chunks,
            vectors: snapshot.vectors,
            dimension: snapshot.dimension,
        })
    }
}

fn check_shape(chunks: &[String], vectors: &[Vec<f32>]) -> std::result::Result<(), &'static str> {
    if vectors.len() != chunks.len() {
        return Err("vector count does not match chunk count");
    }
    let Some(first) = vectors.first() else {
        return Err("no vectors");
    };
    if first.is_empty() {
        return Err("zero-dimension vectors");
    }
    if vectors.iter().any(|v| v.len() != first.len()) {
        return Err("vectors have different dimensions");
    }
    if vectors.iter().flatten().any(|x| !x.is_finite()) {
        return Err("non-finite vector component");
    }
    Ok(())
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Letter-frequency embedding, so texts sharing letters land close together
    struct LetterEmbedder;

    fn letter_vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; 26];
        for c in text.to_ascii_lowercase().chars().filter(char::is_ascii_lowercase) {
            v[(c as u8 - b'a') as usize] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1.0);
        v.iter().map(|x| x / norm).collect()
    }

    #[async_trait]
    impl Embedder for LetterEmbedder {
        async fn embed(&self, texts: &[String], _task: EmbeddingTask) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| letter_vector(t)).collect())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _texts: &[String], _task: EmbeddingTask) -> Result<Vec<Vec<f32>>> {
            anyhow::bail!("service unavailable")
        }
    }

    /// Embeds documents but drops the last vector of every batch
    struct ShortBatchEmbedder;

    #[async_trait]
    impl Embedder for ShortBatchEmbedder {
        async fn embed(&self, texts: &[String], _task: EmbeddingTask) -> Result<Vec<Vec<f32>>> {
            let mut vectors: Vec<Vec<f32>> = texts.iter().map(|t| letter_vector(t)).collect();
            vectors.pop();
            Ok(vectors)
        }
    }

    /// Embeds documents but fails on queries
    struct DocumentsOnlyEmbedder;

    #[async_trait]
    impl Embedder for DocumentsOnlyEmbedder {
        async fn embed(&self, texts: &[String], task: EmbeddingTask) -> Result<Vec<Vec<f32>>> {
            match task {
                EmbeddingTask::RetrievalDocument => Ok(texts.iter().map(|t| letter_vector(t)).collect()),
                EmbeddingTask::RetrievalQuery => anyhow::bail!("quota exceeded"),
            }
        }
    }

    fn chunks(texts: &[&str]) -> Vec<ingest::Chunk> {
        let source = texts.concat();
        let mut offset = 0;
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let chunk = ingest::Chunk::new(i, &source, (offset, offset + t.len()));
                offset += t.len();
                chunk
            })
            .collect()
    }

    #[tokio::test]
    async fn test_search_ranks_by_distance() {
        let index = VectorIndex::build(&chunks(&["aaaa", "bbbb", "abab"]), &LetterEmbedder)
            .await
            .unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(index.dimension(), 26);

        let results = index.search(&LetterEmbedder, "bbb", 2).await;
        assert_eq!(results, vec!["bbbb".to_string(), "abab".to_string()]);
    }

    #[tokio::test]
    async fn test_k_larger_than_index() {
        let index = VectorIndex::build(&chunks(&["rent", "deposit"]), &LetterEmbedder)
            .await
            .unwrap();

        let results = index.search(&LetterEmbedder, "rent", 10).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0], "rent");
    }

    #[tokio::test]
    async fn test_k_zero() {
        let index = VectorIndex::build(&chunks(&["rent"]), &LetterEmbedder).await.unwrap();
        assert!(index.search(&LetterEmbedder, "rent", 0).await.is_empty());
    }

    #[tokio::test]
    async fn test_build_fails_on_embedding_error() {
        let result = VectorIndex::build(&chunks(&["rent"]), &FailingEmbedder).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_short_batch_gives_empty_index() {
        let index = VectorIndex::build(&chunks(&["rent", "deposit"]), &ShortBatchEmbedder)
            .await
            .unwrap();

        assert!(index.is_empty());
        assert!(index.search(&LetterEmbedder, "rent", 3).await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_index_search() {
        let index = VectorIndex::empty();
        assert!(index.search(&LetterEmbedder, "anything", 3).await.is_empty());

        let index = VectorIndex::build(&[], &FailingEmbedder).await.unwrap();
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_query_failure_gives_no_results() {
        let index = VectorIndex::build(&chunks(&["rent"]), &DocumentsOnlyEmbedder)
            .await
            .unwrap();
        assert!(index.search(&DocumentsOnlyEmbedder, "rent", 3).await.is_empty());
    }

    #[test]
    fn test_ragged_vectors_give_empty_index() {
        let index = VectorIndex::from_embeddings(
            vec!["a".to_string(), "b".to_string()],
            vec![vec![1.0, 0.0], vec![1.0]],
        );
        assert!(index.is_empty());

        let index = VectorIndex::from_embeddings(vec!["a".to_string()], vec![vec![]]);
        assert!(index.is_empty());
    }

    #[test]
    fn test_ties_keep_chunk_order() {
        let index = VectorIndex::from_embeddings(
            vec!["first".to_string(), "second".to_string(), "third".to_string()],
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0]],
        );
        let nearest = index.nearest(&[1.0, 0.0], 3);
        assert_eq!(nearest.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![0, 2, 1]);
    }

    #[tokio::test]
    async fn test_round_trip_preserves_search() {
        let index = VectorIndex::build(
            &chunks(&["the tenant pays", "the landlord repairs", "deposit of $100"]),
            &LetterEmbedder,
        )
        .await
        .unwrap();

        let restored = VectorIndex::from_bytes(&index.to_bytes().unwrap()).unwrap();
        assert_eq!(restored, index);

        for query in ["who pays", "repairs", "deposit amount"] {
            assert_eq!(
                restored.search(&LetterEmbedder, query, 2).await,
                index.search(&LetterEmbedder, query, 2).await
            );
        }
    }

    #[test]
    fn test_empty_round_trip() {
        let restored = VectorIndex::from_bytes(&VectorIndex::empty().to_bytes().unwrap()).unwrap();
        assert!(restored.is_empty());
    }

    #[test]
    fn test_from_bytes_rejects_bad_blobs() {
        let wrong_version = r#"{"format_version": 2, "dimension": 1, "chunks": ["a"], "vectors": [[1.0]]}"#;
        assert!(VectorIndex::from_bytes(wrong_version.as_bytes()).is_err());

        let mismatched = r#"{"format_version": 1, "dimension": 1, "chunks": ["a", "b"], "vectors": [[1.0]]}"#;
        assert!(VectorIndex::from_bytes(mismatched.as_bytes()).is_err());

        let wrong_dimension = r#"{"format_version": 1, "dimension": 3, "chunks": ["a"], "vectors": [[1.0]]}"#;
        assert!(VectorIndex::from_bytes(wrong_dimension.as_bytes()).is_err());

        assert!(VectorIndex::from_bytes(b"\x80\x04pickle").is_err());
    }
}
