use extract::DocumentAnalysis;
use index::VectorIndex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::AppState;
use crate::error::ApiError;
use crate::metrics::TimedOperation;
use crate::retry::ModelCall;
use crate::store::{SessionRecord, new_session_id};

#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub session_id: String,
    pub analysis: DocumentAnalysis,
}

/// Analyze a document, build both indexes and persist them as a new session.
///
/// Analysis, index build and graph extraction run concurrently. Analysis and
/// embedding transport failures fail the whole ingestion; graph extraction
/// degrades to an empty graph. Nothing is stored unless all three finish.
pub async fn ingest_document(state: &AppState, text: &str) -> Result<IngestOutcome, ApiError> {
    if text.trim().is_empty() {
        return Err(ApiError::EmptyInput);
    }

    let timer = TimedOperation::start();
    let chunks = ingest::chunk_document(text, state.config.chunker_config());
    tracing::info!(chars = text.chars().count(), chunks = chunks.len(), "ingesting document");

    let analyzer = &state.analyzer;
    let embedder = state.embedder.as_ref();
    let chunks = &chunks;

    let (analysis, vector_index, graph) = tokio::join!(
        state.retry.retry(ModelCall::DocumentAnalysis, move || analyzer.analyze(text)),
        state.retry.retry(ModelCall::ChunkEmbedding, move || VectorIndex::build(chunks, embedder)),
        state.extractor.extract(text),
    );

    let analysis = analysis.map_err(ApiError::upstream)?;
    let vector_index = vector_index.map_err(ApiError::upstream)?;

    let record = SessionRecord {
        id: new_session_id(),
        original_text: text.to_string(),
        analysis: analysis.clone(),
        vector_index: vector_index.to_bytes().map_err(ApiError::internal)?,
        knowledge_graph: graph.to_bytes().map_err(ApiError::internal)?,
        created_at_unix: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default(),
    };
    let session_id = record.id.clone();

    state.store.create(record).await.map_err(ApiError::internal)?;

    state.metrics.record_ingest(timer.elapsed(), vector_index.len(), graph.node_count());
    tracing::info!(
        session_id = %session_id,
        chunks_indexed = vector_index.len(),
        graph_nodes = graph.node_count(),
        graph_edges = graph.edge_count(),
        health_score = analysis.health_score,
        "session created"
    );

    Ok(IngestOutcome {
        session_id,
        analysis,
    })
}
