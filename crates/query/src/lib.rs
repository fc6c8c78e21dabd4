pub mod graph_search;
pub mod prompt;
pub mod router;

pub use graph_search::{NO_ENTITIES_ANSWER, graph_answer, related_entities};
pub use router::{QueryRouter, Route};

use extract::{KnowledgeGraph, LanguageModel};
use index::{Embedder, VectorIndex};
use serde::Serialize;
use std::sync::Arc;

pub const NOT_FOUND_ANSWER: &str = "The answer is not found in the provided document excerpts.";

#[derive(Debug, thiserror::Error)]
pub enum QaError {
    #[error("stored session data is unreadable: {0:#}")]
    CorruptSession(anyhow::Error),

    #[error("answer generation failed: {0:#}")]
    Upstream(anyhow::Error),
}

/// Serialized indexes of one session, decoded only for the route taken
#[derive(Debug, Clone, Copy)]
pub struct StoredIndexes<'a> {
    pub vector_index: &'a [u8],
    pub knowledge_graph: &'a [u8],
}

#[derive(Debug, Clone, Serialize)]
pub struct QaAnswer {
    pub answer: String,
    pub route: Route,
    /// Retrieved chunks (vector route) or matched entity names (graph route)
    pub sources: Vec<String>,
}

/// Routes a question and answers it from either the vector index or the
/// knowledge graph of a session.
pub struct QaEngine {
    router: QueryRouter,
    llm: Arc<dyn LanguageModel>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
}

impl QaEngine {
    pub fn new(llm: Arc<dyn LanguageModel>, embedder: Arc<dyn Embedder>, top_k: usize) -> Self {
        Self {
            router: QueryRouter::new(llm.clone()),
            llm,
            embedder,
            top_k,
        }
    }

    pub async fn answer(&self, question: &str, stored: StoredIndexes<'_>) -> Result<QaAnswer, QaError> {
        let route = self.router.route(question).await;
        tracing::info!(%route, "routing question");

        match route {
            Route::Vector => {
                let index = VectorIndex::from_bytes(stored.vector_index)
                    .map_err(QaError::CorruptSession)?;
                self.answer_from_index(&index, question).await
            }
            Route::Graph => {
                let graph = KnowledgeGraph::from_bytes(stored.knowledge_graph)
                    .map_err(QaError::CorruptSession)?;
                Ok(self.answer_from_graph(&graph, question))
            }
        }
    }

    pub async fn answer_from_index(&self, index: &VectorIndex, question: &str) -> Result<QaAnswer, QaError> {
        let chunks = index.search(self.embedder.as_ref(), question, self.top_k).await;
        tracing::debug!(retrieved = chunks.len(), "vector retrieval");

        if chunks.is_empty() {
            return Ok(QaAnswer {
                answer: NOT_FOUND_ANSWER.to_string(),
                route: Route::Vector,
                sources: chunks,
            });
        }

        let prompt = prompt::build_answer_prompt(question, &chunks);
        let answer = self.llm
            .generate(&prompt)
            .await
            .map_err(QaError::Upstream)?;

        Ok(QaAnswer {
            answer: answer.trim().to_string(),
            route: Route::Vector,
            sources: chunks,
        })
    }

    pub fn answer_from_graph(&self, graph: &KnowledgeGraph, question: &str) -> QaAnswer {
        let entities = related_entities(graph, question);
        tracing::debug!(matched = entities.len(), "graph lookup");

        QaAnswer {
            answer: graph_answer(&entities),
            route: Route::Graph,
            sources: entities.into_iter().map(str::to_string).collect(),
        }
    }
}
