pub mod graph;
pub mod json;
pub mod llm;
pub mod prompt;
pub mod schema;

pub use graph::{EdgeRecord, KnowledgeGraph};
pub use json::{parse_model_json, strip_code_fences, truncate_chars};
pub use llm::{GeminiClient, LanguageModel, OllamaClient};
pub use schema::{DocumentAnalysis, Risk, RiskLevel};

use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;

/// Longest document prefix sent to the model for analysis or extraction
pub const DEFAULT_MAX_INPUT_CHARS: usize = 15_000;

/// Builds a knowledge graph from a document with one model call. Never fails:
/// any call or parse error yields an empty graph.
pub struct GraphExtractor {
    llm: Arc<dyn LanguageModel>,
    max_input_chars: usize,
}

impl GraphExtractor {
    pub fn new(llm: Arc<dyn LanguageModel>, max_input_chars: usize) -> Self {
        Self {
            llm,
            max_input_chars,
        }
    }

    pub async fn extract(&self, text: &str) -> KnowledgeGraph {
        match self.try_extract(text).await {
            Ok(graph) => {
                tracing::info!(
                    nodes = graph.node_count(),
                    edges = graph.edge_count(),
                    "built knowledge graph"
                );
                graph
            }
            Err(e) => {
                tracing::warn!(error = %e, "Knowledge graph extraction failed, using empty graph");
                KnowledgeGraph::new()
            }
        }
    }

    async fn try_extract(&self, text: &str) -> Result<KnowledgeGraph> {
        let prompt = prompt::build_extraction_prompt(truncate_chars(text, self.max_input_chars));

        let reply = self.llm
            .generate(&prompt)
            .await
            .context("Knowledge graph extraction call failed")?;

        let value: Value = parse_model_json(&reply)?;
        if !value.is_object() {
            anyhow::bail!("Extraction output is not a JSON object");
        }

        Ok(KnowledgeGraph::from_extraction(&value))
    }
}

/// Produces the plain-language summary, risk list and health score for a
/// document. Failures propagate: there is no useful default analysis.
pub struct DocumentAnalyzer {
    llm: Arc<dyn LanguageModel>,
    max_input_chars: usize,
}

impl DocumentAnalyzer {
    pub fn new(llm: Arc<dyn LanguageModel>, max_input_chars: usize) -> Self {
        Self {
            llm,
            max_input_chars,
        }
    }

    pub async fn analyze(&self, text: &str) -> Result<DocumentAnalysis> {
        let prompt = prompt::build_analysis_prompt(truncate_chars(text, self.max_input_chars));

        let reply = self.llm
            .generate(&prompt)
            .await
            .context("Document analysis call failed")?;

        parse_model_json(&reply).context("Failed to parse document analysis")
    }
}
