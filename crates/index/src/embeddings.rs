use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What a text is being embedded for. Providers that support asymmetric
/// encoding use different representations for documents and queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingTask {
    RetrievalDocument,
    RetrievalQuery,
}

impl EmbeddingTask {
    fn gemini_task_type(&self) -> &'static str {
        match self {
            EmbeddingTask::RetrievalDocument => "RETRIEVAL_DOCUMENT",
            EmbeddingTask::RetrievalQuery => "RETRIEVAL_QUERY",
        }
    }

    fn ollama_prefix(&self) -> &'static str {
        match self {
            EmbeddingTask::RetrievalDocument => "search_document: ",
            EmbeddingTask::RetrievalQuery => "search_query: ",
        }
    }
}

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed every text, one vector per input, in input order.
    async fn embed(&self, texts: &[String], task: EmbeddingTask) -> Result<Vec<Vec<f32>>>;

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embed(&[query.to_string()], EmbeddingTask::RetrievalQuery)
            .await?
            .into_iter()
            .next()
            .context("Embedding service returned no vector for the query")
    }
}

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

// batchEmbedContents accepts at most this many requests per call
const GEMINI_BATCH_LIMIT: usize = 100;

#[derive(Clone)]
pub struct GeminiEmbeddingClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct BatchEmbedRequest {
    requests: Vec<EmbedContentRequest>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest {
    model: String,
    content: EmbedContent,
    task_type: &'static str,
}

#[derive(Serialize)]
struct EmbedContent {
    parts: Vec<EmbedPart>,
}

#[derive(Serialize)]
struct EmbedPart {
    text: String,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

impl GeminiEmbeddingClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            base_url: GEMINI_API_URL.to_string(),
            api_key,
            model,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn build_request(&self, texts: &[String], task: EmbeddingTask) -> BatchEmbedRequest {
        BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: format!("models/{}", self.model),
                    content: EmbedContent {
                        parts: vec![EmbedPart { text: text.clone() }],
                    },
                    task_type: task.gemini_task_type(),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl Embedder for GeminiEmbeddingClient {
    async fn embed(&self, texts: &[String], task: EmbeddingTask) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/models/{}:batchEmbedContents", self.base_url, self.model);
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(GEMINI_BATCH_LIMIT) {
            let request = self.build_request(batch, task);

            let response = self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&request)
                .send()
                .await
                .context("Failed to send embedding request")?;

            if !response.status().is_success() {
                anyhow::bail!("Embedding request failed: {}", response.status());
            }

            let embedding_response: BatchEmbedResponse = response
                .json()
                .await
                .context("Failed to parse embedding response")?;

            vectors.extend(embedding_response.embeddings.into_iter().map(|e| e.values));
        }

        Ok(vectors)
    }
}

#[derive(Clone)]
pub struct OllamaEmbeddingClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaEmbeddingRequest {
    model: String,
    prompt: String,
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbeddingClient {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url,
            model,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl Embedder for OllamaEmbeddingClient {
    async fn embed(&self, texts: &[String], task: EmbeddingTask) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let mut vectors = Vec::with_capacity(texts.len());

        for text in texts {
            let request = OllamaEmbeddingRequest {
                model: self.model.clone(),
                prompt: format!("{}{}", task.ollama_prefix(), text),
            };

            let response = self.client
                .post(&url)
                .json(&request)
                .send()
                .await
                .context("Failed to send embedding request")?;

            if !response.status().is_success() {
                anyhow::bail!("Embedding request failed: {}", response.status());
            }

            let embedding_response: OllamaEmbeddingResponse = response
                .json()
                .await
                .context("Failed to parse embedding response")?;

            vectors.push(embedding_response.embedding);
        }

        Ok(vectors)
    }
}
