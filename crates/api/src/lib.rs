pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod retry;
pub mod store;
pub mod translate;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{DefaultBodyLimit, Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use extract::{DocumentAnalyzer, GeminiClient, GraphExtractor, LanguageModel, OllamaClient};
use index::{Embedder, GeminiEmbeddingClient, OllamaEmbeddingClient};
use query::QaEngine;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use config::{AppConfig, LlmProvider, StoreBackend};
use metrics::Metrics;
use retry::RetryPolicy;
use store::{FileSessionStore, InMemorySessionStore, SessionStore};
use translate::{GoogleTranslateClient, Translator};

// Extracted contracts run to hundreds of kilobytes
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub struct AppState {
    pub config: AppConfig,
    pub analyzer: DocumentAnalyzer,
    pub extractor: GraphExtractor,
    pub embedder: Arc<dyn Embedder>,
    pub qa: QaEngine,
    pub translator: Arc<dyn Translator>,
    pub store: Arc<dyn SessionStore>,
    pub retry: RetryPolicy,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        llm: Arc<dyn LanguageModel>,
        embedder: Arc<dyn Embedder>,
        translator: Arc<dyn Translator>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let max_input_chars = config.retrieval.max_input_chars;

        Self {
            analyzer: DocumentAnalyzer::new(llm.clone(), max_input_chars),
            extractor: GraphExtractor::new(llm.clone(), max_input_chars),
            qa: QaEngine::new(llm, embedder.clone(), config.retrieval.top_k),
            embedder,
            translator,
            store,
            retry: RetryPolicy::from_config(&config.retry),
            metrics: Metrics::new(),
            config,
        }
    }

    /// Wire up the configured model provider, translation client and session store
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.server.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        let (llm, embedder): (Arc<dyn LanguageModel>, Arc<dyn Embedder>) = match config.llm.provider {
            LlmProvider::Gemini => {
                let api_key = config.llm.gemini_api_key
                    .clone()
                    .context("GEMINI_API_KEY is required when LLM_PROVIDER is gemini")?;
                (
                    Arc::new(
                        GeminiClient::new(api_key.clone(), config.llm.gemini_model.clone())
                            .with_http_client(http.clone()),
                    ),
                    Arc::new(
                        GeminiEmbeddingClient::new(api_key, config.llm.gemini_embedding_model.clone())
                            .with_http_client(http.clone()),
                    ),
                )
            }
            LlmProvider::Ollama => (
                Arc::new(
                    OllamaClient::new(config.llm.ollama_url.clone(), config.llm.ollama_model.clone())
                        .with_http_client(http.clone()),
                ),
                Arc::new(
                    OllamaEmbeddingClient::new(
                        config.llm.ollama_url.clone(),
                        config.llm.ollama_embedding_model.clone(),
                    )
                    .with_http_client(http.clone()),
                ),
            ),
        };

        let translator: Arc<dyn Translator> = Arc::new(
            GoogleTranslateClient::new(config.translate.api_key.clone()).with_http_client(http),
        );

        let store: Arc<dyn SessionStore> = match config.store.backend {
            StoreBackend::Memory => Arc::new(InMemorySessionStore::new()),
            StoreBackend::File => Arc::new(FileSessionStore::new(config.store.data_dir.clone())),
        };

        Ok(Self::new(config, llm, embedder, translator, store))
    }
}

async fn track_requests(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    state.metrics.record_request(response.status().is_success());
    response
}

pub fn router(state: Arc<AppState>) -> Router {
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/process-document", post(handlers::process_document))
        .route("/qa", post(handlers::question_answer))
        .route("/translate", post(handlers::translate_text))
        .route("/export", post(handlers::export_report))
        .route("/metrics", get(handlers::get_metrics))
        .layer(middleware::from_fn_with_state(state.clone(), track_requests))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use index::EmbeddingTask;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    const CONTRACT: &str = "Party A shall pay Party B $100 on January 1.";

    /// Answers every prompt kind the service sends with a fixed, plausible reply
    #[derive(Default)]
    struct ScriptedModel {
        fail_analysis: bool,
        broken_extraction: bool,
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
            if prompt.contains("query routing specialist") {
                let route = if prompt.contains("who owes") { "graph" } else { "vector" };
                return Ok(route.to_string());
            }
            if prompt.contains("knowledge graph extractor") {
                if self.broken_extraction {
                    return Ok("Sure! The entities are Party A and Party B.".to_string());
                }
                return Ok(r#"{"entities": ["Party A", "Party B", "$100"], "relationships": [["Party A", "PAYS_AMOUNT", "$100"]]}"#.to_string());
            }
            if prompt.contains("Analyze the following legal document") {
                if self.fail_analysis {
                    anyhow::bail!("quota exceeded");
                }
                return Ok(r#"```json
{"simplified_text": "Party A pays Party B **$100**.", "risks": [{"risk_level": "Medium", "description": "No late payment terms"}], "document_health_score": 72}
```"#.to_string());
            }
            let context = prompt
                .split("CONTEXT:\n---\n")
                .nth(1)
                .and_then(|rest| rest.split("\n---\n\nQUESTION").next())
                .unwrap_or_default();
            Ok(format!("According to the document: {}", context))
        }
    }

    struct LetterEmbedder;

    #[async_trait]
    impl Embedder for LetterEmbedder {
        async fn embed(&self, texts: &[String], _task: EmbeddingTask) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32; 36];
                    for c in t.to_ascii_lowercase().chars() {
                        if let Some(d) = c.to_digit(36) {
                            v[d as usize] += 1.0;
                        }
                    }
                    v
                })
                .collect())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _texts: &[String], _task: EmbeddingTask) -> anyhow::Result<Vec<Vec<f32>>> {
            anyhow::bail!("connection refused")
        }
    }

    struct EchoTranslator;

    #[async_trait]
    impl Translator for EchoTranslator {
        async fn translate(&self, text: &str, target_language: &str) -> anyhow::Result<String> {
            Ok(format!("[{}] {}", target_language, text))
        }
    }

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.retry.max_retries = 1;
        config.retry.initial_backoff_ms = 1;
        config.retry.max_backoff_ms = 1;
        config
    }

    fn state_with(model: ScriptedModel, embedder: Arc<dyn Embedder>) -> Arc<AppState> {
        Arc::new(AppState::new(
            test_config(),
            Arc::new(model),
            embedder,
            Arc::new(EchoTranslator),
            Arc::new(InMemorySessionStore::new()),
        ))
    }

    fn test_state(fail_analysis: bool) -> Arc<AppState> {
        state_with(
            ScriptedModel {
                fail_analysis,
                ..Default::default()
            },
            Arc::new(LetterEmbedder),
        )
    }

    async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn ingest(app: &Router) -> String {
        let (status, body) = post_json(app, "/process-document", json!({ "text": CONTRACT })).await;
        assert_eq!(status, StatusCode::OK);
        body["session_id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_process_document() {
        let state = test_state(false);
        let app = router(state.clone());

        let (status, body) = post_json(&app, "/process-document", json!({ "text": CONTRACT })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["original_text"], CONTRACT);
        assert_eq!(body["document_health_score"], 72);
        assert_eq!(body["risks"][0]["risk_level"], "Medium");

        let session_id = body["session_id"].as_str().unwrap();
        let session = state.store.get(session_id).await.unwrap().unwrap();
        assert_eq!(session.original_text, CONTRACT);

        let graph = extract::KnowledgeGraph::from_bytes(&session.knowledge_graph).unwrap();
        assert!(graph.contains("$100"));
        assert_eq!(graph.edge_count(), 1);

        let vector_index = index::VectorIndex::from_bytes(&session.vector_index).unwrap();
        assert_eq!(vector_index.chunks(), [CONTRACT.to_string()]);
    }

    #[tokio::test]
    async fn test_vector_question_finds_amount() {
        let app = router(test_state(false));
        let session_id = ingest(&app).await;

        let (status, body) = post_json(
            &app,
            "/qa",
            json!({ "session_id": session_id, "question": "What is the payment amount?" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["route"], "vector");
        assert!(body["answer"].as_str().unwrap().contains("$100"));
        assert_eq!(body["sources"][0], CONTRACT);
    }

    #[tokio::test]
    async fn test_graph_question_lists_entities() {
        let app = router(test_state(false));
        let session_id = ingest(&app).await;

        let (status, body) = post_json(
            &app,
            "/qa",
            json!({ "session_id": session_id, "question": "who owes $100" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["route"], "graph");
        assert_eq!(body["sources"], json!(["$100"]));
        assert!(body["answer"].as_str().unwrap().contains("$100"));
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let app = router(test_state(false));

        let (status, body) = post_json(
            &app,
            "/qa",
            json!({ "session_id": "does-not-exist", "question": "What is owed?" }),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("does-not-exist"));
    }

    #[tokio::test]
    async fn test_rejects_blank_input() {
        let state = test_state(false);
        let app = router(state.clone());

        let (status, _) = post_json(&app, "/process-document", json!({ "text": "  \n\t " })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(state.store.len().await.unwrap(), 0);

        let session_id = ingest(&app).await;
        let (status, _) =
            post_json(&app, "/qa", json!({ "session_id": session_id, "question": " " })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_analysis_failure_stores_nothing() {
        let state = test_state(true);
        let app = router(state.clone());

        let (status, body) = post_json(&app, "/process-document", json!({ "text": CONTRACT })).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("quota exceeded"));
        assert_eq!(state.store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_stores_nothing() {
        let state = state_with(ScriptedModel::default(), Arc::new(FailingEmbedder));
        let app = router(state.clone());

        let (status, body) = post_json(&app, "/process-document", json!({ "text": CONTRACT })).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("connection refused"));
        assert_eq!(state.store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_extraction_failure_keeps_session_with_empty_graph() {
        let model = ScriptedModel {
            broken_extraction: true,
            ..Default::default()
        };
        let state = state_with(model, Arc::new(LetterEmbedder));
        let app = router(state.clone());
        let session_id = ingest(&app).await;

        let session = state.store.get(&session_id).await.unwrap().unwrap();
        let graph = extract::KnowledgeGraph::from_bytes(&session.knowledge_graph).unwrap();
        assert!(graph.is_empty());

        let (status, body) = post_json(
            &app,
            "/qa",
            json!({ "session_id": session_id, "question": "who owes $100" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["route"], "graph");
        assert_eq!(body["answer"], query::NO_ENTITIES_ANSWER);
        assert_eq!(body["sources"], json!([]));
    }

    /// Stands in for the Gemini and Cloud Translation endpoints
    async fn fake_google(uri: axum::http::Uri, headers: axum::http::HeaderMap, body: String) -> axum::Json<Value> {
        let path = uri.path();
        let request: Value = serde_json::from_str(&body).unwrap_or(Value::Null);

        if path.ends_with(":generateContent") {
            assert_eq!(headers["x-goog-api-key"], "gemini-key");
            return axum::Json(json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": "graph"}]}}]
            }));
        }
        if path.ends_with(":batchEmbedContents") {
            let embeddings: Vec<Value> = request["requests"]
                .as_array()
                .map(|r| r.iter().map(|_| json!({"values": [0.5, 1.0]})).collect())
                .unwrap_or_default();
            return axum::Json(json!({ "embeddings": embeddings }));
        }
        if path == "/language/translate/v2" && uri.query() == Some("key=translate-key") {
            let text = format!("[{}] {}", request["target"].as_str().unwrap_or(""), request["q"].as_str().unwrap_or(""));
            return axum::Json(json!({"data": {"translations": [{"translatedText": text}]}}));
        }
        axum::Json(json!({}))
    }

    #[tokio::test]
    async fn test_google_clients_against_local_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, Router::new().fallback(fake_google)).await.unwrap();
        });
        let http = reqwest::Client::builder().no_proxy().build().unwrap();

        let llm = GeminiClient::new("gemini-key".to_string(), "gemini-test".to_string())
            .with_base_url(format!("{}/v1beta", base_url))
            .with_http_client(http.clone());
        assert_eq!(llm.generate("route this").await.unwrap(), "graph");

        let embedder = GeminiEmbeddingClient::new("gemini-key".to_string(), "embedding-test".to_string())
            .with_base_url(format!("{}/v1beta", base_url))
            .with_http_client(http.clone());
        let vectors = embedder
            .embed(&["a".to_string(), "b".to_string()], EmbeddingTask::RetrievalDocument)
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![0.5, 1.0], vec![0.5, 1.0]]);

        let translator = GoogleTranslateClient::new(Some("translate-key".to_string()))
            .with_base_url(base_url)
            .with_http_client(http);
        assert_eq!(translator.translate("Hello", "es").await.unwrap(), "[es] Hello");
    }

    #[tokio::test]
    async fn test_translate() {
        let app = router(test_state(false));

        let (status, body) = post_json(
            &app,
            "/translate",
            json!({ "text": "Party A pays", "target_language": "es" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["translated_text"], "[es] Party A pays");

        let (status, _) =
            post_json(&app, "/translate", json!({ "text": "Party A pays", "target_language": "" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_export_report() {
        let app = router(test_state(false));
        let analysis = json!({
            "simplified_text": "Party A pays Party B.",
            "risks": [{"risk_level": "High", "description": "Unlimited liability"}],
            "document_health_score": 40
        });

        let request = Request::builder()
            .method("POST")
            .uri("/export")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(analysis.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"Analysis_Report.md\""
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let report = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(report.contains("High Risk:** Unlimited liability"));
        assert!(report.contains("40/100"));
    }

    #[tokio::test]
    async fn test_health_and_metrics() {
        let app = router(test_state(false));
        ingest(&app).await;

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let health: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(health["sessions"], 1);

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let metrics: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(metrics["documents_ingested"], 1);
        assert_eq!(metrics["chunks_indexed"], 1);
        assert_eq!(metrics["total_requests"], 2);
    }
}
