use axum::{
    Json,
    extract::State,
    http::header,
    response::IntoResponse,
};
use extract::DocumentAnalysis;
use query::{QaAnswer, StoredIndexes};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::AppState;
use crate::error::ApiError;
use crate::metrics::{MetricsSnapshot, TimedOperation};
use crate::pipeline;
use crate::report;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    sessions: usize,
}

#[derive(Deserialize)]
pub struct ProcessRequest {
    text: String,
}

#[derive(Serialize)]
pub struct ProcessResponse {
    session_id: String,
    original_text: String,
    #[serde(flatten)]
    analysis: DocumentAnalysis,
}

#[derive(Deserialize)]
pub struct QaRequest {
    session_id: String,
    question: String,
}

#[derive(Deserialize)]
pub struct TranslationRequest {
    text: String,
    target_language: String,
}

#[derive(Serialize)]
pub struct TranslationResponse {
    translated_text: String,
}

pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HealthResponse>, ApiError> {
    let sessions = state.store.len().await.map_err(ApiError::internal)?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        sessions,
    }))
}

pub async fn process_document(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProcessRequest>,
) -> Result<Json<ProcessResponse>, ApiError> {
    let outcome = pipeline::ingest_document(&state, &req.text).await?;

    Ok(Json(ProcessResponse {
        session_id: outcome.session_id,
        original_text: req.text,
        analysis: outcome.analysis,
    }))
}

pub async fn question_answer(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QaRequest>,
) -> Result<Json<QaAnswer>, ApiError> {
    if req.question.trim().is_empty() {
        return Err(ApiError::BadRequest("question must not be empty".to_string()));
    }

    let timer = TimedOperation::start();
    let session = state.store
        .get(&req.session_id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::NotFound(req.session_id.clone()))?;

    let stored = StoredIndexes {
        vector_index: &session.vector_index,
        knowledge_graph: &session.knowledge_graph,
    };
    let answer = state.qa.answer(&req.question, stored).await?;

    state.metrics.record_answer(timer.elapsed(), answer.route);
    Ok(Json(answer))
}

pub async fn translate_text(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TranslationRequest>,
) -> Result<Json<TranslationResponse>, ApiError> {
    if req.text.trim().is_empty() {
        return Err(ApiError::BadRequest("text must not be empty".to_string()));
    }
    if req.target_language.trim().is_empty() {
        return Err(ApiError::BadRequest("target_language must not be empty".to_string()));
    }

    let translated_text = state.translator
        .translate(&req.text, req.target_language.trim())
        .await
        .map_err(ApiError::upstream)?;

    state.metrics.record_translation();
    Ok(Json(TranslationResponse { translated_text }))
}

pub async fn export_report(
    State(state): State<Arc<AppState>>,
    Json(analysis): Json<DocumentAnalysis>,
) -> impl IntoResponse {
    let body = report::render_markdown(&analysis);
    state.metrics.record_export();

    (
        [
            (header::CONTENT_TYPE, report::REPORT_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", report::REPORT_FILENAME),
            ),
        ],
        body,
    )
}

pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
