use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Document contains no text")]
    EmptyInput,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Upstream model failure: {0}")]
    Upstream(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn upstream(err: anyhow::Error) -> Self {
        ApiError::Upstream(format!("{:#}", err))
    }

    pub fn internal(err: anyhow::Error) -> Self {
        ApiError::Internal(format!("{:#}", err))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::EmptyInput | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<query::QaError> for ApiError {
    fn from(err: query::QaError) -> Self {
        match err {
            query::QaError::CorruptSession(_) => ApiError::Internal(err.to_string()),
            query::QaError::Upstream(_) => ApiError::Upstream(err.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}
