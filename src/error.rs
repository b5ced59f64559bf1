//! Error handling

use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use serde_json::json;

use crate::logic::cache::LoadError;
use crate::logic::scoring::ScoringError;
use crate::logic::validation::RejectionError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    // Request errors
    InvalidJson,
    Rejected(RejectionError),

    // Model errors
    ModelUnavailable(LoadError),
    Scoring(ScoringError),
}

impl AppError {
    /// Attach the request id so the error body can echo it
    pub fn for_request(self, request_id: impl Into<String>) -> RequestFailure {
        RequestFailure {
            request_id: Some(request_id.into()),
            error: self,
        }
    }

    fn body(&self, request_id: Option<&str>) -> (StatusCode, Json<serde_json::Value>) {
        let (status, kind, field, error_message) = match self {
            AppError::InvalidJson => (StatusCode::BAD_REQUEST, "invalid_json", None, "Invalid JSON body".to_string()),
            AppError::Rejected(e) => (StatusCode::BAD_REQUEST, e.kind(), Some(e.field()), e.to_string()),
            AppError::Scoring(e) => {
                tracing::warn!("Scoring error: {}", e);
                (StatusCode::UNPROCESSABLE_ENTITY, e.kind(), e.field(), e.to_string())
            }
            AppError::ModelUnavailable(e) if e.is_retryable() => {
                tracing::warn!("Model unavailable: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, e.kind(), None, "Model temporarily unavailable".to_string())
            }
            AppError::ModelUnavailable(e) => {
                tracing::error!("Bad model deployment: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.kind(), None, "Model artifact is invalid".to_string())
            }
        };

        let mut body = json!({
            "error": error_message,
            "kind": kind,
            "field": field,
            "status": status.as_u16()
        });
        if let Some(id) = request_id {
            body["request_id"] = json!(id);
        }

        (status, Json(body))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.body(None).into_response()
    }
}

/// Error raised while serving an identified request
#[derive(Debug)]
pub struct RequestFailure {
    pub request_id: Option<String>,
    pub error: AppError,
}

impl IntoResponse for RequestFailure {
    fn into_response(self) -> Response {
        self.error.body(self.request_id.as_deref()).into_response()
    }
}

impl From<RejectionError> for AppError {
    fn from(err: RejectionError) -> Self {
        AppError::Rejected(err)
    }
}

impl From<LoadError> for AppError {
    fn from(err: LoadError) -> Self {
        AppError::ModelUnavailable(err)
    }
}

impl From<ScoringError> for AppError {
    fn from(err: ScoringError) -> Self {
        AppError::Scoring(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(_: serde_json::Error) -> Self {
        AppError::InvalidJson
    }
}
