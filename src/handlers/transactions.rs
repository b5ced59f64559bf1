//! Transaction handlers

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use serde_json::Value;

use crate::logic::scoring;
use crate::logic::validation::{self, ValidationErrorItem};
use crate::models::{request_id, ScoreResponse, ScoringDecision, ValidateResponse};
use crate::error::RequestFailure;
use crate::{AppError, AppResult, AppState};

/// Validate a transaction and return its normalized form
pub async fn validate(
    State(state): State<AppState>,
    body: Bytes,
) -> (StatusCode, Json<ValidateResponse>) {
    let envelope: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => {
            let item = ValidationErrorItem {
                field: "request".to_string(),
                kind: "invalid_json",
                message: "Invalid JSON body".to_string(),
            };
            return (
                StatusCode::BAD_REQUEST,
                Json(ValidateResponse::rejected(request_id(&Value::Null), vec![item])),
            );
        }
    };
    let request_id = request_id(&envelope);

    let outcome = validation::transaction_payload(&envelope)
        .map_err(|e| vec![e])
        .and_then(|payload| validation::validate_all(payload, &state.schema));

    match outcome {
        Ok(tx) => {
            tracing::debug!(
                "Request {} valid (transaction {}, account {})",
                request_id,
                tx.transaction_id(),
                tx.account_id()
            );
            (StatusCode::OK, Json(ValidateResponse::accepted(request_id, tx)))
        }
        Err(errors) => {
            tracing::info!("Request {} rejected with {} validation error(s)", request_id, errors.len());
            let items = errors.iter().map(|e| e.to_item()).collect();
            (StatusCode::BAD_REQUEST, Json(ValidateResponse::rejected(request_id, items)))
        }
    }
}

/// Validate, then score a transaction against the active model.
///
/// Errors echo the request id like successful responses do.
pub async fn score(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ScoreResponse>, RequestFailure> {
    let envelope: Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::from(e).for_request(request_id(&Value::Null)))?;
    let request_id = request_id(&envelope);

    match score_envelope(&state, &envelope, &request_id).await {
        Ok(decision) => Ok(Json(ScoreResponse::new(request_id, decision))),
        Err(e) => Err(e.for_request(request_id)),
    }
}

async fn score_envelope(state: &AppState, envelope: &Value, request_id: &str) -> AppResult<ScoringDecision> {
    let payload = validation::transaction_payload(envelope)?;
    let tx = validation::validate(payload, &state.schema).map_err(|e| {
        tracing::info!("Request {} rejected: {}", request_id, e);
        AppError::from(e)
    })?;

    let entry = state.cache.get_active_artifact().await?;
    let decision = scoring::score(&tx, &entry.artifact)?;

    tracing::info!(
        "Request {} scored: amount={} category={} p={:.6} label={} model={}",
        request_id,
        tx.amount(),
        tx.merchant_category(),
        decision.fraud_probability,
        decision.fraud_label,
        decision.model_version
    );

    Ok(decision)
}
