//! Request/response wire types for the transaction endpoints

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::{ModelVersion, ScoringDecision};
use crate::logic::validation::{NormalizedTransaction, ValidationErrorItem};

/// Caller-supplied `request_id`, or a fresh one
pub fn request_id(envelope: &Value) -> String {
    envelope
        .get("request_id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub request_id: String,
    pub is_valid: bool,
    pub normalized_transaction: Option<NormalizedTransaction>,
    pub validation_errors: Vec<ValidationErrorItem>,
}

impl ValidateResponse {
    pub fn accepted(request_id: String, tx: NormalizedTransaction) -> Self {
        Self {
            request_id,
            is_valid: true,
            normalized_transaction: Some(tx),
            validation_errors: Vec::new(),
        }
    }

    pub fn rejected(request_id: String, errors: Vec<ValidationErrorItem>) -> Self {
        Self {
            request_id,
            is_valid: false,
            normalized_transaction: None,
            validation_errors: errors,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ScoreResponse {
    pub request_id: String,
    pub fraud_probability: f64,
    pub fraud_label: bool,
    pub decision_threshold: f64,
    pub model_version: ModelVersion,
}

impl ScoreResponse {
    pub fn new(request_id: String, decision: ScoringDecision) -> Self {
        Self {
            request_id,
            fraud_probability: (decision.fraud_probability * 1e6).round() / 1e6,
            fraud_label: decision.fraud_label,
            decision_threshold: decision.threshold,
            model_version: decision.model_version,
        }
    }
}
