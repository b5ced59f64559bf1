//! Scoring Engine
//!
//! Evaluates a logistic-regression artifact against a normalized
//! transaction. Deterministic and I/O free; the artifact comes from the
//! model cache.

#[cfg(test)]
mod tests;

use crate::logic::validation::{FeatureLookup, NormalizedTransaction};
use crate::models::{ModelArtifact, ScoringDecision};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoringError {
    #[error("feature {field} required by the model is {reason}")]
    FeatureMismatch { field: String, reason: &'static str },

    #[error("model output is undefined for this transaction (logit is NaN)")]
    UndefinedScore,
}

impl ScoringError {
    pub fn field(&self) -> Option<&str> {
        match self {
            ScoringError::FeatureMismatch { field, .. } => Some(field),
            ScoringError::UndefinedScore => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ScoringError::FeatureMismatch { .. } => "feature_mismatch",
            ScoringError::UndefinedScore => "undefined_score",
        }
    }
}

/// Score one transaction against one artifact
pub fn score(tx: &NormalizedTransaction, artifact: &ModelArtifact) -> Result<ScoringDecision, ScoringError> {
    let features = feature_vector(tx, artifact)?;

    let logit = artifact.intercept()
        + artifact
            .weights()
            .iter()
            .zip(&features)
            .map(|(w, x)| w * x)
            .sum::<f64>();

    // Opposing overflows (inf + -inf) leave no meaningful probability.
    // Infinite logits are fine: the sigmoid saturates to exactly 0 or 1.
    if logit.is_nan() {
        return Err(ScoringError::UndefinedScore);
    }

    let probability = sigmoid(logit).clamp(0.0, 1.0);

    Ok(ScoringDecision {
        fraud_probability: probability,
        fraud_label: probability >= artifact.threshold(),
        threshold: artifact.threshold(),
        model_version: artifact.version().clone(),
    })
}

/// Build the input vector in the artifact's feature order
pub fn feature_vector(tx: &NormalizedTransaction, artifact: &ModelArtifact) -> Result<Vec<f64>, ScoringError> {
    let mut vector = Vec::with_capacity(artifact.feature_order().len());

    for (i, name) in artifact.feature_order().iter().enumerate() {
        let raw = match tx.feature(name) {
            FeatureLookup::Value(v) => v,
            FeatureLookup::Missing => {
                return Err(ScoringError::FeatureMismatch {
                    field: name.clone(),
                    reason: "missing from the transaction",
                })
            }
            FeatureLookup::NotNumeric => {
                return Err(ScoringError::FeatureMismatch {
                    field: name.clone(),
                    reason: "not numeric",
                })
            }
        };

        let value = match artifact.scaler() {
            Some(scaler) => standardize(raw, scaler.mean[i], scaler.scale[i]),
            None => raw,
        };
        vector.push(value);
    }

    Ok(vector)
}

/// Logistic function, split by sign so `exp` never overflows
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}

fn standardize(value: f64, mean: f64, scale: f64) -> f64 {
    if scale == 0.0 {
        return 0.0;
    }
    (value - mean) / scale
}
