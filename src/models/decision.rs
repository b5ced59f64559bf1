//! Scoring decision

use serde::Serialize;

use super::artifact::ModelVersion;

/// Output of one scoring call. Built fresh per request, never cached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringDecision {
    pub fraud_probability: f64,
    pub fraud_label: bool,
    pub threshold: f64,
    pub model_version: ModelVersion,
}
