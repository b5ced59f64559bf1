//! Model parameter artifact
//!
//! The trained linear model as exported by the training pipeline. An
//! artifact can only be obtained through [`ModelArtifact::from_slice`], so
//! every value of this type has passed the structural checks below.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Model version, echoed in every decision as it appeared in the artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelVersion {
    Number(serde_json::Number),
    Text(String),
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelVersion::Number(n) => write!(f, "{}", n),
            ModelVersion::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Standardization parameters exported alongside the weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Wire form of the artifact, before any invariant is checked
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ArtifactDocument {
    version: ModelVersion,
    feature_order: Vec<String>,
    weights: Vec<f64>,
    intercept: f64,
    threshold: f64,
    #[serde(default)]
    scaler: Option<FeatureScaler>,
    #[serde(default)]
    exported_at_utc: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("artifact is not valid JSON of the expected shape: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("{0}")]
    Invariant(String),
}

/// Validated model parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelArtifact {
    version: ModelVersion,
    feature_order: Vec<String>,
    weights: Vec<f64>,
    intercept: f64,
    threshold: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    scaler: Option<FeatureScaler>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exported_at_utc: Option<String>,
}

impl ModelArtifact {
    /// Parse and check an artifact from raw bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ArtifactError> {
        let doc: ArtifactDocument = serde_json::from_slice(bytes)?;
        Self::try_from_document(doc)
    }

    /// Parse and check an artifact from an already-decoded JSON value
    #[cfg(test)]
    pub fn from_value(value: serde_json::Value) -> Result<Self, ArtifactError> {
        let doc: ArtifactDocument = serde_json::from_value(value)?;
        Self::try_from_document(doc)
    }

    fn try_from_document(doc: ArtifactDocument) -> Result<Self, ArtifactError> {
        if doc.feature_order.is_empty() {
            return Err(ArtifactError::Invariant("feature_order must not be empty".to_string()));
        }

        if doc.weights.len() != doc.feature_order.len() {
            return Err(ArtifactError::Invariant(format!(
                "weights has {} entries but feature_order has {}",
                doc.weights.len(),
                doc.feature_order.len()
            )));
        }

        let mut seen = HashSet::with_capacity(doc.feature_order.len());
        for name in &doc.feature_order {
            if name.trim().is_empty() {
                return Err(ArtifactError::Invariant("feature_order contains an empty name".to_string()));
            }
            if !seen.insert(name.as_str()) {
                return Err(ArtifactError::Invariant(format!("duplicate feature in feature_order: {}", name)));
            }
        }

        if !doc.threshold.is_finite() || !(0.0..=1.0).contains(&doc.threshold) {
            return Err(ArtifactError::Invariant(format!(
                "threshold must be within [0, 1], got {}",
                doc.threshold
            )));
        }

        if let Some(scaler) = &doc.scaler {
            let n = doc.feature_order.len();
            if scaler.mean.len() != n || scaler.scale.len() != n {
                return Err(ArtifactError::Invariant(format!(
                    "scaler has {} means and {} scales for {} features",
                    scaler.mean.len(),
                    scaler.scale.len(),
                    n
                )));
            }
        }

        Ok(Self {
            version: doc.version,
            feature_order: doc.feature_order,
            weights: doc.weights,
            intercept: doc.intercept,
            threshold: doc.threshold,
            scaler: doc.scaler,
            exported_at_utc: doc.exported_at_utc,
        })
    }

    pub fn version(&self) -> &ModelVersion {
        &self.version
    }

    pub fn feature_order(&self) -> &[String] {
        &self.feature_order
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn scaler(&self) -> Option<&FeatureScaler> {
        self.scaler.as_ref()
    }

    pub fn exported_at_utc(&self) -> Option<&str> {
        self.exported_at_utc.as_deref()
    }
}
