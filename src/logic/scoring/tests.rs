use serde_json::{json, Value};

use super::*;
use crate::logic::validation::{validate, TransactionSchema};
use crate::models::ModelVersion;

const EPSILON: f64 = 1e-6;

fn transaction(extra: Value) -> NormalizedTransaction {
    let mut payload = json!({
        "transaction_id": "txn_1",
        "account_id": "acct_1",
        "event_time_utc": "2026-01-05T03:00:00Z",
        "amount": 1000,
        "merchant_category": "electronics"
    });
    for (k, v) in extra.as_object().unwrap() {
        payload[k] = v.clone();
    }
    validate(&payload, &TransactionSchema::core_only()).unwrap()
}

fn artifact(doc: Value) -> ModelArtifact {
    ModelArtifact::from_value(doc).unwrap()
}

fn reference_artifact() -> ModelArtifact {
    artifact(json!({
        "version": "v1",
        "feature_order": ["amount", "hour"],
        "weights": [0.002, -0.01],
        "intercept": -1.0,
        "threshold": 0.5
    }))
}

#[test]
fn test_reference_scenario() {
    let tx = transaction(json!({ "hour": 3 }));
    let decision = score(&tx, &reference_artifact()).unwrap();

    let z: f64 = -1.0 + 0.002 * 1000.0 + (-0.01) * 3.0;
    assert!((z - 0.97).abs() < EPSILON);
    assert!((decision.fraud_probability - 1.0 / (1.0 + (-z).exp())).abs() < EPSILON);
    assert!((decision.fraud_probability - 0.7253).abs() < 1e-3);
    assert!(decision.fraud_label);
    assert_eq!(decision.threshold, 0.5);
    assert_eq!(decision.model_version, ModelVersion::Text("v1".to_string()));
}

#[test]
fn test_missing_feature_is_mismatch() {
    let tx = transaction(json!({}));
    let err = score(&tx, &reference_artifact()).unwrap_err();
    assert_eq!(err.field(), Some("hour"));
    assert!(matches!(err, ScoringError::FeatureMismatch { .. }));
}

#[test]
fn test_non_numeric_feature_is_mismatch() {
    let tx = transaction(json!({ "hour": "three" }));
    let err = score(&tx, &reference_artifact()).unwrap_err();
    assert_eq!(
        err,
        ScoringError::FeatureMismatch {
            field: "hour".to_string(),
            reason: "not numeric"
        }
    );

    let model = artifact(json!({
        "version": 1,
        "feature_order": ["account_id"],
        "weights": [1.0],
        "intercept": 0.0,
        "threshold": 0.5
    }));
    assert_eq!(score(&tx, &model).unwrap_err().field(), Some("account_id"));
}

#[test]
fn test_scoring_is_deterministic() {
    let tx = transaction(json!({ "hour": 3 }));
    let model = reference_artifact();

    let first = score(&tx, &model).unwrap();
    for _ in 0..100 {
        let again = score(&tx, &model).unwrap();
        assert_eq!(again.fraud_probability.to_bits(), first.fraud_probability.to_bits());
    }
}

#[test]
fn test_label_follows_threshold() {
    let tx = transaction(json!({ "hour": 3 }));
    let p = score(&tx, &reference_artifact()).unwrap().fraud_probability;

    let at = artifact(json!({
        "version": "v1",
        "feature_order": ["amount", "hour"],
        "weights": [0.002, -0.01],
        "intercept": -1.0,
        "threshold": p
    }));
    assert!(score(&tx, &at).unwrap().fraud_label);

    let above = artifact(json!({
        "version": "v1",
        "feature_order": ["amount", "hour"],
        "weights": [0.002, -0.01],
        "intercept": -1.0,
        "threshold": 0.9
    }));
    let decision = score(&tx, &above).unwrap();
    assert!(!decision.fraud_label);
    assert_eq!(decision.threshold, 0.9);
}

#[test]
fn test_extreme_logits_stay_in_range() {
    let tx = transaction(json!({ "hour": 3 }));
    for (weight, expected) in [(1e6, 1.0), (-1e6, 0.0)] {
        let model = artifact(json!({
            "version": "x",
            "feature_order": ["amount"],
            "weights": [weight],
            "intercept": 0.0,
            "threshold": 0.5
        }));
        let p = score(&tx, &model).unwrap().fraud_probability;
        assert!((0.0..=1.0).contains(&p));
        assert!((p - expected).abs() < EPSILON);
    }
}

#[test]
fn test_overflowing_logit_saturates() {
    let tx = transaction(json!({ "amount": 1e300 }));
    for (weight, expected) in [(1e10, 1.0), (-1e10, 0.0)] {
        let model = artifact(json!({
            "version": "x",
            "feature_order": ["amount"],
            "weights": [weight],
            "intercept": 0.0,
            "threshold": 0.5
        }));
        let decision = score(&tx, &model).unwrap();
        assert_eq!(decision.fraud_probability, expected);
        assert_eq!(decision.fraud_label, expected == 1.0);
    }
}

#[test]
fn test_opposing_overflows_are_rejected() {
    let tx = transaction(json!({ "amount": 1e300, "hour": 1e300 }));
    let model = artifact(json!({
        "version": "x",
        "feature_order": ["amount", "hour"],
        "weights": [1e10, -1e10],
        "intercept": 0.0,
        "threshold": 0.5
    }));

    let err = score(&tx, &model).unwrap_err();
    assert_eq!(err, ScoringError::UndefinedScore);
    assert_eq!(err.field(), None);
    assert_eq!(err.kind(), "undefined_score");
}

#[test]
fn test_one_hot_features() {
    let tx = transaction(json!({ "channel": "online", "is_international": true }));
    let model = artifact(json!({
        "version": "v2",
        "feature_order": [
            "merchant_category=electronics",
            "merchant_category=grocery",
            "channel=online",
            "is_international=true",
            "is_international"
        ],
        "weights": [1.0, 10.0, 0.5, 0.25, 0.125],
        "intercept": 0.0,
        "threshold": 0.5
    }));

    let vector = feature_vector(&tx, &model).unwrap();
    assert_eq!(vector, [1.0, 0.0, 1.0, 1.0, 1.0]);
}

#[test]
fn test_one_hot_over_absent_field_is_mismatch() {
    let tx = transaction(json!({}));
    let model = artifact(json!({
        "version": "v2",
        "feature_order": ["channel=online"],
        "weights": [1.0],
        "intercept": 0.0,
        "threshold": 0.5
    }));
    assert_eq!(score(&tx, &model).unwrap_err().field(), Some("channel=online"));
}

#[test]
fn test_scaler_standardizes_features() {
    let tx = transaction(json!({ "hour": 3 }));
    let model = artifact(json!({
        "version": "v3",
        "feature_order": ["amount", "hour"],
        "weights": [1.0, 1.0],
        "intercept": 0.0,
        "threshold": 0.5,
        "scaler": { "mean": [500.0, 12.0], "scale": [250.0, 0.0] }
    }));

    let vector = feature_vector(&tx, &model).unwrap();
    assert!((vector[0] - 2.0).abs() < EPSILON);
    assert_eq!(vector[1], 0.0);

    let decision = score(&tx, &model).unwrap();
    assert!((decision.fraud_probability - sigmoid(2.0)).abs() < EPSILON);
}

#[test]
fn test_sigmoid_is_symmetric() {
    for x in [0.0, 0.5, 3.0, 40.0, 800.0] {
        assert!((sigmoid(x) + sigmoid(-x) - 1.0).abs() < EPSILON);
    }
    assert_eq!(sigmoid(0.0), 0.5);
}
