//! Validation Gate
//!
//! Turns a loosely-typed JSON transaction into a [`NormalizedTransaction`]
//! or a structured rejection. Pure: no I/O, no shared state.
//!
//! Checks run in two passes. The presence pass reports every missing
//! required field; only if nothing is missing does the type/range pass run.
//! Nothing partial ever escapes: either every field normalizes or the
//! caller gets rejections.

pub mod schema;
pub mod transaction;


use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDateTime, Timelike, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

pub use schema::{AttributeRule, TextCase, TransactionSchema, CORE_FIELDS};
pub use transaction::{AttributeValue, FeatureLookup, NormalizedTransaction};

/// Untyped payload as received on the wire
pub type RawPayload = Value;

/// Name used when the payload itself is not an object
pub const TRANSACTION_FIELD: &str = "transaction";

/// Years the canonical four-digit form can represent
const SUPPORTED_YEARS: std::ops::RangeInclusive<i32> = 0..=9999;

const NAIVE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectionError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("{field} {reason}")]
    InvalidField { field: String, reason: String },
}

impl RejectionError {
    pub fn missing(field: &str) -> Self {
        RejectionError::MissingField {
            field: field.to_string(),
        }
    }

    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        RejectionError::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn field(&self) -> &str {
        match self {
            RejectionError::MissingField { field } | RejectionError::InvalidField { field, .. } => field,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RejectionError::MissingField { .. } => "missing_field",
            RejectionError::InvalidField { .. } => "invalid_field",
        }
    }

    pub fn to_item(&self) -> ValidationErrorItem {
        ValidationErrorItem {
            field: self.field().to_string(),
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// Wire form of one rejection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationErrorItem {
    pub field: String,
    pub kind: &'static str,
    pub message: String,
}

/// Validate a payload, stopping at the first rejection
pub fn validate(
    payload: &RawPayload,
    schema: &TransactionSchema,
) -> Result<NormalizedTransaction, RejectionError> {
    validate_all(payload, schema).map_err(|mut errors| errors.swap_remove(0))
}

/// Validate a payload, reporting every rejection.
///
/// The error vector is never empty.
pub fn validate_all(
    payload: &RawPayload,
    schema: &TransactionSchema,
) -> Result<NormalizedTransaction, Vec<RejectionError>> {
    let fields = match payload {
        Value::Object(map) => map,
        _ => return Err(vec![RejectionError::invalid(TRANSACTION_FIELD, "must be an object")]),
    };

    let missing = missing_fields(fields, schema);
    if !missing.is_empty() {
        return Err(missing);
    }

    let mut errors = Vec::new();

    let transaction_id = collect(&mut errors, identifier(fields, "transaction_id", schema.max_identifier_len));
    let account_id = collect(&mut errors, identifier(fields, "account_id", schema.max_identifier_len));
    let event_time = collect(&mut errors, timestamp(fields, "event_time_utc"));
    let amount = collect(&mut errors, non_negative_amount(fields, "amount"));
    let merchant_category = collect(&mut errors, category(fields, "merchant_category", TextCase::Lower, None));

    let mut attributes = BTreeMap::new();
    for spec in &schema.attributes {
        let Some(raw) = fields.get(&spec.name) else {
            continue;
        };
        match normalize_attribute(&spec.name, raw, &spec.rule) {
            Ok(value) => {
                attributes.insert(spec.name.clone(), value);
            }
            Err(e) => errors.push(e),
        }
    }

    for (name, raw) in fields {
        if CORE_FIELDS.contains(&name.as_str()) || schema.attribute(name).is_some() {
            continue;
        }
        if !schema.allow_undeclared {
            errors.push(RejectionError::invalid(name, "is not a recognized field"));
            continue;
        }
        match undeclared(name, raw) {
            Ok(Some(value)) => {
                attributes.insert(name.clone(), value);
            }
            Ok(None) => {}
            Err(e) => errors.push(e),
        }
    }

    match (transaction_id, account_id, event_time, amount, merchant_category) {
        (Some(transaction_id), Some(account_id), Some(event_time), Some(amount), Some(merchant_category))
            if errors.is_empty() =>
        {
            Ok(NormalizedTransaction {
                transaction_id,
                account_id,
                event_time,
                amount,
                merchant_category,
                attributes,
            })
        }
        _ => Err(errors),
    }
}

/// Pull the `transaction` object out of a request envelope
pub fn transaction_payload(envelope: &RawPayload) -> Result<&RawPayload, RejectionError> {
    match envelope {
        Value::Object(map) => map
            .get(TRANSACTION_FIELD)
            .ok_or_else(|| RejectionError::missing(TRANSACTION_FIELD)),
        _ => Err(RejectionError::invalid("request", "must be a JSON object")),
    }
}

fn missing_fields(fields: &Map<String, Value>, schema: &TransactionSchema) -> Vec<RejectionError> {
    CORE_FIELDS
        .iter()
        .copied()
        .chain(schema.attributes.iter().filter(|a| a.required).map(|a| a.name.as_str()))
        .filter(|name| !fields.contains_key(*name))
        .map(RejectionError::missing)
        .collect()
}

fn collect<T>(errors: &mut Vec<RejectionError>, result: Result<T, RejectionError>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            errors.push(e);
            None
        }
    }
}

fn field<'a>(fields: &'a Map<String, Value>, name: &str) -> Result<&'a Value, RejectionError> {
    fields.get(name).ok_or_else(|| RejectionError::missing(name))
}

fn identifier(fields: &Map<String, Value>, name: &str, max_len: usize) -> Result<String, RejectionError> {
    let Value::String(s) = field(fields, name)? else {
        return Err(RejectionError::invalid(name, "must be a string"));
    };
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(RejectionError::invalid(name, "must be a non-empty string"));
    }
    if trimmed.chars().count() > max_len {
        return Err(RejectionError::invalid(name, format!("must be at most {} characters", max_len)));
    }
    Ok(trimmed.to_string())
}

fn timestamp(fields: &Map<String, Value>, name: &str) -> Result<DateTime<Utc>, RejectionError> {
    let parsed = match field(fields, name)? {
        Value::String(s) => parse_time_text(s.trim()),
        Value::Number(n) => n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    };

    parsed
        .filter(|dt| SUPPORTED_YEARS.contains(&dt.year()))
        .and_then(|dt| dt.with_nanosecond(0))
        .ok_or_else(|| {
            RejectionError::invalid(name, "must be ISO 8601 (e.g., 2026-01-05T21:15:00Z) or epoch seconds")
        })
}

fn parse_time_text(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn non_negative_amount(fields: &Map<String, Value>, name: &str) -> Result<f64, RejectionError> {
    let value = number(name, field(fields, name)?)?;
    if value < 0.0 {
        return Err(RejectionError::invalid(name, "must be >= 0"));
    }
    Ok(value)
}

fn category(
    fields: &Map<String, Value>,
    name: &str,
    case: TextCase,
    allowed: Option<&[String]>,
) -> Result<String, RejectionError> {
    text_category(name, field(fields, name)?, case, allowed)
}

fn text_category(name: &str, raw: &Value, case: TextCase, allowed: Option<&[String]>) -> Result<String, RejectionError> {
    let Value::String(s) = raw else {
        return Err(RejectionError::invalid(name, "must be a string"));
    };
    let value = case.apply(s.trim());
    if value.is_empty() {
        return Err(RejectionError::invalid(name, "must not be empty"));
    }
    if let Some(allowed) = allowed {
        if !allowed.iter().any(|a| *a == value) {
            return Err(RejectionError::invalid(name, format!("must be one of: {}", allowed.join(", "))));
        }
    }
    Ok(value)
}

fn number(name: &str, raw: &Value) -> Result<f64, RejectionError> {
    let value = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match value {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(RejectionError::invalid(name, "must be a number")),
    }
}

fn integer(name: &str, raw: &Value) -> Result<i64, RejectionError> {
    let value = match raw {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    value.ok_or_else(|| RejectionError::invalid(name, "must be an integer"))
}

fn normalize_attribute(name: &str, raw: &Value, rule: &AttributeRule) -> Result<AttributeValue, RejectionError> {
    match rule {
        AttributeRule::Number { min, max } => {
            let v = number(name, raw)?;
            if let Some(min) = min.filter(|m| v < *m) {
                return Err(RejectionError::invalid(name, format!("must be >= {}", min)));
            }
            if let Some(max) = max.filter(|m| v > *m) {
                return Err(RejectionError::invalid(name, format!("must be <= {}", max)));
            }
            Ok(AttributeValue::Number(v))
        }
        AttributeRule::Integer { min, max } => {
            let v = integer(name, raw)?;
            match (min, max) {
                (Some(lo), Some(hi)) if v < *lo || v > *hi => {
                    Err(RejectionError::invalid(name, format!("must be between {} and {}", lo, hi)))
                }
                (Some(lo), None) if v < *lo => Err(RejectionError::invalid(name, format!("must be >= {}", lo))),
                (None, Some(hi)) if v > *hi => Err(RejectionError::invalid(name, format!("must be <= {}", hi))),
                _ => Ok(AttributeValue::Integer(v)),
            }
        }
        AttributeRule::Flag => match raw {
            Value::Bool(b) => Ok(AttributeValue::Flag(*b)),
            _ => Err(RejectionError::invalid(name, "must be a boolean")),
        },
        AttributeRule::Code { length } => {
            let Value::String(s) = raw else {
                return Err(RejectionError::invalid(name, "must be a string"));
            };
            let code = s.trim().to_uppercase();
            if code.len() != *length || !code.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(RejectionError::invalid(
                    name,
                    format!("must be a {}-letter uppercase code", length),
                ));
            }
            Ok(AttributeValue::Text(code))
        }
        AttributeRule::Category { case, allowed } => {
            text_category(name, raw, *case, allowed.as_deref()).map(AttributeValue::Text)
        }
    }
}

fn undeclared(name: &str, raw: &Value) -> Result<Option<AttributeValue>, RejectionError> {
    if name.trim().is_empty() || name.contains('=') {
        return Err(RejectionError::invalid(name, "is not a valid feature name"));
    }
    match raw {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(AttributeValue::Flag(*b))),
        Value::Number(_) => number(name, raw).map(|v| Some(AttributeValue::Number(v))),
        Value::String(s) => {
            let text = s.trim();
            match text.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(Some(AttributeValue::Number(v))),
                _ => Ok(Some(AttributeValue::Text(text.to_string()))),
            }
        }
        Value::Array(_) | Value::Object(_) => Err(RejectionError::invalid(name, "must be a number, boolean or string")),
    }
}
