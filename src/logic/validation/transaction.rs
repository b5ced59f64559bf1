//! Normalized Transaction
//!
//! Fields are visible to the validation module only: the gate is the one
//! place a `NormalizedTransaction` is built.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Canonical timestamp layout, UTC with second precision
pub const CANONICAL_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Normalized attribute value
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Flag(bool),
    Integer(i64),
    Number(f64),
    Text(String),
}

/// Outcome of resolving a model feature by name
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureLookup {
    Value(f64),
    Missing,
    NotNumeric,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTransaction {
    pub(super) transaction_id: String,
    pub(super) account_id: String,
    pub(super) event_time: DateTime<Utc>,
    pub(super) amount: f64,
    pub(super) merchant_category: String,
    pub(super) attributes: BTreeMap<String, AttributeValue>,
}

impl NormalizedTransaction {
    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn event_time_utc(&self) -> String {
        self.event_time.format(CANONICAL_TIME_FORMAT).to_string()
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn merchant_category(&self) -> &str {
        &self.merchant_category
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Resolve a model feature name to its numeric value.
    ///
    /// Plain names read numeric attributes (flags as 1.0/0.0). `field=value`
    /// names are one-hot indicators over a categorical field.
    pub fn feature(&self, name: &str) -> FeatureLookup {
        if let Some((field, wanted)) = name.split_once('=') {
            return match self.category_text(field) {
                Some(actual) => FeatureLookup::Value(if actual == wanted { 1.0 } else { 0.0 }),
                None if self.is_core(field) => FeatureLookup::NotNumeric,
                None => FeatureLookup::Missing,
            };
        }

        if name == "amount" {
            return FeatureLookup::Value(self.amount);
        }

        match self.attribute(name) {
            Some(AttributeValue::Number(v)) => FeatureLookup::Value(*v),
            Some(AttributeValue::Integer(v)) => FeatureLookup::Value(*v as f64),
            Some(AttributeValue::Flag(b)) => FeatureLookup::Value(if *b { 1.0 } else { 0.0 }),
            Some(AttributeValue::Text(_)) => FeatureLookup::NotNumeric,
            None if self.is_core(name) => FeatureLookup::NotNumeric,
            None => FeatureLookup::Missing,
        }
    }

    fn category_text(&self, field: &str) -> Option<String> {
        if field == "merchant_category" {
            return Some(self.merchant_category.clone());
        }
        match self.attribute(field)? {
            AttributeValue::Text(s) => Some(s.clone()),
            AttributeValue::Flag(b) => Some(b.to_string()),
            AttributeValue::Integer(i) => Some(i.to_string()),
            AttributeValue::Number(_) => None,
        }
    }

    fn is_core(&self, field: &str) -> bool {
        super::schema::CORE_FIELDS.contains(&field)
    }
}

impl Serialize for NormalizedTransaction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(5 + self.attributes.len()))?;
        map.serialize_entry("transaction_id", &self.transaction_id)?;
        map.serialize_entry("account_id", &self.account_id)?;
        map.serialize_entry("event_time_utc", &self.event_time_utc())?;
        map.serialize_entry("amount", &self.amount)?;
        map.serialize_entry("merchant_category", &self.merchant_category)?;
        for (name, value) in &self.attributes {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
