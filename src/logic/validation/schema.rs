//! Transaction Schema
//!
//! Declares the attributes a transaction carries beyond the core fields
//! (`transaction_id`, `account_id`, `event_time_utc`, `amount`,
//! `merchant_category`), and how each one is checked and normalized.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Core fields, checked by the gate itself in this order
pub const CORE_FIELDS: [&str; 5] = [
    "transaction_id",
    "account_id",
    "event_time_utc",
    "amount",
    "merchant_category",
];

pub const DEFAULT_MAX_IDENTIFIER_LEN: usize = 128;

const ALLOWED_CHANNELS: [&str; 5] = ["card_present", "card_not_present", "online", "atm", "transfer"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextCase {
    Lower,
    Upper,
    Preserve,
}

impl TextCase {
    pub fn apply(self, value: &str) -> String {
        match self {
            TextCase::Lower => value.to_lowercase(),
            TextCase::Upper => value.to_uppercase(),
            TextCase::Preserve => value.to_string(),
        }
    }
}

/// Check + normalization rule for one attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttributeRule {
    /// Finite decimal, numeric strings coerced
    Number {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    /// Whole number, numeric strings coerced
    Integer {
        #[serde(default)]
        min: Option<i64>,
        #[serde(default)]
        max: Option<i64>,
    },
    /// JSON boolean, no coercion
    Flag,
    /// Fixed-length alphabetic code, upper-cased (currency, country)
    Code { length: usize },
    /// Free or enumerated category
    Category {
        case: TextCase,
        #[serde(default)]
        allowed: Option<Vec<String>>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub name: String,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(flatten)]
    pub rule: AttributeRule,
}

impl AttributeSpec {
    pub fn required(name: &str, rule: AttributeRule) -> Self {
        Self {
            name: name.to_string(),
            required: true,
            rule,
        }
    }

    pub fn optional(name: &str, rule: AttributeRule) -> Self {
        Self {
            name: name.to_string(),
            required: false,
            rule,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("failed to read schema file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse schema file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid schema: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionSchema {
    #[serde(default = "default_max_identifier_len")]
    pub max_identifier_len: usize,

    /// Keep fields the schema does not declare as extra features
    #[serde(default = "default_true")]
    pub allow_undeclared: bool,

    pub attributes: Vec<AttributeSpec>,
}

impl Default for TransactionSchema {
    fn default() -> Self {
        Self {
            max_identifier_len: DEFAULT_MAX_IDENTIFIER_LEN,
            allow_undeclared: true,
            attributes: vec![
                AttributeSpec::required("currency", AttributeRule::Code { length: 3 }),
                AttributeSpec::required(
                    "channel",
                    AttributeRule::Category {
                        case: TextCase::Lower,
                        allowed: Some(ALLOWED_CHANNELS.iter().map(|c| c.to_string()).collect()),
                    },
                ),
                AttributeSpec::required("country", AttributeRule::Code { length: 2 }),
                AttributeSpec::required(
                    "customer_age",
                    AttributeRule::Integer { min: Some(13), max: Some(120) },
                ),
                AttributeSpec::required(
                    "account_age_days",
                    AttributeRule::Integer { min: Some(0), max: None },
                ),
                AttributeSpec::required(
                    "transactions_last_24h",
                    AttributeRule::Integer { min: Some(0), max: None },
                ),
                AttributeSpec::required(
                    "avg_amount_last_7d",
                    AttributeRule::Number { min: Some(0.0), max: None },
                ),
                AttributeSpec::required("is_international", AttributeRule::Flag),
            ],
        }
    }
}

impl TransactionSchema {
    /// Schema with no declared attributes, only the core fields
    pub fn core_only() -> Self {
        Self {
            max_identifier_len: DEFAULT_MAX_IDENTIFIER_LEN,
            allow_undeclared: true,
            attributes: Vec::new(),
        }
    }

    /// Load a schema from a JSON file and check it
    pub fn from_file(path: &Path) -> Result<Self, SchemaError> {
        let content = std::fs::read_to_string(path)?;
        let schema: TransactionSchema = serde_json::from_str(&content)?;
        schema.check()?;
        Ok(schema)
    }

    pub fn check(&self) -> Result<(), SchemaError> {
        if self.max_identifier_len == 0 {
            return Err(SchemaError::Invalid("max_identifier_len must be > 0".to_string()));
        }

        let mut seen = HashSet::new();
        for attr in &self.attributes {
            if attr.name.trim().is_empty() || attr.name.contains('=') {
                return Err(SchemaError::Invalid(format!("bad attribute name: {:?}", attr.name)));
            }
            if CORE_FIELDS.contains(&attr.name.as_str()) {
                return Err(SchemaError::Invalid(format!("{} is a core field", attr.name)));
            }
            if !seen.insert(attr.name.as_str()) {
                return Err(SchemaError::Invalid(format!("duplicate attribute: {}", attr.name)));
            }
            if let AttributeRule::Code { length: 0 } = attr.rule {
                return Err(SchemaError::Invalid(format!("{}: code length must be > 0", attr.name)));
            }
        }
        Ok(())
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

fn default_true() -> bool {
    true
}

fn default_max_identifier_len() -> usize {
    DEFAULT_MAX_IDENTIFIER_LEN
}
