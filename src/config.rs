//! Configuration module

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::logic::store::ObjectLocation;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Bucket holding the model artifact
    pub model_bucket: Option<String>,

    /// Object key of the model artifact
    pub model_key: Option<String>,

    /// Base URL of the object store (path-style addressing)
    pub model_store_endpoint: String,

    /// Artifact file used when no bucket/key is configured (local development)
    pub model_local_path: PathBuf,

    /// Timeout for a single artifact fetch
    pub model_fetch_timeout: Duration,

    /// Minimum delay between fetch attempts after a failed load (zero disables)
    pub model_retry_backoff: Duration,

    /// Load the artifact at startup instead of on the first scoring request
    pub model_preload: bool,

    /// Optional JSON file overriding the built-in transaction schema
    pub transaction_schema_path: Option<PathBuf>,

    /// Log output format ("text" or "json")
    pub log_format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),

            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),

            model_bucket: non_empty_var("MODEL_BUCKET"),

            model_key: non_empty_var("MODEL_KEY"),

            model_store_endpoint: env::var("MODEL_STORE_ENDPOINT")
                .unwrap_or_else(|_| "https://s3.amazonaws.com".to_string()),

            model_local_path: env::var("MODEL_LOCAL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("reports/fraud_scoring_parameters_latest.json")),

            model_fetch_timeout: Duration::from_secs(
                env::var("MODEL_FETCH_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),

            model_retry_backoff: Duration::from_millis(
                env::var("MODEL_RETRY_BACKOFF_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0),
            ),

            model_preload: env::var("MODEL_PRELOAD")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),

            transaction_schema_path: non_empty_var("TRANSACTION_SCHEMA_PATH").map(PathBuf::from),

            log_format: env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "text".to_string()),
        }
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Remote artifact location, if both bucket and key are configured
    pub fn remote_artifact(&self) -> Option<ObjectLocation> {
        match (&self.model_bucket, &self.model_key) {
            (Some(bucket), Some(key)) => Some(ObjectLocation::new(bucket.clone(), key.clone())),
            _ => None,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
