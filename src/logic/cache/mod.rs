//! Model Parameter Cache
//!
//! Holds at most one loaded artifact for the lifetime of the process that
//! owns it. The first call fetches, parses and checks the artifact; every
//! later call is an in-memory read.
//!
//! ```text
//! UNINITIALIZED ──► LOADING ──► READY (terminal)
//!                     │  ▲
//!                     ▼  │ next call
//!                 LOAD_FAILED
//! ```
//!
//! Failures are never stored as the result: the next call fetches again.
//! Concurrent callers share a single in-flight fetch.

#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;

use crate::logic::store::{ArtifactStore, ObjectLocation, StoreError};
use crate::models::{ArtifactError, ModelArtifact, ModelVersion};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("model artifact not found: {location}")]
    NotFound { location: String },

    #[error("failed to fetch model artifact: {detail}")]
    TransientFetchFailure { detail: String },

    #[error("malformed model artifact: {detail}")]
    MalformedArtifact { detail: String },

    #[error("model artifact violates invariant: {detail}")]
    InvariantViolation { detail: String },
}

impl LoadError {
    /// Storage-side failures that may clear up on their own
    pub fn is_retryable(&self) -> bool {
        matches!(self, LoadError::NotFound { .. } | LoadError::TransientFetchFailure { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::NotFound { .. } => "not_found",
            LoadError::TransientFetchFailure { .. } => "transient_fetch_failure",
            LoadError::MalformedArtifact { .. } => "malformed_artifact",
            LoadError::InvariantViolation { .. } => "invariant_violation",
        }
    }
}

impl From<StoreError> for LoadError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(location) => LoadError::NotFound { location },
            other => LoadError::TransientFetchFailure {
                detail: other.to_string(),
            },
        }
    }
}

impl From<ArtifactError> for LoadError {
    fn from(err: ArtifactError) -> Self {
        match err {
            ArtifactError::Malformed(e) => LoadError::MalformedArtifact { detail: e.to_string() },
            ArtifactError::Invariant(detail) => LoadError::InvariantViolation { detail },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheState {
    Uninitialized,
    Loading,
    Ready,
    LoadFailed,
}

/// Loaded artifact plus where and when it came from
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub artifact: ModelArtifact,
    pub loaded_at: DateTime<Utc>,
    pub source: String,
    pub size_bytes: usize,
    /// Hex SHA-256 of the artifact bytes
    pub digest: String,
}

impl CacheEntry {
    pub fn version(&self) -> &ModelVersion {
        self.artifact.version()
    }
}

/// Snapshot for the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub state: CacheState,
    pub source: String,
    pub model_version: Option<ModelVersion>,
    pub digest: Option<String>,
    pub exported_at_utc: Option<String>,
    pub loaded_at: Option<DateTime<Utc>>,
    pub fetch_attempts: u64,
    pub last_error: Option<String>,
}

/// Marks a load in progress; cleared on drop so a cancelled load does not
/// leave the cache reporting `Loading`.
struct LoadingFlag<'a>(&'a AtomicBool);

impl<'a> LoadingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for LoadingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone)]
struct FailureRecord {
    at: Instant,
    error: LoadError,
}

pub struct ModelCache {
    store: Arc<dyn ArtifactStore>,
    location: ObjectLocation,
    retry_backoff: Duration,
    entry: OnceCell<CacheEntry>,
    loading: AtomicBool,
    fetch_attempts: AtomicU64,
    last_failure: Mutex<Option<FailureRecord>>,
}

impl ModelCache {
    pub fn new(store: Arc<dyn ArtifactStore>, location: ObjectLocation) -> Self {
        Self {
            store,
            location,
            retry_backoff: Duration::ZERO,
            entry: OnceCell::new(),
            loading: AtomicBool::new(false),
            fetch_attempts: AtomicU64::new(0),
            last_failure: Mutex::new(None),
        }
    }

    /// Minimum delay between fetch attempts after a failure
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Return the active artifact, loading it on first use
    pub async fn get_active_artifact(&self) -> Result<&CacheEntry, LoadError> {
        if let Some(entry) = self.entry.get() {
            return Ok(entry);
        }

        self.check_backoff()?;
        self.entry.get_or_try_init(|| self.load()).await
    }

    /// Current state of the load state machine
    pub fn state(&self) -> CacheState {
        if self.entry.initialized() {
            CacheState::Ready
        } else if self.loading.load(Ordering::Acquire) {
            CacheState::Loading
        } else if self.last_failure.lock().is_some() {
            CacheState::LoadFailed
        } else {
            CacheState::Uninitialized
        }
    }

    /// Number of times the store has been asked for the artifact
    pub fn fetch_attempts(&self) -> u64 {
        self.fetch_attempts.load(Ordering::Relaxed)
    }

    pub fn status(&self) -> CacheStatus {
        let entry = self.entry.get();
        CacheStatus {
            state: self.state(),
            source: self.location.to_string(),
            model_version: entry.map(|e| e.version().clone()),
            digest: entry.map(|e| e.digest.clone()),
            exported_at_utc: entry.and_then(|e| e.artifact.exported_at_utc().map(str::to_string)),
            loaded_at: entry.map(|e| e.loaded_at),
            fetch_attempts: self.fetch_attempts(),
            last_error: self.last_failure.lock().as_ref().map(|f| f.error.to_string()),
        }
    }

    fn check_backoff(&self) -> Result<(), LoadError> {
        if self.retry_backoff.is_zero() {
            return Ok(());
        }
        match self.last_failure.lock().as_ref() {
            Some(failure) if failure.at.elapsed() < self.retry_backoff => {
                tracing::debug!(
                    "Model load retry suppressed for another {:?}",
                    self.retry_backoff.saturating_sub(failure.at.elapsed())
                );
                Err(failure.error.clone())
            }
            _ => Ok(()),
        }
    }

    async fn load(&self) -> Result<CacheEntry, LoadError> {
        // Callers queued behind a failed load re-check here.
        self.check_backoff()?;

        let _loading = LoadingFlag::raise(&self.loading);
        let result = self.fetch_and_parse().await;

        match &result {
            Ok(entry) => {
                *self.last_failure.lock() = None;
                tracing::info!(
                    "Model artifact {} loaded from {} ({} bytes, sha256 {})",
                    entry.version(),
                    entry.source,
                    entry.size_bytes,
                    entry.digest
                );
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::warn!("Model artifact load failed, will retry on next call: {}", e);
                } else {
                    tracing::error!("Model artifact at {} is unusable: {}", self.location, e);
                }
                *self.last_failure.lock() = Some(FailureRecord {
                    at: Instant::now(),
                    error: e.clone(),
                });
            }
        }

        result
    }

    async fn fetch_and_parse(&self) -> Result<CacheEntry, LoadError> {
        self.fetch_attempts.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Fetching model artifact {} via {} store", self.location, self.store.name());

        let bytes = self.store.get_object(&self.location).await?;
        let artifact = ModelArtifact::from_slice(&bytes)?;

        Ok(CacheEntry {
            artifact,
            loaded_at: Utc::now(),
            source: self.location.to_string(),
            size_bytes: bytes.len(),
            digest: format!("{:x}", Sha256::digest(&bytes)),
        })
    }
}
