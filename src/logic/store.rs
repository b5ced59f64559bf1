//! Artifact Store
//!
//! Read-only access to the durable object store holding the model artifact.
//! The cache only ever calls `get_object`; nothing here writes.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

/// Bucket + key pair addressing one object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bucket.is_empty() {
            write!(f, "{}", self.key)
        } else {
            write!(f, "{}/{}", self.bucket, self.key)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("access denied to {location}: {detail}")]
    PermissionDenied { location: String, detail: String },

    #[error("fetch of {location} failed: {detail}")]
    Transient { location: String, detail: String },
}

/// Object store read interface
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Short description for logs ("http", "local", ...)
    fn name(&self) -> &str;

    /// Fetch the raw bytes of one object
    async fn get_object(&self, location: &ObjectLocation) -> Result<Vec<u8>, StoreError>;
}

// ============================================================================
// HTTP OBJECT STORE
// ============================================================================

/// S3-compatible store read over plain HTTP (`GET {endpoint}/{bucket}/{key}`)
pub struct HttpObjectStore {
    endpoint: String,
    http_client: reqwest::Client,
}

impl HttpObjectStore {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, StoreError> {
        let endpoint = endpoint.into();
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Transient {
                location: endpoint.clone(),
                detail: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    fn object_url(&self, location: &ObjectLocation) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint,
            location.bucket,
            location.key.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl ArtifactStore for HttpObjectStore {
    fn name(&self) -> &str {
        "http"
    }

    async fn get_object(&self, location: &ObjectLocation) -> Result<Vec<u8>, StoreError> {
        let url = self.object_url(location);
        tracing::debug!("Fetching object from {}", url);

        let response = self.http_client.get(&url).send().await.map_err(|e| {
            StoreError::Transient {
                location: location.to_string(),
                detail: if e.is_timeout() {
                    "request timed out".to_string()
                } else {
                    e.to_string()
                },
            }
        })?;

        match response.status() {
            status if status.is_success() => {
                let bytes = response.bytes().await.map_err(|e| StoreError::Transient {
                    location: location.to_string(),
                    detail: format!("failed to read body: {}", e),
                })?;
                Ok(bytes.to_vec())
            }
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(location.to_string())),
            status @ (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                Err(StoreError::PermissionDenied {
                    location: location.to_string(),
                    detail: format!("HTTP {}", status.as_u16()),
                })
            }
            status => Err(StoreError::Transient {
                location: location.to_string(),
                detail: format!("HTTP {}", status.as_u16()),
            }),
        }
    }
}

// ============================================================================
// LOCAL FILE STORE
// ============================================================================

/// Filesystem-backed store, resolves `{root}/{bucket}/{key}`
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, location: &ObjectLocation) -> PathBuf {
        if location.bucket.is_empty() {
            self.root.join(&location.key)
        } else {
            self.root.join(&location.bucket).join(&location.key)
        }
    }
}

#[async_trait]
impl ArtifactStore for LocalFileStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn get_object(&self, location: &ObjectLocation) -> Result<Vec<u8>, StoreError> {
        let path = self.resolve(location);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(path.display().to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                Err(StoreError::PermissionDenied {
                    location: path.display().to_string(),
                    detail: e.to_string(),
                })
            }
            Err(e) => Err(StoreError::Transient {
                location: path.display().to_string(),
                detail: e.to_string(),
            }),
        }
    }
}
