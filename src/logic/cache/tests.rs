use std::collections::VecDeque;
use std::sync::atomic::AtomicUsize;

use async_trait::async_trait;
use serde_json::json;

use super::*;

/// Store that replays scripted responses and counts calls
struct ScriptedStore {
    responses: Mutex<VecDeque<Result<Vec<u8>, StoreError>>>,
    fallback: Result<Vec<u8>, StoreError>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedStore {
    fn always(response: Result<Vec<u8>, StoreError>) -> Self {
        Self::scripted(Vec::new(), response)
    }

    fn scripted(first: Vec<Result<Vec<u8>, StoreError>>, then: Result<Vec<u8>, StoreError>) -> Self {
        Self {
            responses: Mutex::new(first.into()),
            fallback: then,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactStore for ScriptedStore {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn get_object(&self, _location: &ObjectLocation) -> Result<Vec<u8>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.responses.lock().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

fn artifact_bytes() -> Vec<u8> {
    serde_json::to_vec(&json!({
        "version": "v1",
        "feature_order": ["amount", "hour"],
        "weights": [0.002, -0.01],
        "intercept": -1.0,
        "threshold": 0.5
    }))
    .unwrap()
}

fn not_found() -> Result<Vec<u8>, StoreError> {
    Err(StoreError::NotFound("models/fraud.json".to_string()))
}

fn cache_over(store: &Arc<ScriptedStore>) -> ModelCache {
    ModelCache::new(store.clone(), ObjectLocation::new("models", "fraud.json"))
}

#[tokio::test]
async fn test_cold_then_warm_fetches_once() {
    let store = Arc::new(ScriptedStore::always(Ok(artifact_bytes())));
    let cache = cache_over(&store);
    assert_eq!(cache.state(), CacheState::Uninitialized);

    for _ in 0..10 {
        let entry = tokio_test::assert_ok!(cache.get_active_artifact().await);
        assert_eq!(entry.version(), &ModelVersion::Text("v1".to_string()));
    }

    assert_eq!(store.calls(), 1);
    assert_eq!(cache.fetch_attempts(), 1);
    assert_eq!(cache.state(), CacheState::Ready);
}

#[tokio::test]
async fn test_entry_metadata() {
    let store = Arc::new(ScriptedStore::always(Ok(artifact_bytes())));
    let cache = cache_over(&store);

    let entry = cache.get_active_artifact().await.unwrap();
    assert_eq!(entry.source, "models/fraud.json");
    assert_eq!(entry.size_bytes, artifact_bytes().len());
    assert_eq!(entry.digest.len(), 64);
    assert_eq!(entry.digest, format!("{:x}", Sha256::digest(artifact_bytes())));

    let status = cache.status();
    assert_eq!(status.state, CacheState::Ready);
    assert_eq!(status.digest.as_deref(), Some(entry.digest.as_str()));
    assert!(status.last_error.is_none());
}

#[tokio::test]
async fn test_not_found_then_recovers() {
    let store = Arc::new(ScriptedStore::scripted(vec![not_found()], Ok(artifact_bytes())));
    let cache = cache_over(&store);

    let err = cache.get_active_artifact().await.unwrap_err();
    assert!(matches!(err, LoadError::NotFound { .. }));
    assert!(err.is_retryable());
    assert_eq!(cache.state(), CacheState::LoadFailed);

    let entry = cache.get_active_artifact().await.unwrap();
    assert_eq!(entry.version(), &ModelVersion::Text("v1".to_string()));
    assert_eq!(cache.state(), CacheState::Ready);
    assert_eq!(store.calls(), 2);
}

#[tokio::test]
async fn test_permission_and_network_errors_are_transient() {
    let store = Arc::new(ScriptedStore::scripted(
        vec![
            Err(StoreError::PermissionDenied {
                location: "models/fraud.json".to_string(),
                detail: "HTTP 403".to_string(),
            }),
            Err(StoreError::Transient {
                location: "models/fraud.json".to_string(),
                detail: "request timed out".to_string(),
            }),
        ],
        Ok(artifact_bytes()),
    ));
    let cache = cache_over(&store);

    for _ in 0..2 {
        let err = cache.get_active_artifact().await.unwrap_err();
        assert!(matches!(err, LoadError::TransientFetchFailure { .. }));
    }
    assert!(cache.get_active_artifact().await.is_ok());
}

#[tokio::test]
async fn test_length_mismatch_is_invariant_violation() {
    let bad = serde_json::to_vec(&json!({
        "version": "v1",
        "feature_order": ["amount", "hour"],
        "weights": [0.002],
        "intercept": -1.0,
        "threshold": 0.5
    }))
    .unwrap();
    let store = Arc::new(ScriptedStore::always(Ok(bad)));
    let cache = cache_over(&store);

    let err = cache.get_active_artifact().await.unwrap_err();
    assert!(matches!(err, LoadError::InvariantViolation { .. }));
    assert!(!err.is_retryable());

    // Never cached: every call goes back to the store and fails again.
    assert!(cache.get_active_artifact().await.is_err());
    assert_eq!(store.calls(), 2);
    assert_eq!(cache.state(), CacheState::LoadFailed);
    assert!(cache.status().model_version.is_none());
}

#[tokio::test]
async fn test_garbage_is_malformed() {
    let store = Arc::new(ScriptedStore::always(Ok(b"<html>oops</html>".to_vec())));
    let cache = cache_over(&store);

    let err = cache.get_active_artifact().await.unwrap_err();
    assert_eq!(err.kind(), "malformed_artifact");
}

#[tokio::test]
async fn test_concurrent_cold_start_single_fetch() {
    let store = Arc::new(ScriptedStore::always(Ok(artifact_bytes())).with_delay(Duration::from_millis(50)));
    let cache = Arc::new(cache_over(&store));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            cache.get_active_artifact().await.map(|e| e.digest.clone())
        }));
    }

    let mut digests = Vec::new();
    for handle in handles {
        digests.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(store.calls(), 1);
    assert!(digests.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn test_backoff_suppresses_fetches() {
    let store = Arc::new(ScriptedStore::scripted(vec![not_found()], Ok(artifact_bytes())));
    let cache = cache_over(&store).with_retry_backoff(Duration::from_secs(3600));

    assert!(cache.get_active_artifact().await.is_err());
    let err = cache.get_active_artifact().await.unwrap_err();
    assert!(matches!(err, LoadError::NotFound { .. }));
    assert_eq!(store.calls(), 1);
}

#[tokio::test]
async fn test_backoff_expires() {
    let store = Arc::new(ScriptedStore::scripted(vec![not_found()], Ok(artifact_bytes())));
    let cache = cache_over(&store).with_retry_backoff(Duration::from_millis(20));

    assert!(cache.get_active_artifact().await.is_err());
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(cache.get_active_artifact().await.is_ok());
    assert_eq!(store.calls(), 2);
}

#[tokio::test]
async fn test_fresh_instances_do_not_share_state() {
    let store = Arc::new(ScriptedStore::always(Ok(artifact_bytes())));
    let first = cache_over(&store);
    let second = cache_over(&store);

    first.get_active_artifact().await.unwrap();
    assert_eq!(second.state(), CacheState::Uninitialized);

    second.get_active_artifact().await.unwrap();
    assert_eq!(store.calls(), 2);
}
