use std::sync::Arc;
use tempfile::tempdir;
use yield_forecast::storage::LOCK_SUFFIX;
use yield_forecast::{
    ArtifactStore, ForecastError, FsObjectBackend, MemoryObjectBackend, ObjectBackend,
    ResourceHandle,
};

async fn memory_store(cache: &std::path::Path) -> (Arc<MemoryObjectBackend>, ArtifactStore) {
    let backend = Arc::new(MemoryObjectBackend::new());
    let store = ArtifactStore::connect(backend.clone(), "algorithm", cache)
        .await
        .unwrap();
    (backend, store)
}

#[test]
fn test_handle_parsing() {
    let handle = ResourceHandle::parse("fs://algorithm/SARIMA/Mango/abc").unwrap();
    assert_eq!(handle.scheme(), "fs");
    assert_eq!(handle.location(), "algorithm/SARIMA/Mango/abc");
    assert_eq!(handle.to_string(), "fs://algorithm/SARIMA/Mango/abc");
    assert_eq!(
        handle.bucket_and_object().unwrap(),
        ("algorithm", "SARIMA/Mango/abc")
    );

    for bad in ["", "algorithm/key", "://algorithm/key", "fs://"] {
        assert!(
            matches!(ResourceHandle::parse(bad), Err(ForecastError::InvalidResource(_))),
            "{:?} should not parse",
            bad
        );
    }

    let traversal = ResourceHandle::parse("fs://algorithm/../etc/passwd").unwrap();
    assert!(traversal.bucket_and_object().is_err());
    let bucket_only = ResourceHandle::parse("fs://algorithm").unwrap();
    assert!(bucket_only.bucket_and_object().is_err());
}

#[tokio::test]
async fn test_resolve_url_matches_put() {
    let cache = tempdir().unwrap();
    let (_, store) = memory_store(cache.path()).await;

    let resolved = store.resolve_url("SARIMA/Mango", "abc");
    let put = store.put("SARIMA/Mango", "abc", vec![1]).await.unwrap();

    assert_eq!(resolved, put);
    assert_eq!(put.to_string(), "mem://algorithm/SARIMA/Mango/abc");
}

#[tokio::test]
async fn test_put_overwrites() {
    let cache = tempdir().unwrap();
    let (backend, store) = memory_store(cache.path()).await;
    let handle = store.resolve_url("ns", "key");

    store.put("ns", "key", b"first".to_vec()).await.unwrap();
    assert_eq!(store.read(&handle).await.unwrap(), b"first".to_vec());

    // The cached copy of the first upload must not shadow the second
    store.put("ns", "key", b"second".to_vec()).await.unwrap();
    assert_eq!(store.read(&handle).await.unwrap(), b"second".to_vec());
    assert_eq!(backend.fetch_count(), 2);
}

#[tokio::test]
async fn test_get_caches_locally() {
    let cache = tempdir().unwrap();
    let (backend, store) = memory_store(cache.path()).await;
    let handle = store.put("ns", "key", vec![7, 8, 9]).await.unwrap();

    let path = store.get(&handle).await.unwrap();
    assert_eq!(path, cache.path().join("algorithm").join("ns").join("key"));
    assert_eq!(std::fs::read(&path).unwrap(), vec![7, 8, 9]);

    store.get(&handle).await.unwrap();
    assert_eq!(backend.fetch_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_get_fetches_once() {
    let cache = tempdir().unwrap();
    let (backend, store) = memory_store(cache.path()).await;
    let payload: Vec<u8> = (0..=255).cycle().take(64 * 1024).collect();
    let handle = store.put("SARIMA/Mango", "blob", payload.clone()).await.unwrap();

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let store = store.clone();
            let handle = handle.clone();
            tokio::spawn(async move { store.read(&handle).await })
        })
        .collect();

    for task in tasks {
        let bytes = task.await.unwrap().unwrap();
        assert_eq!(bytes, payload);
    }
    assert_eq!(backend.fetch_count(), 1);

    let mut lock = store
        .get(&handle)
        .await
        .unwrap()
        .into_os_string();
    lock.push(LOCK_SUFFIX);
    assert!(std::path::Path::new(&lock).exists());
}

#[tokio::test]
async fn test_wrong_scheme_is_rejected() {
    let cache = tempdir().unwrap();
    let (backend, store) = memory_store(cache.path()).await;

    let foreign = ResourceHandle::parse("s3://algorithm/ns/key").unwrap();
    match store.get(&foreign).await {
        Err(ForecastError::InvalidScheme { expected, found }) => {
            assert_eq!(expected, "mem");
            assert_eq!(found, "s3");
        }
        other => panic!("expected InvalidScheme, got {:?}", other),
    }
    assert!(store.remove(&foreign).await.is_err());
    assert_eq!(backend.fetch_count(), 0);
}

#[tokio::test]
async fn test_missing_object_is_read_error() {
    let cache = tempdir().unwrap();
    let (_, store) = memory_store(cache.path()).await;

    let result = store.get(&store.resolve_url("ns", "missing")).await;
    assert!(matches!(result, Err(ForecastError::StorageRead(_))));
}

#[tokio::test]
async fn test_remove_drops_object_and_cache_but_keeps_lock() {
    let cache = tempdir().unwrap();
    let (backend, store) = memory_store(cache.path()).await;
    let handle = store.put("ns", "key", vec![1, 2]).await.unwrap();
    let cached = store.get(&handle).await.unwrap();

    let removed = store.remove(&handle).await.unwrap();
    assert_eq!(removed, handle);
    assert!(backend.is_empty());
    assert!(!cached.exists());

    let mut lock = cached.clone().into_os_string();
    lock.push(LOCK_SUFFIX);
    assert!(std::path::Path::new(&lock).exists());

    // Already absent is not an error
    store.remove(&handle).await.unwrap();
}

#[tokio::test]
async fn test_filesystem_backend_store() {
    let objects = tempdir().unwrap();
    let cache = tempdir().unwrap();
    let backend = Arc::new(FsObjectBackend::new(objects.path()));
    let store = ArtifactStore::connect(backend.clone(), "models", cache.path())
        .await
        .unwrap();

    let handle = store
        .put("DECOMPOSITION/Corn", "id-1", b"payload".to_vec())
        .await
        .unwrap();
    assert_eq!(handle.scheme(), "fs");
    assert!(objects.path().join("models/DECOMPOSITION/Corn/id-1").exists());
    assert_eq!(store.read(&handle).await.unwrap(), b"payload".to_vec());

    store.remove(&handle).await.unwrap();
    assert!(!backend
        .remove_object("models", "DECOMPOSITION/Corn/id-1")
        .await
        .unwrap());
}

#[tokio::test]
async fn test_invalid_bucket() {
    let cache = tempdir().unwrap();
    let result =
        ArtifactStore::connect(Arc::new(MemoryObjectBackend::new()), "a/b", cache.path()).await;
    assert!(matches!(result, Err(ForecastError::Config(_))));
}
