use larder::cache::{CacheKey, CacheStore};
use tempfile::TempDir;

#[test]
fn test_key_is_deterministic() {
    let a = CacheKey::from_url("http://www.example.com/");
    let b = CacheKey::from_url("http://www.example.com/");

    assert_eq!(a, b);
    assert_eq!(a.as_str().len(), 64);
    assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}

#[test]
fn test_key_depends_on_url_only() {
    let page = CacheKey::from_url("http://www.example.com/page");
    let other = CacheKey::from_url("http://www.example.com/other");

    assert_ne!(page, other);
}

#[test]
fn test_key_matches_known_digest() {
    // sha256("")
    assert_eq!(
        CacheKey::from_url("").as_str(),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
}

#[test]
fn test_open_creates_nested_root() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("a").join("b");

    let store = CacheStore::open(&root).unwrap();

    assert!(root.is_dir());
    assert_eq!(store.root(), root.as_path());
}

#[tokio::test]
async fn test_lookup_missing_entry() {
    let dir = TempDir::new().unwrap();
    let store = CacheStore::open(dir.path()).unwrap();

    let entry = store.lookup(&CacheKey::from_url("http://nowhere/")).await.unwrap();
    assert!(entry.is_none());
}

#[tokio::test]
async fn test_store_then_lookup_returns_exact_bytes() {
    let dir = TempDir::new().unwrap();
    let store = CacheStore::open(dir.path()).unwrap();
    let key = CacheKey::from_url("http://www.example.com/bin");
    let bytes = b"HTTP/1.0 200 OK\r\nContent-Type: application/octet-stream\r\n\r\n\x00\x01\xff\r\n".to_vec();

    store.store(&key, &bytes).await.unwrap();

    assert_eq!(store.lookup(&key).await.unwrap(), Some(bytes));
    assert!(store.path_for(&key).is_file());
}

#[tokio::test]
async fn test_store_overwrites_previous_entry() {
    let dir = TempDir::new().unwrap();
    let store = CacheStore::open(dir.path()).unwrap();
    let key = CacheKey::from_url("http://www.example.com/");

    store.store(&key, b"first, and longer than the second").await.unwrap();
    store.store(&key, b"second").await.unwrap();

    assert_eq!(store.lookup(&key).await.unwrap(), Some(b"second".to_vec()));
}

#[tokio::test]
async fn test_concurrent_stores_never_mix_writers() {
    let dir = TempDir::new().unwrap();
    let store = CacheStore::open(dir.path()).unwrap();
    let key = CacheKey::from_url("http://www.example.com/race");

    let mut tasks = Vec::new();
    for writer in 0..16u8 {
        let store = store.clone();
        let key = key.clone();
        tasks.push(tokio::spawn(async move {
            store.store(&key, &vec![writer; 256 * 1024]).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let entry = store.lookup(&key).await.unwrap().unwrap();
    assert_eq!(entry.len(), 256 * 1024);
    assert!(entry.iter().all(|&b| b == entry[0]));

    // No temporary files left behind
    let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(files.len(), 1);
}

#[tokio::test]
async fn test_unreadable_entry_is_an_error() {
    let dir = TempDir::new().unwrap();
    let store = CacheStore::open(dir.path()).unwrap();
    let key = CacheKey::from_url("http://www.example.com/dir");
    std::fs::create_dir(store.path_for(&key)).unwrap();

    let err = store.lookup(&key).await.unwrap_err();
    assert_eq!(err.path, store.path_for(&key));
}

#[tokio::test]
async fn test_store_into_missing_root_fails() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("cache");
    let store = CacheStore::open(&root).unwrap();
    std::fs::remove_dir(&root).unwrap();

    let key = CacheKey::from_url("http://www.example.com/");
    assert!(store.store(&key, b"data").await.is_err());
    assert!(store.lookup(&key).await.unwrap().is_none());
}
