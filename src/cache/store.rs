//! On-disk response store
//!
//! One file per cache key under the cache root, holding the verbatim
//! response bytes. There is no index: a file existing is the only signal
//! that an entry exists. Writes go to a temporary file in the same
//! directory and are renamed into place, so readers see either the whole
//! previous entry, the whole new one, or nothing.

use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

/// Fingerprint of a request URL.
///
/// Only the URL contributes; method, headers and body do not.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn from_url(url: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        CacheKey(hex::encode(hasher.finalize()))
    }

    /// The key as a lowercase hex string; also the entry's file name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("cache I/O error on {}: {source}", .path.display())]
pub struct CacheIoError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Cache-aside response store.
///
/// The store never fetches anything itself; callers look up, fetch on a
/// miss, and store explicitly.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    /// Opens the store, creating the cache root if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CacheIoError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| CacheIoError {
            path: root.clone(),
            source,
        })?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.as_str())
    }

    /// Reads the full entry for `key`, or `None` when there is none.
    pub async fn lookup(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheIoError> {
        let path = self.path_for(key);

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CacheIoError { path, source }),
        }
    }

    /// Durably writes `bytes` as the entry for `key`, replacing any
    /// previous entry.
    pub async fn store(&self, key: &CacheKey, bytes: &[u8]) -> Result<(), CacheIoError> {
        let root = self.root.clone();
        let path = self.path_for(key);
        let bytes = bytes.to_vec();

        let dest = path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&root, &dest, &bytes))
            .await
            .map_err(|e| CacheIoError {
                path: path.clone(),
                source: io::Error::other(e),
            })?
            .map_err(|source| CacheIoError { path, source })
    }
}

fn write_atomically(dir: &Path, dest: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}
