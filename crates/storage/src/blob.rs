// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Key/value blob storage for archived agent artifacts.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Errors from blob store operations
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob not found: {0}")]
    NotFound(String),
    #[error("invalid blob key: {0}")]
    InvalidKey(String),
    #[error("blob store unavailable: {0}")]
    Transient(String),
}

/// Durable store of opaque blobs addressed by `/`-separated keys.
///
/// `put` replaces any existing blob at the key in one step; readers see
/// either the old bytes or the new bytes.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), BlobError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, BlobError>;

    /// All keys starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, BlobError>;
}

/// Blob store backed by a local directory, one file per key.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, BlobError> {
        let rel = Path::new(key);
        let valid = !key.is_empty()
            && rel.components().all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(BlobError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

fn transient(e: impl std::fmt::Display) -> BlobError {
    BlobError::Transient(e.to_string())
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), BlobError> {
        let path = self.path_for(key)?;
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let parent = path.parent().unwrap_or(Path::new("."));
            std::fs::create_dir_all(parent)?;
            // Stage next to the target so the rename stays on one filesystem
            let mut staged = tempfile::Builder::new().prefix(".tmp").tempfile_in(parent)?;
            std::io::Write::write_all(&mut staged, &bytes)?;
            staged.as_file().sync_all()?;
            staged.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(transient)?
        .map_err(transient)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, BlobError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(key.to_string()))
            }
            Err(e) => Err(transient(e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, BlobError> {
        let root = self.root.clone();
        let prefix = prefix.to_string();
        tokio::task::spawn_blocking(move || -> std::io::Result<Vec<String>> {
            let mut keys = Vec::new();
            collect_keys(&root, "", &mut keys)?;
            keys.retain(|k| k.starts_with(&prefix));
            keys.sort();
            Ok(keys)
        })
        .await
        .map_err(transient)?
        .map_err(transient)
    }
}

/// Walk `dir`, pushing `/`-joined keys for every regular file.
fn collect_keys(dir: &Path, rel: &str, out: &mut Vec<String>) -> std::io::Result<()> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    for entry in entries {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        // in-flight puts
        if name.starts_with(".tmp") {
            continue;
        }
        let key = if rel.is_empty() { name } else { format!("{rel}/{name}") };
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_keys(&entry.path(), &key, out)?;
        } else if file_type.is_file() {
            out.push(key);
        }
    }
    Ok(())
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{BlobError, BlobStore};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::{BTreeMap, HashSet};
    use std::sync::Arc;

    #[derive(Default)]
    struct State {
        blobs: BTreeMap<String, Vec<u8>>,
        puts: Vec<String>,
        gets: Vec<String>,
        failing: HashSet<String>,
        fail_list: bool,
    }

    /// In-memory blob store with call recording and failure injection.
    #[derive(Clone, Default)]
    pub struct MemoryBlobStore {
        inner: Arc<Mutex<State>>,
    }

    impl MemoryBlobStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed a blob without recording a put.
        pub fn insert(&self, key: impl Into<String>, bytes: Vec<u8>) {
            self.inner.lock().blobs.insert(key.into(), bytes);
        }

        pub fn blob(&self, key: &str) -> Option<Vec<u8>> {
            self.inner.lock().blobs.get(key).cloned()
        }

        pub fn keys(&self) -> Vec<String> {
            self.inner.lock().blobs.keys().cloned().collect()
        }

        /// Keys passed to `put`, in call order.
        pub fn puts(&self) -> Vec<String> {
            self.inner.lock().puts.clone()
        }

        /// Keys passed to `get`, in call order.
        pub fn gets(&self) -> Vec<String> {
            self.inner.lock().gets.clone()
        }

        /// Make `put` and `get` on `key` fail with a transient error.
        pub fn fail_key(&self, key: impl Into<String>) {
            self.inner.lock().failing.insert(key.into());
        }

        pub fn fail_list(&self, fail: bool) {
            self.inner.lock().fail_list = fail;
        }
    }

    #[async_trait]
    impl BlobStore for MemoryBlobStore {
        async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), BlobError> {
            let mut state = self.inner.lock();
            state.puts.push(key.to_string());
            if state.failing.contains(key) {
                return Err(BlobError::Transient(format!("injected failure for {key}")));
            }
            state.blobs.insert(key.to_string(), bytes);
            Ok(())
        }

        async fn get(&self, key: &str) -> Result<Vec<u8>, BlobError> {
            let mut state = self.inner.lock();
            state.gets.push(key.to_string());
            if state.failing.contains(key) {
                return Err(BlobError::Transient(format!("injected failure for {key}")));
            }
            state.blobs.get(key).cloned().ok_or_else(|| BlobError::NotFound(key.to_string()))
        }

        async fn list(&self, prefix: &str) -> Result<Vec<String>, BlobError> {
            let state = self.inner.lock();
            if state.fail_list {
                return Err(BlobError::Transient("injected list failure".to_string()));
            }
            Ok(state.blobs.keys().filter(|k| k.starts_with(prefix)).cloned().collect())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::MemoryBlobStore;

#[cfg(test)]
#[path = "blob_tests.rs"]
mod tests;
