//! Filesystem adapter for the object storage port.
//!
//! Keys are upstream attachment ids (hex strings), stored as flat files
//! under a configured directory.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::ErrorKind;

use super::ObjectStore;
use crate::error::WardenError;

/// Blob store over a local directory.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Creates a store rooted at `root`. The directory is created on the
    /// first write.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Rejects keys that could escape the root directory.
    fn path_for(&self, key: &str) -> Result<PathBuf, WardenError> {
        if key.is_empty()
            || key
                .chars()
                .any(|c| !c.is_ascii_alphanumeric() && c != '-' && c != '_')
        {
            return Err(WardenError::ObjectStorage(format!(
                "invalid object key: {key:?}"
            )));
        }
        Ok(self.root.join(key))
    }
}

fn storage_err(e: std::io::Error) -> WardenError {
    WardenError::ObjectStorage(e.to_string())
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), WardenError> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(storage_err)?;
        tokio::fs::write(&path, bytes).await.map_err(storage_err)
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, WardenError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), WardenError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_err(e)),
        }
    }
}
