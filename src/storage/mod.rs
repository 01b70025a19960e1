//! Object storage port for replicated attachment bytes, keyed by
//! attachment id.

pub mod fs;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;

use crate::error::WardenError;

pub use fs::FsObjectStore;

/// Put/get/delete blobs by key.
#[async_trait]
pub trait ObjectStore: Send + Sync + std::fmt::Debug {
    /// Stores `bytes` under `key`, replacing any previous content.
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), WardenError>;

    /// Fetches the blob under `key`; `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, WardenError>;

    /// Deletes the blob under `key`; deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), WardenError>;
}
