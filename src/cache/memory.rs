//! In-process TTL cache, used when no Redis URL is configured and in tests.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::TtlCache;
use crate::error::WardenError;

/// A `HashMap` with per-entry expiry. Expired entries are dropped lazily on
/// read and swept on write.
#[derive(Debug, Default)]
pub struct MemoryTtlCache {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl MemoryTtlCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TtlCache for MemoryTtlCache {
    async fn get(&self, key: &str) -> Result<Option<String>, WardenError> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).and_then(|(value, expires)| {
            if *expires > Instant::now() {
                Some(value.clone())
            } else {
                None
            }
        }))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), WardenError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, (_, expires)| *expires > now);
        entries.insert(key.to_string(), (value.to_string(), now + ttl));
        Ok(())
    }
}
