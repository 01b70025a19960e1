//! Short-TTL cache port and the two consumers built on it: the admin cache
//! and the attachment replication guard.
//!
//! The backend is Redis when `REDIS_URL` is configured, otherwise an
//! in-process TTL map. Cache failures are never allowed to change an
//! authorization outcome: a failed read is a miss, a failed write is logged
//! and dropped.

pub mod memory;
pub mod redis;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::WardenError;

pub use memory::MemoryTtlCache;
pub use redis::RedisTtlCache;

/// Get/set string values with a per-entry time-to-live.
#[async_trait]
pub trait TtlCache: Send + Sync + std::fmt::Debug {
    /// Fetches a value; expired and absent entries both return `None`.
    async fn get(&self, key: &str) -> Result<Option<String>, WardenError>;

    /// Stores a value for `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), WardenError>;
}

/// Sentinel value marking a key as present.
const FLAG: &str = "t";

/// Memoizes confirmed board/org administrators.
///
/// Presence of an entry means confirmed admin; absence means unknown, never
/// "not admin" — denial is always re-checked against the external API.
#[derive(Debug, Clone)]
pub struct AdminCache {
    cache: Arc<dyn TtlCache>,
    ttl: Duration,
}

impl AdminCache {
    /// Creates an admin cache over the given backend.
    #[must_use]
    pub fn new(cache: Arc<dyn TtlCache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    fn key(board_id: &str, user_id: &str) -> String {
        format!("admin:{board_id}:{user_id}")
    }

    /// True when the user is a cached, confirmed admin of the board.
    pub async fn is_confirmed_admin(&self, board_id: &str, user_id: &str) -> bool {
        match self.cache.get(&Self::key(board_id, user_id)).await {
            Ok(value) => value.as_deref() == Some(FLAG),
            Err(e) => {
                tracing::warn!(board = board_id, user = user_id, error = %e,
                    "admin cache read failed; treating as miss");
                false
            }
        }
    }

    /// Records a confirmed admin. Failures are logged and dropped.
    pub async fn confirm_admin(&self, board_id: &str, user_id: &str) {
        if let Err(e) = self
            .cache
            .set(&Self::key(board_id, user_id), FLAG, self.ttl)
            .await
        {
            tracing::warn!(board = board_id, user = user_id, error = %e,
                "failed to cache admin confirmation");
        }
    }
}

/// De-duplication guard for attachment replication.
///
/// Replicating an attachment makes the upstream system emit another
/// attachment event; the guard, keyed by card and filename, stops that
/// side-effect event (and plain duplicate deliveries) from replicating
/// again within the TTL.
#[derive(Debug, Clone)]
pub struct ReplicationGuard {
    cache: Arc<dyn TtlCache>,
    ttl: Duration,
}

impl ReplicationGuard {
    /// Creates a guard over the given backend.
    #[must_use]
    pub fn new(cache: Arc<dyn TtlCache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    fn key(card_id: &str, file_name: &str) -> String {
        format!("replicate-attachment:{card_id}/{file_name}")
    }

    /// Attempts to claim the replication slot for this card + filename.
    /// Returns `false` when a claim already exists within the TTL.
    pub async fn try_acquire(&self, card_id: &str, file_name: &str) -> bool {
        let key = Self::key(card_id, file_name);
        match self.cache.get(&key).await {
            Ok(Some(value)) if value == FLAG => return false,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(card = card_id, file = file_name, error = %e,
                    "replication guard read failed; proceeding");
            }
        }
        if let Err(e) = self.cache.set(&key, FLAG, self.ttl).await {
            tracing::warn!(card = card_id, file = file_name, error = %e,
                "failed to set replication guard");
        }
        true
    }
}
