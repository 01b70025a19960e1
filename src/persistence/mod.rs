//! Backup store and board registry.
//!
//! One backup record per tracked-entity id; ids are globally unique across
//! entity kinds, so every kind shares the `backups` table. All mutating
//! operations are single atomic round trips: the store, not application
//! locks, is what keeps concurrent events per-record consistent.

pub mod models;
pub mod postgres;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::entities::Comment;
use crate::domain::merge::ListPatch;
use crate::error::WardenError;

pub use models::BoardRegistration;
pub use postgres::PostgresStore;

/// The keyed shadow-document store backing both processing paths.
#[async_trait]
pub trait BackupStore: Send + Sync + std::fmt::Debug {
    /// Upserts `doc` under `id`; on conflict, shallow-merges into the
    /// existing document (new fields win, absent fields kept).
    async fn save(&self, id: &str, board_id: &str, doc: &Value) -> Result<(), WardenError>;

    /// Atomically patches the list at `field`: if no record exists, the
    /// list is seeded from `seed`'s copy of it first, then the patch is
    /// applied and the result persisted, all in one statement.
    async fn patch_list(
        &self,
        id: &str,
        board_id: &str,
        seed: &Value,
        field: &str,
        patch: &ListPatch,
    ) -> Result<(), WardenError>;

    /// Fetches the document under `id`. A miss is an expected outcome.
    async fn fetch(&self, id: &str) -> Result<Option<Value>, WardenError>;

    /// Deletes the record under `id`, scoped by board id as a defense
    /// against id collisions across boards.
    async fn delete(&self, id: &str, board_id: &str) -> Result<(), WardenError>;

    /// Ids of all records whose `idLabels` references the given label.
    async fn cards_with_label(&self, label_id: &str) -> Result<Vec<String>, WardenError>;

    /// Locates the backup of a checkitem that was just converted into a
    /// card: same name, no `shortLink` (so not itself a card), contained
    /// in the given checklist's `idCheckItems`.
    async fn find_converted_checkitem(
        &self,
        name: &str,
        checklist_id: &str,
    ) -> Result<Option<String>, WardenError>;

    /// Returns the card's backed-up comments, de-duplicated by id and
    /// ordered by date, and strips them from the record in the same
    /// round trip so a concurrent compensation cannot replay them twice.
    async fn take_comments(&self, card_id: &str) -> Result<Vec<Comment>, WardenError>;
}

/// Read-only view of the control plane's board registrations.
#[async_trait]
pub trait BoardRegistry: Send + Sync + std::fmt::Debug {
    /// Looks up the registration for a board, if any.
    async fn lookup(&self, board_id: &str) -> Result<Option<BoardRegistration>, WardenError>;
}

/// Fetches a record and deserializes it into a typed entity.
///
/// # Errors
///
/// Returns [`WardenError::Store`] on store failure or when the stored
/// document does not fit `T`.
pub async fn fetch_entity<T: DeserializeOwned>(
    store: &dyn BackupStore,
    id: &str,
) -> Result<Option<T>, WardenError> {
    match store.fetch(id).await? {
        None => Ok(None),
        Some(doc) => serde_json::from_value(doc)
            .map(Some)
            .map_err(|e| WardenError::Store(format!("malformed backup document {id}: {e}"))),
    }
}

/// Serializes an entity into the JSON object form the store persists.
///
/// # Errors
///
/// Returns [`WardenError::Store`] when the entity does not serialize to an
/// object.
pub fn to_doc<T: serde::Serialize>(entity: &T) -> Result<Value, WardenError> {
    let value =
        serde_json::to_value(entity).map_err(|e| WardenError::Store(format!("serialize: {e}")))?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(WardenError::Store(
            "backup documents must be JSON objects".to_string(),
        ))
    }
}
