//! Replication of uploaded attachment content into object storage, and
//! its restoration onto a card.
//!
//! Only attachments hosted by the upstream system's own upload bucket are
//! replicated; plain link attachments carry no content of their own and
//! are restored by re-posting the link. Restoring an uploaded attachment
//! makes the upstream system emit a fresh attachment event, which the
//! [`ReplicationGuard`](crate::cache::ReplicationGuard) stops from
//! replicating a second copy.

use std::sync::Arc;

use crate::cache::ReplicationGuard;
use crate::domain::Attachment;
use crate::error::WardenError;
use crate::storage::ObjectStore;
use crate::trello::ApiClient;

/// Copies uploaded attachment bytes into object storage and back.
#[derive(Debug, Clone)]
pub struct AttachmentReplicator {
    storage: Arc<dyn ObjectStore>,
    guard: ReplicationGuard,
}

impl AttachmentReplicator {
    /// Creates a replicator over the given object store and guard.
    #[must_use]
    pub fn new(storage: Arc<dyn ObjectStore>, guard: ReplicationGuard) -> Self {
        Self { storage, guard }
    }

    /// Downloads an uploaded attachment and stores its bytes keyed by the
    /// attachment id. Returns `false` when the replication guard reports
    /// the content was already replicated recently (duplicate delivery or
    /// our own restore echoing back).
    ///
    /// # Errors
    ///
    /// Fails on download or object-store errors; the guard claim is not
    /// released, so a retry within the guard TTL is skipped.
    pub async fn replicate(
        &self,
        client: &ApiClient,
        card_id: &str,
        attachment: &Attachment,
    ) -> Result<bool, WardenError> {
        let name = attachment.name.as_deref().unwrap_or_default();
        if !self.guard.try_acquire(card_id, name).await {
            tracing::debug!(card = card_id, attachment = attachment.id,
                "attachment already replicated; skipping");
            return Ok(false);
        }
        let url = attachment.url.as_deref().ok_or_else(|| {
            WardenError::InvalidRequest("uploaded attachment without a url".to_string())
        })?;
        let bytes = client.transport().download(url).await?;
        self.storage.put(&attachment.id, &bytes).await?;
        tracing::info!(card = card_id, attachment = attachment.id, bytes = bytes.len(),
            "replicated attachment content");
        Ok(true)
    }

    /// Puts a deleted attachment back onto `card_id`.
    ///
    /// Uploaded attachments are re-uploaded from the replicated bytes;
    /// link attachments are re-posted as links.
    ///
    /// # Errors
    ///
    /// Fails when an uploaded attachment has no replicated content, or on
    /// API errors.
    pub async fn restore(
        &self,
        client: &ApiClient,
        card_id: &str,
        attachment: &Attachment,
    ) -> Result<(), WardenError> {
        let path = format!("/1/cards/{card_id}/attachments");
        if attachment.is_uploaded() {
            let Some(bytes) = self.storage.get(&attachment.id).await? else {
                return Err(WardenError::ObjectStorage(format!(
                    "no replicated content for attachment {}",
                    attachment.id
                )));
            };
            let name = attachment.name.as_deref().unwrap_or("attachment");
            client.transport().upload(&path, name, bytes).await?;
        } else {
            let mut link = attachment.clone();
            link.id = String::new();
            client.post_unit(&path, &link).await?;
        }
        Ok(())
    }

    /// Drops replicated content for an attachment. Absent content is fine.
    ///
    /// # Errors
    ///
    /// Fails on object-store errors.
    pub async fn discard(&self, attachment_id: &str) -> Result<(), WardenError> {
        self.storage.delete(attachment_id).await
    }
}
