//! The apply path: mirroring an authorized change into the backup store.
//!
//! Every transition is expressed against the store's three shapes: a
//! snapshot save (shallow merge of the event payload), an atomic list
//! patch (membership-style fields), or a cascading delete that walks
//! structural references leaves-first. Secondary effects, like mirroring
//! the label snapshot when a label is attached to a card, run on detached
//! tasks whose failures are only logged.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::domain::merge::ListPatch;
use crate::domain::{Action, Card, Checklist, Comment, EventData, EventKind};
use crate::error::WardenError;
use crate::persistence::{fetch_entity, to_doc, BackupStore};
use crate::service::attachments::AttachmentReplicator;
use crate::trello::ApiClient;

/// Mirrors authorized changes into the backup store.
#[derive(Debug, Clone)]
pub struct Applier {
    store: Arc<dyn BackupStore>,
    replicator: AttachmentReplicator,
    move_settle_delay: Duration,
}

impl Applier {
    /// Creates an applier over the given store and replicator.
    #[must_use]
    pub fn new(
        store: Arc<dyn BackupStore>,
        replicator: AttachmentReplicator,
        move_settle_delay: Duration,
    ) -> Self {
        Self {
            store,
            replicator,
            move_settle_delay,
        }
    }

    /// The backup store this applier writes to.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn BackupStore> {
        &self.store
    }

    /// Mirrors one authorized event into the backup store.
    ///
    /// # Errors
    ///
    /// Store and replication failures propagate; already-applied sub-steps
    /// are not rolled back.
    pub async fn apply(&self, client: &ApiClient, action: &Action) -> Result<(), WardenError> {
        let board_id = action.data.board.id.clone();
        let data = &action.data;

        match action.kind {
            EventKind::CreateCard | EventKind::CopyCard | EventKind::ConvertToCardFromCheckItem => {
                self.save(&data.card.id, &board_id, &data.card).await?;
            }
            EventKind::MoveCardToBoard => {
                // Give the source board's webhook time to finish its
                // cascade delete before this board recreates the records.
                tokio::time::sleep(self.move_settle_delay).await;
                self.save(&data.card.id, &board_id, &data.card).await?;
            }
            EventKind::DeleteCard | EventKind::MoveCardFromBoard => {
                self.cascade_delete_card(&board_id, &data.card.id).await?;
            }
            EventKind::UpdateCard => {
                self.save(&data.card.id, &board_id, &data.card).await?;
            }
            EventKind::AddMemberToCard => {
                self.patch(data, "idMembers", ListPatch::Add(Value::String(data.id_member.clone())))
                    .await?;
            }
            EventKind::RemoveMemberFromCard => {
                self.patch(data, "idMembers", ListPatch::Remove(data.id_member.clone()))
                    .await?;
            }
            EventKind::AddLabelToCard => {
                self.spawn_save(&data.label.id, &board_id, &data.label);
                self.patch(data, "idLabels", ListPatch::Add(Value::String(data.label.id.clone())))
                    .await?;
            }
            EventKind::RemoveLabelFromCard => {
                self.spawn_save(&data.label.id, &board_id, &data.label);
                self.patch(data, "idLabels", ListPatch::Remove(data.label.id.clone()))
                    .await?;
            }
            EventKind::CreateLabel | EventKind::UpdateLabel => {
                self.save(&data.label.id, &board_id, &data.label).await?;
            }
            EventKind::DeleteLabel => {
                self.store.delete(&data.label.id, &board_id).await?;
            }
            EventKind::AddChecklistToCard => {
                self.spawn_save(&data.checklist.id, &board_id, &data.checklist);
                self.patch(
                    data,
                    "idChecklists",
                    ListPatch::Add(Value::String(data.checklist.id.clone())),
                )
                .await?;
            }
            EventKind::UpdateChecklist => {
                self.save(&data.checklist.id, &board_id, &data.checklist).await?;
            }
            EventKind::RemoveChecklistFromCard => {
                self.delete_checklist(&board_id, &data.checklist.id).await?;
                self.patch(data, "idChecklists", ListPatch::Remove(data.checklist.id.clone()))
                    .await?;
            }
            EventKind::CreateCheckItem => {
                self.spawn_save(&data.check_item.id, &board_id, &data.check_item);
                let seed = to_doc(&data.checklist)?;
                self.store
                    .patch_list(
                        &data.checklist.id,
                        &board_id,
                        &seed,
                        "idCheckItems",
                        &ListPatch::Add(Value::String(data.check_item.id.clone())),
                    )
                    .await?;
            }
            EventKind::UpdateCheckItem | EventKind::UpdateCheckItemStateOnCard => {
                self.save(&data.check_item.id, &board_id, &data.check_item).await?;
            }
            EventKind::DeleteCheckItem => {
                self.store.delete(&data.check_item.id, &board_id).await?;
                let seed = to_doc(&data.checklist)?;
                self.store
                    .patch_list(
                        &data.checklist.id,
                        &board_id,
                        &seed,
                        "idCheckItems",
                        &ListPatch::Remove(data.check_item.id.clone()),
                    )
                    .await?;
            }
            EventKind::AddAttachmentToCard => {
                self.save(&data.attachment.id, &board_id, &data.attachment).await?;
                self.patch(
                    data,
                    "idAttachments",
                    ListPatch::Add(Value::String(data.attachment.id.clone())),
                )
                .await?;
                if data.attachment.is_uploaded() {
                    self.replicator
                        .replicate(client, &data.card.id, &data.attachment)
                        .await?;
                }
            }
            EventKind::DeleteAttachmentFromCard => {
                self.store.delete(&data.attachment.id, &board_id).await?;
                self.patch(
                    data,
                    "idAttachments",
                    ListPatch::Remove(data.attachment.id.clone()),
                )
                .await?;
            }
            EventKind::CommentCard => {
                let comment = Comment {
                    id: action.id.clone(),
                    date: action.date.clone(),
                    text: data.text.clone().unwrap_or_default(),
                    user_id: action.member_creator.id.clone(),
                    username: action.member_creator.username.clone(),
                };
                self.patch(data, "comments", ListPatch::Add(to_doc(&comment)?))
                    .await?;
            }
            EventKind::CreateList
            | EventKind::UpdateList
            | EventKind::MoveListFromBoard
            | EventKind::MoveListToBoard
            | EventKind::UpdateCustomFieldItem
            | EventKind::Other => {
                tracing::debug!(event = action.kind.as_str(), "no backup mirroring for event");
            }
        }

        Ok(())
    }

    async fn save<T: Serialize>(
        &self,
        id: &str,
        board_id: &str,
        entity: &T,
    ) -> Result<(), WardenError> {
        let doc = to_doc(entity)?;
        self.store.save(id, board_id, &doc).await
    }

    /// Detached snapshot save for secondary entities; failures are logged.
    fn spawn_save<T: Serialize>(&self, id: &str, board_id: &str, entity: &T) {
        let doc = match to_doc(entity) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(id, error = %e, "failed to serialize secondary snapshot");
                return;
            }
        };
        let store = Arc::clone(&self.store);
        let id = id.to_string();
        let board_id = board_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = store.save(&id, &board_id, &doc).await {
                tracing::warn!(id, error = %e, "failed to save secondary snapshot");
            }
        });
    }

    /// Patches a list field on the card the event concerns, seeding from
    /// the event's card snapshot.
    async fn patch(
        &self,
        data: &EventData,
        field: &str,
        patch: ListPatch,
    ) -> Result<(), WardenError> {
        let seed = to_doc(&data.card)?;
        self.store
            .patch_list(&data.card.id, &data.board.id, &seed, field, &patch)
            .await
    }

    /// Deletes a card record together with the checklist and checkitem
    /// records it structurally references, leaves first. Missing records
    /// are skipped.
    async fn cascade_delete_card(&self, board_id: &str, card_id: &str) -> Result<(), WardenError> {
        if let Some(card) = fetch_entity::<Card>(self.store.as_ref(), card_id).await? {
            for checklist_id in &card.id_checklists {
                self.delete_checklist(board_id, checklist_id).await?;
            }
        }
        self.store.delete(card_id, board_id).await
    }

    /// Deletes a checklist record and its checkitem records, leaves first.
    async fn delete_checklist(&self, board_id: &str, checklist_id: &str) -> Result<(), WardenError> {
        if let Some(checklist) =
            fetch_entity::<Checklist>(self.store.as_ref(), checklist_id).await?
        {
            for item_id in &checklist.id_check_items {
                self.store.delete(item_id, board_id).await?;
            }
        }
        self.store.delete(checklist_id, board_id).await
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::cache::{MemoryTtlCache, ReplicationGuard};
    use crate::domain::{Attachment, Board, EventData, Label, WebhookEnvelope};
    use crate::persistence::memory::MemoryStore;
    use crate::storage::memory::MemoryObjectStore;
    use crate::trello::recording::RecordingTransport;

    fn applier(store: Arc<MemoryStore>, storage: Arc<MemoryObjectStore>) -> Applier {
        let guard = ReplicationGuard::new(Arc::new(MemoryTtlCache::new()), Duration::from_secs(60));
        Applier::new(store, AttachmentReplicator::new(storage, guard), Duration::ZERO)
    }

    fn client() -> (Arc<RecordingTransport>, ApiClient) {
        let transport = Arc::new(RecordingTransport::new());
        (Arc::clone(&transport), ApiClient::new(transport))
    }

    fn action(raw: serde_json::Value) -> Action {
        let Ok(envelope) = serde_json::from_value::<WebhookEnvelope>(json!({"action": raw})) else {
            panic!("action decodes");
        };
        envelope.action
    }

    #[tokio::test]
    async fn create_card_saves_snapshot() {
        let store = Arc::new(MemoryStore::new());
        let applier = applier(Arc::clone(&store), Arc::new(MemoryObjectStore::new()));
        let (_, client) = client();

        let action = action(json!({
            "type": "createCard",
            "data": {
                "board": {"id": "b1"},
                "card": {"id": "c1", "name": "task", "idList": "li1"}
            }
        }));
        let Ok(()) = applier.apply(&client, &action).await else {
            panic!("apply succeeds");
        };

        let Ok(Some(card)) = fetch_entity::<Card>(store.as_ref(), "c1").await else {
            panic!("card record exists");
        };
        assert_eq!(card.name.as_deref(), Some("task"));
    }

    #[tokio::test]
    async fn label_attach_patches_card_and_mirrors_label() {
        let store = Arc::new(MemoryStore::new());
        let applier = applier(Arc::clone(&store), Arc::new(MemoryObjectStore::new()));
        let (_, client) = client();

        let action = action(json!({
            "type": "addLabelToCard",
            "data": {
                "board": {"id": "b1"},
                "card": {"id": "c1", "name": "task"},
                "label": {"id": "l1", "name": "urgent", "color": "red"}
            }
        }));
        let Ok(()) = applier.apply(&client, &action).await else {
            panic!("apply succeeds");
        };
        // Let the detached label save land.
        tokio::task::yield_now().await;

        let Ok(Some(card)) = fetch_entity::<Card>(store.as_ref(), "c1").await else {
            panic!("card record exists");
        };
        assert_eq!(card.id_labels, vec!["l1".to_string()]);
        let Ok(Some(label)) = fetch_entity::<Label>(store.as_ref(), "l1").await else {
            panic!("label record exists");
        };
        assert_eq!(label.name, "urgent");
    }

    #[tokio::test]
    async fn delete_card_cascades_leaves_first() {
        let store = Arc::new(MemoryStore::new());
        let applier = applier(Arc::clone(&store), Arc::new(MemoryObjectStore::new()));
        let (_, client) = client();

        let Ok(()) = store
            .save("c1", "b1", &json!({"id": "c1", "idChecklists": ["cl1"]}))
            .await
        else {
            panic!("seed card");
        };
        let Ok(()) = store
            .save("cl1", "b1", &json!({"id": "cl1", "idCheckItems": ["i1", "i2"]}))
            .await
        else {
            panic!("seed checklist");
        };
        for id in ["i1", "i2"] {
            let Ok(()) = store.save(id, "b1", &json!({"id": id})).await else {
                panic!("seed checkitem");
            };
        }

        let action = action(json!({
            "type": "deleteCard",
            "data": {"board": {"id": "b1"}, "card": {"id": "c1"}}
        }));
        let Ok(()) = applier.apply(&client, &action).await else {
            panic!("apply succeeds");
        };
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn delete_card_without_backup_succeeds() {
        let store = Arc::new(MemoryStore::new());
        let applier = applier(Arc::clone(&store), Arc::new(MemoryObjectStore::new()));
        let (_, client) = client();

        let action = action(json!({
            "type": "deleteCard",
            "data": {"board": {"id": "b1"}, "card": {"id": "ghost"}}
        }));
        let Ok(()) = applier.apply(&client, &action).await else {
            panic!("apply succeeds on missing record");
        };
    }

    #[tokio::test]
    async fn uploaded_attachment_is_replicated_once() {
        let store = Arc::new(MemoryStore::new());
        let storage = Arc::new(MemoryObjectStore::new());
        let applier = applier(Arc::clone(&store), Arc::clone(&storage));
        let (transport, client) = client();

        let url = "https://trello-attachments.s3.amazonaws.com/x/y/plan.pdf";
        transport.stub_download(url, b"bytes".to_vec());

        let raw = json!({
            "type": "addAttachmentToCard",
            "data": {
                "board": {"id": "b1"},
                "card": {"id": "c1"},
                "attachment": {"id": "att1", "name": "plan.pdf", "url": url}
            }
        });
        let Ok(()) = applier.apply(&client, &action(raw.clone())).await else {
            panic!("first apply succeeds");
        };
        assert_eq!(storage.len().await, 1);

        // A duplicate delivery neither replicates again within the guard TTL
        // nor grows the card's attachment list.
        let Ok(()) = applier.apply(&client, &action(raw)).await else {
            panic!("second apply succeeds");
        };
        assert_eq!(storage.len().await, 1);

        let Ok(Some(card)) = fetch_entity::<Card>(store.as_ref(), "c1").await else {
            panic!("card record exists");
        };
        assert_eq!(card.id_attachments, vec!["att1".to_string()]);
    }

    #[tokio::test]
    async fn comment_is_appended_to_card_record() {
        let store = Arc::new(MemoryStore::new());
        let applier = applier(Arc::clone(&store), Arc::new(MemoryObjectStore::new()));
        let (_, client) = client();

        let action = action(json!({
            "type": "commentCard",
            "id": "act1",
            "date": "2026-03-14T09:26:53.589Z",
            "memberCreator": {"id": "u1", "username": "casey"},
            "data": {
                "board": {"id": "b1"},
                "card": {"id": "c1"},
                "text": "looks good"
            }
        }));
        let Ok(()) = applier.apply(&client, &action).await else {
            panic!("apply succeeds");
        };

        let Ok(comments) = store.take_comments("c1").await else {
            panic!("take_comments succeeds");
        };
        assert_eq!(comments.len(), 1);
        let Some(comment) = comments.first() else {
            panic!("one comment");
        };
        assert_eq!(comment.text, "looks good");
        assert_eq!(comment.username, "casey");
    }

    #[tokio::test]
    async fn member_patches_commute_with_missing_record() {
        let store = Arc::new(MemoryStore::new());
        let applier = applier(Arc::clone(&store), Arc::new(MemoryObjectStore::new()));
        let (_, client) = client();

        // The add event arrives before any snapshot of the card exists;
        // the patch seeds the record from the event payload.
        let add = action(json!({
            "type": "addMemberToCard",
            "data": {
                "board": {"id": "b1"},
                "card": {"id": "c1", "name": "task"},
                "idMember": "u7"
            }
        }));
        let Ok(()) = applier.apply(&client, &add).await else {
            panic!("add applies");
        };
        let Ok(Some(card)) = fetch_entity::<Card>(store.as_ref(), "c1").await else {
            panic!("card record exists");
        };
        assert_eq!(card.id_members, vec!["u7".to_string()]);

        let remove = action(json!({
            "type": "removeMemberFromCard",
            "data": {
                "board": {"id": "b1"},
                "card": {"id": "c1"},
                "idMember": "u7"
            }
        }));
        let Ok(()) = applier.apply(&client, &remove).await else {
            panic!("remove applies");
        };
        let Ok(Some(card)) = fetch_entity::<Card>(store.as_ref(), "c1").await else {
            panic!("card record exists");
        };
        assert!(card.id_members.is_empty());
    }

    #[tokio::test]
    async fn unhandled_events_touch_nothing() {
        let store = Arc::new(MemoryStore::new());
        let applier = applier(Arc::clone(&store), Arc::new(MemoryObjectStore::new()));
        let (transport, client) = client();

        let action = Action {
            kind: EventKind::UpdateCustomFieldItem,
            data: EventData {
                board: Board {
                    id: "b1".to_string(),
                    ..Board::default()
                },
                ..EventData::default()
            },
            ..Action::default()
        };
        let Ok(()) = applier.apply(&client, &action).await else {
            panic!("apply succeeds");
        };
        assert!(store.is_empty().await);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn attachment_filter_ignores_plain_links() {
        let store = Arc::new(MemoryStore::new());
        let storage = Arc::new(MemoryObjectStore::new());
        let applier = applier(Arc::clone(&store), Arc::clone(&storage));
        let (_, client) = client();

        let action = action(json!({
            "type": "addAttachmentToCard",
            "data": {
                "board": {"id": "b1"},
                "card": {"id": "c1"},
                "attachment": {"id": "att1", "name": "docs", "url": "https://example.com/docs"}
            }
        }));
        let Ok(()) = applier.apply(&client, &action).await else {
            panic!("apply succeeds");
        };
        assert!(storage.is_empty().await);
        let Ok(Some(att)) = fetch_entity::<Attachment>(store.as_ref(), "att1").await else {
            panic!("attachment record exists");
        };
        assert_eq!(att.url.as_deref(), Some("https://example.com/docs"));
    }
}
