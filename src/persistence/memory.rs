//! In-memory backup store for tests.
//!
//! Executes the same patch algebra as the PostgreSQL statements via
//! [`crate::domain::merge`], which is what lets the store-level properties
//! (idempotence, commutativity, cascade behavior) run without a database.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::models::BoardRegistration;
use super::{BackupStore, BoardRegistry};
use crate::domain::entities::Comment;
use crate::domain::merge::{ListPatch, patch_list, shallow_merge};
use crate::error::WardenError;

/// Test double for [`BackupStore`] and [`BoardRegistry`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, (String, Map<String, Value>)>>,
    boards: RwLock<HashMap<String, BoardRegistration>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a board for dispatcher tests.
    pub async fn register_board(&self, registration: BoardRegistration) {
        self.boards
            .write()
            .await
            .insert(registration.id.clone(), registration);
    }

    /// Number of backup records currently held.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// True when no backup records are held.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

fn object_of(doc: &Value) -> Map<String, Value> {
    doc.as_object().cloned().unwrap_or_default()
}

#[async_trait]
impl BackupStore for MemoryStore {
    async fn save(&self, id: &str, board_id: &str, doc: &Value) -> Result<(), WardenError> {
        let patch = object_of(doc);
        let mut records = self.records.write().await;
        let entry = records
            .entry(id.to_string())
            .or_insert_with(|| (board_id.to_string(), Map::new()));
        entry.0 = board_id.to_string();
        shallow_merge(&mut entry.1, patch);
        Ok(())
    }

    async fn patch_list(
        &self,
        id: &str,
        board_id: &str,
        seed: &Value,
        field: &str,
        patch: &ListPatch,
    ) -> Result<(), WardenError> {
        let seed = object_of(seed);
        let mut records = self.records.write().await;
        let existing = records.get(id).map(|(_, doc)| doc.clone());
        let doc = patch_list(existing.as_ref(), &seed, field, patch);
        records.insert(id.to_string(), (board_id.to_string(), doc));
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<Option<Value>, WardenError> {
        Ok(self
            .records
            .read()
            .await
            .get(id)
            .map(|(_, doc)| Value::Object(doc.clone())))
    }

    async fn delete(&self, id: &str, board_id: &str) -> Result<(), WardenError> {
        let mut records = self.records.write().await;
        if records.get(id).is_some_and(|(board, _)| board == board_id) {
            records.remove(id);
        }
        Ok(())
    }

    async fn cards_with_label(&self, label_id: &str) -> Result<Vec<String>, WardenError> {
        let records = self.records.read().await;
        let mut ids: Vec<String> = records
            .iter()
            .filter(|(_, (_, doc))| {
                doc.get("idLabels")
                    .and_then(Value::as_array)
                    .is_some_and(|labels| {
                        labels.iter().any(|l| l.as_str() == Some(label_id))
                    })
            })
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn find_converted_checkitem(
        &self,
        name: &str,
        checklist_id: &str,
    ) -> Result<Option<String>, WardenError> {
        let records = self.records.read().await;
        let member_ids: Vec<String> = records
            .get(checklist_id)
            .and_then(|(_, doc)| doc.get("idCheckItems"))
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Ok(records
            .iter()
            .find(|(id, (_, doc))| {
                doc.get("name").and_then(Value::as_str) == Some(name)
                    && !doc.contains_key("shortLink")
                    && member_ids.iter().any(|m| m == *id)
            })
            .map(|(id, _)| id.clone()))
    }

    async fn take_comments(&self, card_id: &str) -> Result<Vec<Comment>, WardenError> {
        let mut records = self.records.write().await;
        let Some((_, doc)) = records.get_mut(card_id) else {
            return Ok(Vec::new());
        };
        let raw = doc
            .remove("comments")
            .and_then(|v| v.as_array().cloned())
            .unwrap_or_default();

        // Keep the latest entry per comment id, then order by date.
        let mut by_id: HashMap<String, Comment> = HashMap::new();
        for value in raw {
            if let Ok(comment) = serde_json::from_value::<Comment>(value) {
                match by_id.get(&comment.id) {
                    Some(existing) if existing.date >= comment.date => {}
                    _ => {
                        by_id.insert(comment.id.clone(), comment);
                    }
                }
            }
        }
        let mut comments: Vec<Comment> = by_id
            .into_values()
            .filter(|c| !c.text.is_empty())
            .collect();
        comments.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(comments)
    }
}

#[async_trait]
impl BoardRegistry for MemoryStore {
    async fn lookup(&self, board_id: &str) -> Result<Option<BoardRegistration>, WardenError> {
        Ok(self.boards.read().await.get(board_id).cloned())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::persistence::fetch_entity;

    #[tokio::test]
    async fn save_twice_is_idempotent() {
        let store = MemoryStore::new();
        let doc = serde_json::json!({"id": "c1", "name": "task", "idLabels": ["l1"]});
        let Ok(()) = store.save("c1", "b1", &doc).await else {
            panic!("save succeeds");
        };
        let Ok(()) = store.save("c1", "b1", &doc).await else {
            panic!("save succeeds");
        };
        let Ok(Some(stored)) = store.fetch("c1").await else {
            panic!("record exists");
        };
        assert_eq!(stored, doc);
    }

    #[tokio::test]
    async fn save_then_fetch_is_a_superset() {
        let store = MemoryStore::new();
        let Ok(()) = store
            .save("c1", "b1", &serde_json::json!({"name": "task", "pos": 3.0}))
            .await
        else {
            panic!("save succeeds");
        };
        let Ok(()) = store
            .save("c1", "b1", &serde_json::json!({"desc": "details"}))
            .await
        else {
            panic!("save succeeds");
        };
        let Ok(Some(stored)) = store.fetch("c1").await else {
            panic!("record exists");
        };
        let Some(obj) = stored.as_object() else {
            panic!("document is an object");
        };
        assert_eq!(obj.get("name"), Some(&serde_json::json!("task")));
        assert_eq!(obj.get("pos"), Some(&serde_json::json!(3.0)));
        assert_eq!(obj.get("desc"), Some(&serde_json::json!("details")));
    }

    #[tokio::test]
    async fn concurrent_opposite_patches_converge() {
        let seed = serde_json::json!({"id": "c1"});
        let add = ListPatch::Add(serde_json::json!("m2"));
        let remove = ListPatch::Remove("m1".to_string());

        let one = MemoryStore::new();
        let base = serde_json::json!({"idMembers": ["m1"]});
        let Ok(()) = one.save("c1", "b1", &base).await else {
            panic!("save succeeds");
        };
        let Ok(()) = one.patch_list("c1", "b1", &seed, "idMembers", &add).await else {
            panic!("patch succeeds");
        };
        let Ok(()) = one
            .patch_list("c1", "b1", &seed, "idMembers", &remove)
            .await
        else {
            panic!("patch succeeds");
        };

        let two = MemoryStore::new();
        let Ok(()) = two.save("c1", "b1", &base).await else {
            panic!("save succeeds");
        };
        let Ok(()) = two
            .patch_list("c1", "b1", &seed, "idMembers", &remove)
            .await
        else {
            panic!("patch succeeds");
        };
        let Ok(()) = two.patch_list("c1", "b1", &seed, "idMembers", &add).await else {
            panic!("patch succeeds");
        };

        let (Ok(Some(a)), Ok(Some(b))) = (one.fetch("c1").await, two.fetch("c1").await) else {
            panic!("records exist");
        };
        assert_eq!(a.get("idMembers"), b.get("idMembers"));
        assert_eq!(a.get("idMembers"), Some(&serde_json::json!(["m2"])));
    }

    #[tokio::test]
    async fn delete_is_board_scoped() {
        let store = MemoryStore::new();
        let Ok(()) = store.save("c1", "b1", &serde_json::json!({"id": "c1"})).await else {
            panic!("save succeeds");
        };
        let Ok(()) = store.delete("c1", "other-board").await else {
            panic!("delete succeeds");
        };
        let Ok(Some(_)) = store.fetch("c1").await else {
            panic!("record survives a mismatched board id");
        };
        let Ok(()) = store.delete("c1", "b1").await else {
            panic!("delete succeeds");
        };
        let Ok(None) = store.fetch("c1").await else {
            panic!("record is gone");
        };
    }

    #[tokio::test]
    async fn take_comments_dedups_orders_and_strips() {
        let store = MemoryStore::new();
        let doc = serde_json::json!({
            "id": "c1",
            "comments": [
                {"id": "m2", "date": "2026-02-01T10:00:00.000Z", "text": "second"},
                {"id": "m1", "date": "2026-01-01T10:00:00.000Z", "text": "first"},
                {"id": "m1", "date": "2026-01-02T10:00:00.000Z", "text": "first edited"},
                {"id": "m3", "date": "2026-03-01T10:00:00.000Z", "text": ""}
            ]
        });
        let Ok(()) = store.save("c1", "b1", &doc).await else {
            panic!("save succeeds");
        };
        let Ok(comments) = store.take_comments("c1").await else {
            panic!("take succeeds");
        };
        assert_eq!(comments.len(), 2);
        assert_eq!(comments.first().map(|c| c.text.as_str()), Some("first edited"));
        assert_eq!(comments.last().map(|c| c.text.as_str()), Some("second"));

        let Ok(Some(stored)) = store.fetch("c1").await else {
            panic!("record exists");
        };
        assert!(stored.get("comments").is_none());
    }

    #[tokio::test]
    async fn converted_checkitem_lookup_requires_containment() {
        let store = MemoryStore::new();
        let Ok(()) = store
            .save("i1", "b1", &serde_json::json!({"id": "i1", "name": "step"}))
            .await
        else {
            panic!("save succeeds");
        };
        let Ok(()) = store
            .save(
                "cl1",
                "b1",
                &serde_json::json!({"id": "cl1", "idCheckItems": ["i1"]}),
            )
            .await
        else {
            panic!("save succeeds");
        };
        // A card with the same name must not match: it has a shortLink.
        let Ok(()) = store
            .save(
                "c9",
                "b1",
                &serde_json::json!({"id": "c9", "name": "step", "shortLink": "sl"}),
            )
            .await
        else {
            panic!("save succeeds");
        };

        let Ok(found) = store.find_converted_checkitem("step", "cl1").await else {
            panic!("lookup succeeds");
        };
        assert_eq!(found.as_deref(), Some("i1"));

        let Ok(missing) = store.find_converted_checkitem("step", "other").await else {
            panic!("lookup succeeds");
        };
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn fetch_entity_deserializes_documents() {
        let store = MemoryStore::new();
        let Ok(()) = store
            .save(
                "a1",
                "b1",
                &serde_json::json!({"id": "a1", "name": "file.png", "url": "https://x/y"}),
            )
            .await
        else {
            panic!("save succeeds");
        };
        let Ok(Some(attachment)) =
            fetch_entity::<crate::domain::Attachment>(&store, "a1").await
        else {
            panic!("entity decodes");
        };
        assert_eq!(attachment.name.as_deref(), Some("file.png"));
    }
}
