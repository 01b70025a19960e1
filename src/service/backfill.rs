//! Initial backup sweep for a freshly enabled board.
//!
//! The webhook stream only covers changes from subscription time onward,
//! so enabling a board triggers one full fetch of its labels, cards,
//! attachments, checklists, checkitems and comment actions, each fed
//! through the apply path as a synthetic creation-type event. Afterwards
//! the backup store holds the same records the event stream would have
//! built.

use crate::domain::{Action, Board, Checklist, EventData, EventKind};
use crate::error::WardenError;
use crate::service::apply::Applier;
use crate::trello::ApiClient;

fn board_path(board_id: &str) -> String {
    format!(
        "/1/boards/{board_id}?fields=id,shortLink,name&lists=none\
         &labels=all&label_fields=id,color,name&labels_limit=1000\
         &cards=all&card_fields=id,name,shortLink,desc,due,dueComplete,closed,\
         idAttachmentCover,idList,idLabels,idChecklists,idMembers\
         &card_members=false&card_attachments=true&card_attachment_fields=url,name"
    )
}

fn checklists_path(card_id: &str) -> String {
    format!("/1/cards/{card_id}/checklists?checkItems=all&checkItem_fields=name,pos,state&fields=name,pos")
}

fn comments_path(board_id: &str) -> String {
    format!(
        "/1/boards/{board_id}/actions?filter=commentCard&limit=1000&fields=id,date,data\
         &memberCreator=true&memberCreator_fields=id,username"
    )
}

fn synthetic(kind: EventKind, data: EventData) -> Action {
    Action {
        kind,
        data,
        ..Action::default()
    }
}

impl Applier {
    /// Sweeps a board's current state into the backup store.
    ///
    /// Individual apply failures are logged and skipped so one bad object
    /// cannot abort the rest of the sweep.
    ///
    /// # Errors
    ///
    /// Fails when the board itself cannot be fetched.
    pub async fn initial_backup(
        &self,
        client: &ApiClient,
        board_id: &str,
    ) -> Result<(), WardenError> {
        tracing::info!(board = board_id, "performing initial backup sweep");
        let board: Board = client.get(&board_path(board_id)).await?;
        let slim = Board {
            id: board.id.clone(),
            ..Board::default()
        };

        for label in &board.labels {
            let data = EventData {
                board: slim.clone(),
                label: label.clone(),
                ..EventData::default()
            };
            self.sweep(client, synthetic(EventKind::CreateLabel, data)).await;
        }

        for card in &board.cards {
            let data = EventData {
                board: slim.clone(),
                card: card.clone(),
                ..EventData::default()
            };
            self.sweep(client, synthetic(EventKind::CreateCard, data)).await;

            for attachment in &card.attachments {
                let data = EventData {
                    board: slim.clone(),
                    card: card.clone(),
                    attachment: attachment.clone(),
                    ..EventData::default()
                };
                self.sweep(client, synthetic(EventKind::AddAttachmentToCard, data))
                    .await;
            }

            let checklists: Vec<Checklist> =
                match client.get(&checklists_path(&card.id)).await {
                    Ok(checklists) => checklists,
                    Err(e) => {
                        tracing::warn!(card = card.id, error = %e,
                            "failed to fetch checklists during sweep");
                        continue;
                    }
                };
            for checklist in checklists {
                let data = EventData {
                    board: slim.clone(),
                    card: card.clone(),
                    checklist: checklist.clone(),
                    ..EventData::default()
                };
                self.sweep(client, synthetic(EventKind::AddChecklistToCard, data))
                    .await;

                for check_item in &checklist.check_items {
                    let data = EventData {
                        board: slim.clone(),
                        card: card.clone(),
                        checklist: checklist.clone(),
                        check_item: check_item.clone(),
                        ..EventData::default()
                    };
                    self.sweep(client, synthetic(EventKind::CreateCheckItem, data))
                        .await;
                }
            }
        }

        let comment_actions: Vec<Action> = client.get(&comments_path(board_id)).await?;
        for mut action in comment_actions {
            action.kind = EventKind::CommentCard;
            action.data.board = slim.clone();
            self.sweep(client, action).await;
        }

        tracing::info!(board = board_id, "initial backup sweep finished");
        Ok(())
    }

    async fn sweep(&self, client: &ApiClient, action: Action) {
        if let Err(e) = self.apply(client, &action).await {
            tracing::warn!(event = action.kind.as_str(), error = %e,
                "failed to mirror object during sweep");
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::cache::{MemoryTtlCache, ReplicationGuard};
    use crate::domain::{Card, Label};
    use crate::persistence::memory::MemoryStore;
    use crate::persistence::{fetch_entity, BackupStore};
    use crate::service::attachments::AttachmentReplicator;
    use crate::storage::memory::MemoryObjectStore;
    use crate::trello::recording::RecordingTransport;
    use crate::trello::ApiMethod;

    #[tokio::test]
    async fn sweep_mirrors_board_contents() {
        let store = Arc::new(MemoryStore::new());
        let guard = ReplicationGuard::new(Arc::new(MemoryTtlCache::new()), Duration::from_secs(60));
        let replicator = AttachmentReplicator::new(Arc::new(MemoryObjectStore::new()), guard);
        let backup = Arc::clone(&store);
        let applier = Applier::new(backup, replicator, Duration::ZERO);

        let transport = Arc::new(RecordingTransport::new());
        transport.stub(
            ApiMethod::Get,
            &board_path("b1"),
            json!({
                "id": "b1",
                "name": "roadmap",
                "labels": [{"id": "l1", "name": "urgent", "color": "red"}],
                "cards": [{
                    "id": "c1", "name": "task", "idList": "li1",
                    "idChecklists": ["cl1"],
                    "attachments": [{"id": "att1", "name": "docs", "url": "https://example.com/docs"}]
                }]
            }),
        );
        transport.stub(
            ApiMethod::Get,
            &checklists_path("c1"),
            json!([{
                "id": "cl1", "name": "steps",
                "checkItems": [{"id": "i1", "name": "step one", "state": "incomplete"}]
            }]),
        );
        transport.stub(
            ApiMethod::Get,
            &comments_path("b1"),
            json!([{
                "type": "commentCard",
                "id": "act1",
                "date": "2026-03-14T09:26:53.589Z",
                "memberCreator": {"id": "u1", "username": "casey"},
                "data": {"board": {"id": "b1"}, "card": {"id": "c1"}, "text": "kickoff"}
            }]),
        );
        let client = ApiClient::new(transport);

        let Ok(()) = applier.initial_backup(&client, "b1").await else {
            panic!("sweep succeeds");
        };
        // Let the detached secondary saves land.
        tokio::task::yield_now().await;

        let Ok(Some(label)) = fetch_entity::<Label>(store.as_ref(), "l1").await else {
            panic!("label mirrored");
        };
        assert_eq!(label.name, "urgent");

        let Ok(Some(card)) = fetch_entity::<Card>(store.as_ref(), "c1").await else {
            panic!("card mirrored");
        };
        assert_eq!(card.name.as_deref(), Some("task"));
        assert_eq!(card.id_checklists, vec!["cl1".to_string()]);

        let Ok(Some(checklist)) = fetch_entity::<Checklist>(store.as_ref(), "cl1").await else {
            panic!("checklist mirrored");
        };
        assert_eq!(checklist.id_check_items, vec!["i1".to_string()]);

        let Ok(comments) = store.take_comments("c1").await else {
            panic!("take_comments succeeds");
        };
        assert_eq!(
            comments.first().map(|c| c.text.clone()),
            Some("kickoff".to_string())
        );
    }
}
