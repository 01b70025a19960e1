//! The compensate path: reversing an unauthorized change through the
//! external API.
//!
//! Each event kind maps to its inverse call, with the backup store
//! supplying any prior state the external API no longer exposes. Reversals
//! that structurally contain other reversals (recreating a deleted card's
//! checklists and attachments) re-enter the same transition function as
//! synthetic sub-events on a bounded work queue, capped in both depth and
//! total fan-out so a pathological payload cannot run away.

use std::collections::VecDeque;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::domain::merge::ListPatch;
use crate::domain::{
    Action, Attachment, Card, CheckItem, Checklist, EntityKind, EventData, EventKind, Label,
    PriorValues,
};
use crate::error::WardenError;
use crate::persistence::fetch_entity;
use crate::service::apply::Applier;
use crate::service::attachments::AttachmentReplicator;
use crate::service::comments::batch_comments;
use crate::trello::ApiClient;

/// Maximum nesting of synthetic sub-events below the delivered one.
const MAX_DEPTH: usize = 4;

/// Maximum number of reversal steps processed for one delivered event.
const MAX_STEPS: usize = 512;

/// Name given to a recreated card whose backup record was missing.
fn placeholder_name(username: &str) -> String {
    format!("--a card that was deleted by {username}--")
}

/// Reverses unauthorized changes via compensating API calls.
#[derive(Debug, Clone)]
pub struct Compensator {
    applier: Applier,
    replicator: AttachmentReplicator,
}

impl Compensator {
    /// Creates a compensator sharing the applier's store and the replicator.
    #[must_use]
    pub fn new(applier: Applier, replicator: AttachmentReplicator) -> Self {
        Self { applier, replicator }
    }

    /// Reverses one unauthorized event, draining any synthetic sub-events
    /// it generates. Step failures are logged; the queue keeps draining.
    pub async fn compensate(&self, client: &ApiClient, action: Action) {
        let mut queue = VecDeque::from([(action, 0usize)]);
        let mut steps = 0usize;

        while let Some((action, depth)) = queue.pop_front() {
            steps += 1;
            if steps > MAX_STEPS {
                tracing::warn!(
                    event = action.kind.as_str(),
                    "reversal fan-out cap reached; dropping remaining sub-events"
                );
                break;
            }

            match self.step(client, &action).await {
                Ok(followups) if followups.is_empty() => {}
                Ok(followups) => {
                    if depth >= MAX_DEPTH {
                        tracing::warn!(
                            event = action.kind.as_str(),
                            dropped = followups.len(),
                            "reversal depth cap reached; dropping sub-events"
                        );
                        continue;
                    }
                    queue.extend(followups.into_iter().map(|a| (a, depth + 1)));
                }
                Err(e) => {
                    tracing::warn!(
                        event = action.kind.as_str(),
                        error = %e,
                        "failed to reverse event"
                    );
                }
            }
        }
    }

    /// One reversal transition; returns synthetic sub-events to process
    /// next.
    async fn step(
        &self,
        client: &ApiClient,
        action: &Action,
    ) -> Result<Vec<Action>, WardenError> {
        let data = &action.data;
        let board_id = &data.board.id;

        match action.kind {
            EventKind::CreateCard | EventKind::CopyCard => {
                client.delete(&format!("/1/cards/{}", data.card.id)).await?;
            }
            EventKind::ConvertToCardFromCheckItem => {
                client.delete(&format!("/1/cards/{}", data.card.id)).await?;
                self.recreate_converted_checkitem(client, data).await?;
            }
            EventKind::MoveCardToBoard => {
                let source = data.board_source.as_ref().map(|b| b.id.as_str()).unwrap_or_default();
                client
                    .put_unit(&format!("/1/cards/{}", data.card.id), &json!({"idBoard": source}))
                    .await?;
            }
            EventKind::MoveCardFromBoard => {
                return self.send_card_back(client, action).await;
            }
            EventKind::DeleteCard => {
                return self.recreate_card(client, action).await;
            }
            EventKind::UpdateCard => {
                if let Some(body) = prior_body(data, EntityKind::Card) {
                    client.put_unit(&format!("/1/cards/{}", data.card.id), &body).await?;
                }
            }
            EventKind::AddMemberToCard => {
                client
                    .delete(&format!("/1/cards/{}/idMembers/{}", data.card.id, data.id_member))
                    .await?;
            }
            EventKind::RemoveMemberFromCard => {
                // The actor is no longer a card member at this point, so a
                // self-removal re-checks as privileged and stays reversed.
                client
                    .post_unit(
                        &format!("/1/cards/{}/idMembers", data.card.id),
                        &json!({"value": data.id_member}),
                    )
                    .await?;
            }
            EventKind::AddLabelToCard => {
                client
                    .delete(&format!("/1/cards/{}/idLabels/{}", data.card.id, data.label.id))
                    .await?;
            }
            EventKind::RemoveLabelFromCard => {
                client
                    .post_unit(
                        &format!("/1/cards/{}/idLabels", data.card.id),
                        &json!({"value": data.label.id}),
                    )
                    .await?;
            }
            EventKind::CreateLabel => {
                client.delete(&format!("/1/labels/{}", data.label.id)).await?;
            }
            EventKind::UpdateLabel => {
                if let Some(body) = prior_body(data, EntityKind::Label) {
                    client.put_unit(&format!("/1/labels/{}", data.label.id), &body).await?;
                }
            }
            EventKind::DeleteLabel => {
                self.recreate_label(client, data, board_id).await?;
            }
            EventKind::AddChecklistToCard => {
                client
                    .delete(&format!("/1/cards/{}/checklists/{}", data.card.id, data.checklist.id))
                    .await?;
            }
            EventKind::UpdateChecklist => {
                if let Some(body) = prior_body(data, EntityKind::Checklist) {
                    client
                        .put_unit(&format!("/1/checklists/{}", data.checklist.id), &body)
                        .await?;
                }
            }
            EventKind::RemoveChecklistFromCard => {
                self.recreate_checklist(client, action).await?;
            }
            EventKind::CreateCheckItem => {
                client
                    .delete(&format!(
                        "/1/checklists/{}/checkItems/{}",
                        data.checklist.id, data.check_item.id
                    ))
                    .await?;
            }
            EventKind::UpdateCheckItem => {
                if let Some(body) = prior_body(data, EntityKind::CheckItem) {
                    client
                        .put_unit(
                            &format!("/1/cards/{}/checkItem/{}", data.card.id, data.check_item.id),
                            &body,
                        )
                        .await?;
                }
            }
            EventKind::UpdateCheckItemStateOnCard => {
                let previous = if data.check_item.state.as_deref() == Some("complete") {
                    "incomplete"
                } else {
                    "complete"
                };
                client
                    .put_unit(
                        &format!("/1/cards/{}/checkItem/{}", data.card.id, data.check_item.id),
                        &json!({"state": previous}),
                    )
                    .await?;
            }
            EventKind::DeleteCheckItem => {
                let item = data.check_item.clone().for_recreation();
                client
                    .post_unit(&format!("/1/checklists/{}/checkItems", data.checklist.id), &item)
                    .await?;
            }
            EventKind::AddAttachmentToCard => {
                client
                    .delete(&format!(
                        "/1/cards/{}/attachments/{}",
                        data.card.id, data.attachment.id
                    ))
                    .await?;
            }
            EventKind::DeleteAttachmentFromCard => {
                self.restore_attachment(client, data, board_id).await?;
            }
            EventKind::CommentCard => {
                // Comment edits and deletions are restricted to the comment
                // owner upstream, so only creation needs reversing.
                client.delete(&format!("/1/actions/{}", action.id)).await?;
            }
            EventKind::CreateList => {
                client
                    .put_unit(
                        &format!("/1/lists/{}", data.list.id),
                        &json!({"name": "_deleted_", "closed": true}),
                    )
                    .await?;
            }
            EventKind::UpdateList => {
                if let Some(body) = prior_body(data, EntityKind::List) {
                    client.put_unit(&format!("/1/lists/{}", data.list.id), &body).await?;
                }
            }
            EventKind::MoveListFromBoard => {
                client
                    .put_unit(&format!("/1/lists/{}", data.list.id), &json!({"idBoard": board_id}))
                    .await?;
            }
            EventKind::MoveListToBoard => {
                let source = data.board_source.as_ref().map(|b| b.id.as_str()).unwrap_or_default();
                client
                    .put_unit(&format!("/1/lists/{}", data.list.id), &json!({"idBoard": source}))
                    .await?;
            }
            EventKind::UpdateCustomFieldItem | EventKind::Other => {
                tracing::debug!(event = action.kind.as_str(), "no reversal for event");
            }
        }

        Ok(Vec::new())
    }

    /// Sends a card moved off the board back to its previous list and
    /// board, restoring position, labels and members from the backup. When
    /// the destination board denies access, the card is unreachable and is
    /// recreated from the backup instead.
    async fn send_card_back(
        &self,
        client: &ApiClient,
        action: &Action,
    ) -> Result<Vec<Action>, WardenError> {
        let data = &action.data;
        let mut card = data.card.clone();
        card.id_board = Some(data.board.id.clone());
        card.id_list = Some(data.list.id.clone());

        if let Some(backed) = fetch_entity::<Card>(self.store().as_ref(), &data.card.id).await? {
            card.pos = backed.pos;
            card.id_labels = backed.id_labels;
            card.id_members = backed.id_members;
        }

        match client.put_unit(&format!("/1/cards/{}", data.card.id), &card).await {
            Ok(()) => Ok(Vec::new()),
            Err(e) if e.is_permission_denied() => {
                tracing::info!(
                    card = data.card.id,
                    "destination board denies access; recreating card from backup"
                );
                let mut recreate = action.clone();
                recreate.kind = EventKind::DeleteCard;
                Ok(vec![recreate])
            }
            Err(e) => Err(e),
        }
    }

    /// Recreates a deleted card from its backup (or a placeholder when no
    /// backup exists), then queues sub-events to restore its checklists and
    /// attachments and re-posts its preserved comments in batches.
    async fn recreate_card(
        &self,
        client: &ApiClient,
        action: &Action,
    ) -> Result<Vec<Action>, WardenError> {
        let data = &action.data;
        let board_id = &data.board.id;

        // Drain and strip preserved comments in one atomic statement so a
        // duplicate delivery cannot re-post them.
        let comments = self.store().take_comments(&data.card.id).await?;

        let mut card = match fetch_entity::<Card>(self.store().as_ref(), &data.card.id).await? {
            Some(backed) => {
                self.spawn_delete(&data.card.id, board_id);
                backed
            }
            None => Card {
                name: Some(placeholder_name(&action.member_creator.username)),
                ..Card::default()
            },
        };
        card.id = String::new();
        card.id_list = Some(data.list.id.clone());
        card.id_board = Some(board_id.clone());

        let checklist_ids = std::mem::take(&mut card.id_checklists);
        let attachment_ids = std::mem::take(&mut card.id_attachments);

        // The creation webhook this triggers rebuilds the backup record.
        let created: Card = client.post("/1/cards", &card).await?;

        let mut followups = Vec::new();
        for checklist_id in checklist_ids {
            let mut sub = action.clone();
            sub.kind = EventKind::RemoveChecklistFromCard;
            sub.data.card.id = created.id.clone();
            sub.data.checklist = Checklist {
                id: checklist_id,
                ..Checklist::default()
            };
            followups.push(sub);
        }
        for attachment_id in attachment_ids {
            let mut sub = action.clone();
            sub.kind = EventKind::DeleteAttachmentFromCard;
            sub.data.card.id = created.id.clone();
            sub.data.attachment = Attachment {
                id: attachment_id,
                ..Attachment::default()
            };
            followups.push(sub);
        }

        for batch in batch_comments(&comments) {
            if let Err(e) = client
                .post_unit(
                    &format!("/1/cards/{}/actions/comments", created.id),
                    &json!({"text": batch}),
                )
                .await
            {
                tracing::warn!(card = created.id, error = %e, "failed to re-post comment batch");
            }
        }

        Ok(followups)
    }

    /// Recreates the checkitem a card was converted from, restoring its
    /// backed-up state and position when the backup can be located.
    async fn recreate_converted_checkitem(
        &self,
        client: &ApiClient,
        data: &EventData,
    ) -> Result<(), WardenError> {
        let name = data.card.name.clone().unwrap_or_default();

        let backed = match self
            .store()
            .find_converted_checkitem(&name, &data.checklist.id)
            .await?
        {
            Some(item_id) => fetch_entity::<CheckItem>(self.store().as_ref(), &item_id).await?,
            None => None,
        };

        let item = match backed {
            Some(item) => item.for_recreation(),
            None => CheckItem {
                name: Some(name),
                ..CheckItem::default()
            },
        };
        client
            .post_unit(&format!("/1/checklists/{}/checkItems", data.checklist.id), &item)
            .await
    }

    /// Recreates a removed checklist and replays its backed-up checkitems.
    /// The apply-side cleanup runs first so the stale records and the
    /// card's checklist reference are gone before the recreation webhooks
    /// rebuild them.
    async fn recreate_checklist(
        &self,
        client: &ApiClient,
        action: &Action,
    ) -> Result<(), WardenError> {
        let data = &action.data;

        let backed =
            fetch_entity::<Checklist>(self.store().as_ref(), &data.checklist.id).await?;
        let mut items = Vec::new();
        if let Some(checklist) = &backed {
            for item_id in &checklist.id_check_items {
                match fetch_entity::<CheckItem>(self.store().as_ref(), item_id).await {
                    Ok(Some(item)) => items.push(item),
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(checkitem = item_id.as_str(), error = %e,
                            "failed to fetch backed-up checkitem");
                    }
                }
            }
        }

        if let Err(e) = self.applier.apply(client, action).await {
            tracing::warn!(checklist = data.checklist.id, error = %e,
                "failed to clean up checklist records before recreation");
        }

        let name = data
            .checklist
            .name
            .clone()
            .or_else(|| backed.and_then(|c| c.name))
            .unwrap_or_default();
        let created: Checklist = client
            .post(
                &format!("/1/cards/{}/checklists", data.card.id),
                &json!({"name": name}),
            )
            .await?;

        for item in items {
            let item = item.for_recreation();
            if let Err(e) = client
                .post_unit(&format!("/1/checklists/{}/checkItems", created.id), &item)
                .await
            {
                tracing::warn!(checklist = created.id, error = %e,
                    "failed to recreate checkitem");
            }
        }
        Ok(())
    }

    /// Restores a deleted attachment from replicated content (uploads) or
    /// by re-posting the link, then drops the stale record, card reference
    /// and stored object.
    async fn restore_attachment(
        &self,
        client: &ApiClient,
        data: &EventData,
        board_id: &str,
    ) -> Result<(), WardenError> {
        let backed =
            fetch_entity::<Attachment>(self.store().as_ref(), &data.attachment.id).await?;

        self.spawn_delete(&data.attachment.id, board_id);
        self.spawn_unlink_attachment(data, board_id);

        let Some(attachment) = backed else {
            tracing::warn!(attachment = data.attachment.id,
                "no backup for deleted attachment; nothing to restore");
            return Ok(());
        };

        // The re-add webhook this triggers rebuilds record and replica.
        self.replicator.restore(client, &data.card.id, &attachment).await?;

        let replicator = self.replicator.clone();
        let attachment_id = data.attachment.id.clone();
        tokio::spawn(async move {
            if let Err(e) = replicator.discard(&attachment_id).await {
                tracing::warn!(attachment = attachment_id, error = %e,
                    "failed to drop replicated content");
            }
        });
        Ok(())
    }

    /// Recreates a deleted label and re-attaches the replacement to every
    /// card whose backup still references the old id.
    async fn recreate_label(
        &self,
        client: &ApiClient,
        data: &EventData,
        board_id: &str,
    ) -> Result<(), WardenError> {
        let Some(mut label) = fetch_entity::<Label>(self.store().as_ref(), &data.label.id).await?
        else {
            tracing::warn!(label = data.label.id, "no backup for deleted label; cannot recreate");
            return Ok(());
        };
        self.spawn_delete(&data.label.id, board_id);

        label.id = String::new();
        label.id_board = Some(board_id.to_string());
        let created: Label = client.post("/1/labels", &label).await?;

        for card_id in self.store().cards_with_label(&data.label.id).await? {
            if let Err(e) = client
                .post_unit(&format!("/1/cards/{card_id}/idLabels"), &json!({"value": created.id}))
                .await
            {
                tracing::warn!(card = card_id, label = created.id, error = %e,
                    "failed to re-attach recreated label");
            }
        }
        Ok(())
    }

    fn store(&self) -> &Arc<dyn crate::persistence::BackupStore> {
        self.applier.store()
    }

    /// Detached record delete; failures are logged.
    fn spawn_delete(&self, id: &str, board_id: &str) {
        let store = Arc::clone(self.store());
        let id = id.to_string();
        let board_id = board_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = store.delete(&id, &board_id).await {
                tracing::warn!(id, error = %e, "failed to delete stale backup record");
            }
        });
    }

    /// Detached removal of a deleted attachment's id from the backed-up
    /// card's `idAttachments` list.
    fn spawn_unlink_attachment(&self, data: &EventData, board_id: &str) {
        let store = Arc::clone(self.store());
        let seed = match serde_json::to_value(&data.card) {
            Ok(seed) => seed,
            Err(_) => Value::Object(Map::new()),
        };
        let card_id = data.card.id.clone();
        let board_id = board_id.to_string();
        let attachment_id = data.attachment.id.clone();
        tokio::spawn(async move {
            let patch = ListPatch::Remove(attachment_id);
            if let Err(e) = store
                .patch_list(&card_id, &board_id, &seed, "idAttachments", &patch)
                .await
            {
                tracing::warn!(card = card_id, error = %e,
                    "failed to unlink deleted attachment from card backup");
            }
        });
    }
}

/// Builds the prior-value write-back body for an update event, `None` when
/// the event carried no usable diff.
fn prior_body(data: &EventData, kind: EntityKind) -> Option<Map<String, Value>> {
    let old = data.old.as_ref()?;
    let prior = PriorValues::extract(kind, old);
    if prior.is_empty() {
        None
    } else {
        Some(prior.into_write_back())
    }
}
