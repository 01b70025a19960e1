//! The inbound change-event envelope.
//!
//! The upstream system posts one [`WebhookEnvelope`] per observed board
//! change. The envelope is acknowledged before processing, so deserialization
//! here is deliberately lenient: unknown event types map to
//! [`EventKind::Other`] and missing payload fragments default to empty.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::entities::{Attachment, Board, Card, CheckItem, Checklist, Label, List, User};

/// One inbound webhook delivery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEnvelope {
    /// The observed change.
    #[serde(default)]
    pub action: Action,
}

/// The change described by a webhook delivery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    /// Event type discriminator.
    #[serde(rename = "type", default)]
    pub kind: EventKind,
    /// Upstream action id; compensating a comment deletes this action.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Upstream timestamp string.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub date: String,
    /// The acting user.
    #[serde(default)]
    pub member_creator: User,
    /// Entity payloads the event concerns.
    #[serde(default)]
    pub data: EventData,
}

/// Current-state snapshots of the entities an event concerns, plus the
/// `old` prior-value map for in-place edits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventData {
    /// Board on which the event happened.
    #[serde(default)]
    pub board: Board,
    /// Source board for cross-board moves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_source: Option<Board>,
    /// Target board for cross-board moves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_target: Option<Board>,
    /// Card payload.
    #[serde(default)]
    pub card: Card,
    /// List payload.
    #[serde(default)]
    pub list: List,
    /// Label payload.
    #[serde(default)]
    pub label: Label,
    /// Checklist payload.
    #[serde(default)]
    pub checklist: Checklist,
    /// Checkitem payload.
    #[serde(default)]
    pub check_item: CheckItem,
    /// Attachment payload.
    #[serde(default)]
    pub attachment: Attachment,
    /// Member id for add/remove-member events.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id_member: String,
    /// Comment text for `commentCard` events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Field → old-value map carried by update events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<Map<String, Value>>,
}

/// Every event type this system reacts to.
///
/// Unrecognized types deserialize to [`EventKind::Other`] and are ignored
/// by both processing paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    /// A card was created.
    CreateCard,
    /// A card was copied from another card.
    CopyCard,
    /// A checkitem was converted into a card.
    ConvertToCardFromCheckItem,
    /// A card arrived from another board.
    MoveCardToBoard,
    /// A card left for another board.
    MoveCardFromBoard,
    /// A card was deleted.
    DeleteCard,
    /// Card fields were edited in place.
    UpdateCard,
    /// A member was assigned to a card.
    AddMemberToCard,
    /// A member was unassigned from a card.
    RemoveMemberFromCard,
    /// A label was attached to a card.
    AddLabelToCard,
    /// A label was detached from a card.
    RemoveLabelFromCard,
    /// A label was created.
    CreateLabel,
    /// Label fields were edited in place.
    UpdateLabel,
    /// A label was deleted board-wide.
    DeleteLabel,
    /// A checklist was added to a card.
    AddChecklistToCard,
    /// Checklist fields were edited in place.
    UpdateChecklist,
    /// A checklist was removed from a card.
    RemoveChecklistFromCard,
    /// A checkitem was created.
    CreateCheckItem,
    /// Checkitem fields were edited in place.
    UpdateCheckItem,
    /// A checkitem was checked or unchecked.
    UpdateCheckItemStateOnCard,
    /// A checkitem was deleted.
    DeleteCheckItem,
    /// An attachment was added to a card.
    AddAttachmentToCard,
    /// An attachment was deleted from a card.
    DeleteAttachmentFromCard,
    /// A comment was posted on a card.
    CommentCard,
    /// A list was created.
    CreateList,
    /// List fields were edited in place.
    UpdateList,
    /// A list left for another board.
    MoveListFromBoard,
    /// A list arrived from another board.
    MoveListToBoard,
    /// A custom field value changed; recognized and deliberately ignored.
    UpdateCustomFieldItem,
    /// Anything this system does not track.
    #[default]
    #[serde(other)]
    Other,
}

impl EventKind {
    /// Stable string form for log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateCard => "createCard",
            Self::CopyCard => "copyCard",
            Self::ConvertToCardFromCheckItem => "convertToCardFromCheckItem",
            Self::MoveCardToBoard => "moveCardToBoard",
            Self::MoveCardFromBoard => "moveCardFromBoard",
            Self::DeleteCard => "deleteCard",
            Self::UpdateCard => "updateCard",
            Self::AddMemberToCard => "addMemberToCard",
            Self::RemoveMemberFromCard => "removeMemberFromCard",
            Self::AddLabelToCard => "addLabelToCard",
            Self::RemoveLabelFromCard => "removeLabelFromCard",
            Self::CreateLabel => "createLabel",
            Self::UpdateLabel => "updateLabel",
            Self::DeleteLabel => "deleteLabel",
            Self::AddChecklistToCard => "addChecklistToCard",
            Self::UpdateChecklist => "updateChecklist",
            Self::RemoveChecklistFromCard => "removeChecklistFromCard",
            Self::CreateCheckItem => "createCheckItem",
            Self::UpdateCheckItem => "updateCheckItem",
            Self::UpdateCheckItemStateOnCard => "updateCheckItemStateOnCard",
            Self::DeleteCheckItem => "deleteCheckItem",
            Self::AddAttachmentToCard => "addAttachmentToCard",
            Self::DeleteAttachmentFromCard => "deleteAttachmentFromCard",
            Self::CommentCard => "commentCard",
            Self::CreateList => "createList",
            Self::UpdateList => "updateList",
            Self::MoveListFromBoard => "moveListFromBoard",
            Self::MoveListToBoard => "moveListToBoard",
            Self::UpdateCustomFieldItem => "updateCustomFieldItem",
            Self::Other => "other",
        }
    }
}
