//! Tracked-entity models mirroring the external board API's JSON shapes.
//!
//! These double as webhook payload fragments and as backup-record documents,
//! so every optional field skips serialization when absent: a snapshot save
//! must only merge the fields the event actually carried, never overwrite
//! present backup data with nulls.

use serde::{Deserialize, Serialize};

/// The acting user attached to a webhook action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Upstream member id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Login name, used in the deleted-card placeholder text.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

/// A board as it appears in event payloads and registry rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    /// Upstream board id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Short link fragment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_link: Option<String>,
    /// Board name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Labels, present only on full board fetches (initial backup sweep).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,
    /// Cards, present only on full board fetches.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cards: Vec<Card>,
}

/// A list (column) on a board.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct List {
    /// Upstream list id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// List name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Sort position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<f64>,
    /// Archived flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed: Option<bool>,
}

/// A label attached to cards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    /// Upstream label id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Label name; always serialized because label creation accepts an
    /// empty name but not a missing one.
    #[serde(default)]
    pub name: String,
    /// Label color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Owning board id, required when recreating a deleted label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_board: Option<String>,
}

/// A card, the central tracked entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    /// Upstream card id; cleared before recreation calls.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Short link fragment; its presence distinguishes a card document
    /// from a checkitem document with the same name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_link: Option<String>,
    /// Owning board id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_board: Option<String>,
    /// Containing list id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_list: Option<String>,
    /// Card title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Card description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    /// Due date, upstream string format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<String>,
    /// Due-complete flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_complete: Option<bool>,
    /// Archived flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed: Option<bool>,
    /// Sort position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<f64>,
    /// Cover attachment id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_attachment_cover: Option<String>,
    /// Member ids assigned to the card.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub id_members: Vec<String>,
    /// Label ids attached to the card.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub id_labels: Vec<String>,
    /// Checklist ids contained in the card.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub id_checklists: Vec<String>,
    /// Attachment ids on the card.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub id_attachments: Vec<String>,
    /// Full attachments, present only on full board fetches.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

/// A checklist contained in a card.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checklist {
    /// Upstream checklist id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Checklist title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Sort position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<f64>,
    /// Checkitem ids contained in the checklist.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub id_check_items: Vec<String>,
    /// Full checkitems, present only on checklist fetches.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub check_items: Vec<CheckItem>,
}

/// A checkitem inside a checklist.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckItem {
    /// Upstream checkitem id; cleared before recreation calls.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Checkitem text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `"complete"` or `"incomplete"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Creation-call flag equivalent of `state == "complete"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    /// Sort position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<f64>,
}

impl CheckItem {
    /// Prepares this item for a recreation call: drops the stale id and
    /// derives `checked` from the backed-up state.
    #[must_use]
    pub fn for_recreation(mut self) -> Self {
        self.id = String::new();
        self.checked = Some(self.state.as_deref() == Some("complete"));
        self
    }
}

/// A file or link attached to a card.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Upstream attachment id; cleared before re-post calls.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// File or link name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Content URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Attachment {
    /// True when the attachment content is hosted by the tracked system's
    /// own upload bucket, as opposed to an external link. Only these are
    /// replicated into object storage.
    #[must_use]
    pub fn is_uploaded(&self) -> bool {
        self.url
            .as_deref()
            .and_then(|url| url.split('/').nth(2))
            .is_some_and(|host| host == "trello-attachments.s3.amazonaws.com")
    }
}

/// A card comment as stored under the backup record's `comments` field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    /// Comment action id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Upstream timestamp string (`2006-01-02T15:04:05.000Z` style).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub date: String,
    /// Comment text.
    #[serde(default)]
    pub text: String,
    /// Authoring member id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_id: String,
    /// Authoring member login.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
}

/// A board membership row from the memberships endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    /// Member id.
    #[serde(default)]
    pub id_member: String,
    /// Board-level role (`"admin"`, `"normal"`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_type: Option<String>,
    /// Organization-level role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_member_type: Option<String>,
}

impl Membership {
    /// True when either the board or organization role is admin.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.member_type.as_deref() == Some("admin")
            || self.org_member_type.as_deref() == Some("admin")
    }
}
