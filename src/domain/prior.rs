//! Typed representation of the `old` prior-value diff carried by update
//! events.
//!
//! The upstream diff is a loosely-typed field → old-value map. Reversing an
//! in-place edit means writing those old values back, but only fields this
//! system understands for the given entity kind should be replayed as typed
//! values; everything else is kept in an unknown-field bag and written back
//! verbatim for forward compatibility.

use serde_json::{Map, Value};

/// The entity kinds an update event can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// A card (`updateCard`).
    Card,
    /// A checklist (`updateChecklist`).
    Checklist,
    /// A checkitem (`updateCheckItem`).
    CheckItem,
    /// A label (`updateLabel`).
    Label,
    /// A list (`updateList`).
    List,
}

impl EntityKind {
    /// Fields this system knows how to reverse for the entity kind.
    const fn allowed_fields(self) -> &'static [&'static str] {
        match self {
            Self::Card => &[
                "name",
                "desc",
                "due",
                "dueComplete",
                "closed",
                "pos",
                "idList",
                "idAttachmentCover",
            ],
            Self::Checklist => &["name", "pos"],
            Self::CheckItem => &["name", "pos", "state", "due"],
            Self::Label => &["name", "color"],
            Self::List => &["name", "pos", "closed"],
        }
    }
}

/// The prior values of an update event, split into the per-kind allow-list
/// and an unknown-field bag.
#[derive(Debug, Clone, Default)]
pub struct PriorValues {
    known: Map<String, Value>,
    unknown: Map<String, Value>,
}

impl PriorValues {
    /// Splits a raw diff map against the allow-list for `kind`.
    #[must_use]
    pub fn extract(kind: EntityKind, raw: &Map<String, Value>) -> Self {
        let allowed = kind.allowed_fields();
        let mut known = Map::new();
        let mut unknown = Map::new();
        for (field, value) in raw {
            if allowed.contains(&field.as_str()) {
                known.insert(field.clone(), value.clone());
            } else {
                unknown.insert(field.clone(), value.clone());
            }
        }
        Self { known, unknown }
    }

    /// True when the diff carried nothing at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.known.is_empty() && self.unknown.is_empty()
    }

    /// Builds the write-back body that restores the prior values.
    ///
    /// A `null` old value means the field previously had no value; the
    /// external API clears a field when it receives the literal string
    /// `"null"`, so nulls are rewritten accordingly.
    #[must_use]
    pub fn into_write_back(self) -> Map<String, Value> {
        let mut body = self.known;
        body.extend(self.unknown);
        for value in body.values_mut() {
            if value.is_null() {
                *value = Value::String("null".to_string());
            }
        }
        body
    }
}
