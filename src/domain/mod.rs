//! Domain layer: tracked-entity models, the webhook event envelope, the
//! prior-value diff representation, and the pure patch algebra the backup
//! store implements.

pub mod entities;
pub mod event;
pub mod merge;
pub mod prior;

pub use entities::{
    Attachment, Board, Card, CheckItem, Checklist, Comment, Label, List, Membership, User,
};
pub use event::{Action, EventData, EventKind, WebhookEnvelope};
pub use merge::{ListPatch, patch_list, shallow_merge};
pub use prior::{EntityKind, PriorValues};
