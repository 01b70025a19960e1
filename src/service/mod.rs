//! The reconciliation engine: authorization check, apply path, compensate
//! path, attachment replication, and the per-event dispatcher tying them
//! together.

pub mod apply;
pub mod attachments;
pub mod authorize;
pub mod backfill;
pub mod comments;
pub mod compensate;
pub mod dispatcher;

pub use apply::Applier;
pub use attachments::AttachmentReplicator;
pub use authorize::Authorizer;
pub use compensate::Compensator;
pub use dispatcher::Dispatcher;
