//! # boardwarden
//!
//! Webhook-driven access-control enforcement for a hosted task board.
//!
//! The hosted board's permission model cannot express per-card rules, so
//! this service enforces them after the fact: it observes every change
//! event the board emits, checks whether the acting user was privileged
//! (board/org admin, or member of the affected card), and either mirrors
//! the change into a backup store or reverses it through compensating API
//! calls — using the backup to restore state the external API no longer
//! exposes.
//!
//! ## Architecture
//!
//! ```text
//! Upstream webhooks (HTTP)
//!     │
//!     ├── Receiver (api/) — ack first, process async
//!     │
//!     ├── Dispatcher (service/) — registration lookup, routing
//!     │     ├── Authorizer — admin cache + membership checks
//!     │     ├── Applier — mirror into the backup store
//!     │     └── Compensator — reverse via the external API
//!     │
//!     ├── BackupStore (persistence/) — PostgreSQL jsonb documents
//!     ├── AttachmentReplicator (storage/) — object storage for uploads
//!     └── AdminCache / ReplicationGuard (cache/) — Redis or in-process
//! ```

pub mod api;
pub mod app_state;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod storage;
pub mod trello;
