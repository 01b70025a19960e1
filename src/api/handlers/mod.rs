//! Endpoint handlers.

pub mod system;
pub mod webhook;
